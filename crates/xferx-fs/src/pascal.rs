//! Apple Pascal. A single sorted directory occupies blocks 2-5 (the
//! volume header plus 77 fixed-slot file entries). Files are strictly
//! contiguous block ranges `[start_block, following_block)`; "unused"
//! entries are not stored on disk but synthesized from the gaps left
//! between sorted real entries. Grounded on `xferx/apple2/pascalfs.py`.

use xferx_common::{dates, pascal_str::PascalString};
use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const DIR_BLOCK: u32 = 2;
const DIR_SIZE_BLOCKS: u32 = 4;
const MAX_DIR_ENTRIES: usize = 77;
const VOLUME_ENTRY_SIZE: usize = 26;
const DIRECTORY_ENTRY_SIZE: usize = 26;

pub struct VolumeDirectory {
    pub start_block: u16,
    pub following_block: u16,
    pub volume_name: String,
    pub number_of_blocks: u16,
    pub number_of_files: u16,
    pub entries: Vec<PascalDirectoryEntry>,
}

#[derive(Debug, Clone)]
pub struct PascalDirectoryEntry {
    pub start_block: u16,
    pub following_block: u16,
    pub file_type: u16,
    pub filename: String,
    pub last_block_bytes: u16,
    pub mod_date: u16,
}

impl PascalDirectoryEntry {
    fn decode(bytes: &[u8]) -> Self {
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Self {
            start_block: word(0),
            following_block: word(2),
            file_type: word(4),
            filename: PascalString::decode(&bytes[6..22]).as_str().to_string(),
            last_block_bytes: word(22),
            mod_date: word(24),
        }
    }

    pub fn length_blocks(&self) -> u32 {
        self.following_block as u32 - self.start_block as u32
    }

    pub fn created(&self) -> Option<chrono::NaiveDate> {
        dates::pascal::decode(self.mod_date)
    }

    fn to_directory_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            name: self.filename.clone(),
            length_blocks: self.length_blocks(),
            created: self.created().map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc()),
            mode: FileMode::Image,
            attributes: FileAttributes::empty(),
        }
    }
}

/// A synthesized gap between two real entries (or disk edges), where
/// Apple Pascal shows "<UNUSED>" in a `dir` listing even though no
/// directory slot backs it.
pub struct UnusedArea {
    pub start_block: u16,
    pub following_block: u16,
}

impl VolumeDirectory {
    pub fn read(device: &mut dyn BlockDevice) -> FsResult<Self> {
        let mut buffer = vec![0u8; BLOCK_SIZE * DIR_SIZE_BLOCKS as usize];
        for i in 0..DIR_SIZE_BLOCKS {
            device.read_block(DIR_BLOCK + i, &mut buffer[(i as usize) * BLOCK_SIZE..(i as usize + 1) * BLOCK_SIZE])?;
        }
        let word = |i: usize| u16::from_le_bytes([buffer[i], buffer[i + 1]]);
        let start_block = word(0);
        let following_block = word(2);
        let volume_name = PascalString::decode(&buffer[6..14]).as_str().to_string();
        let number_of_blocks = word(14);
        let number_of_files = word(16);

        let mut entries = Vec::new();
        for i in 1..=MAX_DIR_ENTRIES {
            let offset = i * DIRECTORY_ENTRY_SIZE;
            if offset + DIRECTORY_ENTRY_SIZE > buffer.len() {
                break;
            }
            entries.push(PascalDirectoryEntry::decode(&buffer[offset..offset + DIRECTORY_ENTRY_SIZE]));
        }

        Ok(Self {
            start_block,
            following_block,
            volume_name,
            number_of_blocks,
            number_of_files,
            entries,
        })
    }

    /// Real files in on-disk directory order, truncated to
    /// `number_of_files` (trailing slots are unused/garbage).
    pub fn files(&self) -> &[PascalDirectoryEntry] {
        let n = (self.number_of_files as usize).min(self.entries.len());
        &self.entries[..n]
    }

    /// Synthesizes the `<UNUSED>` gaps between consecutive real files,
    /// starting right after the directory itself.
    pub fn unused_areas(&self) -> Vec<UnusedArea> {
        let mut areas = Vec::new();
        let mut cursor = self.following_block;
        for entry in self.files() {
            if entry.start_block > cursor {
                areas.push(UnusedArea { start_block: cursor, following_block: entry.start_block });
            }
            cursor = entry.following_block.max(cursor);
        }
        if cursor < self.number_of_blocks {
            areas.push(UnusedArea { start_block: cursor, following_block: self.number_of_blocks });
        }
        areas
    }
}

pub struct PascalFilesystem {
    device: Box<dyn BlockDevice>,
    volume_name: String,
}

impl PascalFilesystem {
    pub fn mount(mut device: Box<dyn BlockDevice>, strict: bool) -> FsResult<Self> {
        let dir = VolumeDirectory::read(device.as_mut())?;
        if strict && dir.number_of_blocks == 0 {
            return Err(FsError::Corrupt("Apple Pascal volume directory reports zero blocks".into()));
        }
        log::debug!("mounted Apple Pascal volume {:?} ({} file(s))", dir.volume_name, dir.number_of_files);
        Ok(Self {
            device,
            volume_name: dir.volume_name,
        })
    }

    pub fn list(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        let dir = VolumeDirectory::read(self.device.as_mut())?;
        Ok(dir.files().iter().map(|e| e.to_directory_entry()).collect())
    }

    pub fn read_file(&mut self, entry: &PascalDirectoryEntry) -> FsResult<Vec<u8>> {
        let mut data = Vec::with_capacity(entry.length_blocks() as usize * BLOCK_SIZE);
        let mut block = vec![0u8; BLOCK_SIZE];
        for b in entry.start_block..entry.following_block {
            self.device.read_block(b as u32, &mut block)?;
            data.extend_from_slice(&block);
        }
        Ok(data)
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }
}

const _: () = assert!(VOLUME_ENTRY_SIZE == DIRECTORY_ENTRY_SIZE);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use xferx_core::ByteFile;

    fn make_volume() -> Box<dyn BlockDevice> {
        let mut data = vec![0u8; BLOCK_SIZE * 20];
        let dir = &mut data[DIR_BLOCK as usize * BLOCK_SIZE..];
        dir[0..2].copy_from_slice(&(DIR_BLOCK as u16).to_le_bytes());
        dir[2..4].copy_from_slice(&(DIR_BLOCK as u16 + DIR_SIZE_BLOCKS as u16).to_le_bytes());
        let name = PascalString::new("MYVOL").encode(8);
        dir[6..14].copy_from_slice(&name);
        dir[14..16].copy_from_slice(&20u16.to_le_bytes());
        dir[16..18].copy_from_slice(&1u16.to_le_bytes());

        let entry_offset = 1 * DIRECTORY_ENTRY_SIZE;
        dir[entry_offset..entry_offset + 2].copy_from_slice(&6u16.to_le_bytes());
        dir[entry_offset + 2..entry_offset + 4].copy_from_slice(&10u16.to_le_bytes());
        dir[entry_offset + 4..entry_offset + 6].copy_from_slice(&3u16.to_le_bytes());
        let fname = PascalString::new("HELLO.TEXT").encode(16);
        dir[entry_offset + 6..entry_offset + 22].copy_from_slice(&fname);

        Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 20))
    }

    #[test]
    fn mount_reads_the_volume_name() {
        let fs = PascalFilesystem::mount(make_volume(), true).unwrap();
        assert_eq!(fs.volume_name(), "MYVOL");
    }

    #[test]
    fn list_returns_the_one_file() {
        let mut fs = PascalFilesystem::mount(make_volume(), true).unwrap();
        let entries = fs.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "HELLO.TEXT");
        assert_eq!(entries[0].length_blocks, 4);
    }

    #[test]
    fn unused_areas_fill_the_gap_after_the_file() {
        let mut device = make_volume();
        let dir = VolumeDirectory::read(device.as_mut()).unwrap();
        let areas = dir.unused_areas();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].start_block, 10);
        assert_eq!(areas[0].following_block, 20);
    }
}
