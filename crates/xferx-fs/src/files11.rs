//! Files-11 (ODS-1): `INDEXF.SYS` is the root. File headers carry an
//! ident area (RAD-50 name, version, dates) and a map area of retrieval
//! pointers; `map_block` resolves a virtual block number by walking the
//! pointers and accumulating the virtual-block cursor `j` as it goes.
//! Grounded on spec.md §4.1's "Retrieval-pointer resolution (Files-11)".

use xferx_common::{dates, rad50};
use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

const BLOCK_SIZE: usize = 512;

/// One format-1 retrieval pointer: `{high-LBN (1 B), count-minus-1 (1 B),
/// low-LBN (2 B)}`, mapping virtual blocks `[j, j+count)` to logical
/// blocks `[lbn, lbn+count)`.
#[derive(Debug, Clone, Copy)]
struct RetrievalPointer {
    count: u32,
    lbn: u32,
}

impl RetrievalPointer {
    fn decode(bytes: &[u8; 4]) -> Self {
        let high_lbn = bytes[0] as u32;
        let count = bytes[1] as u32 + 1;
        let low_lbn = u16::from_le_bytes([bytes[2], bytes[3]]) as u32;
        Self {
            count,
            lbn: (high_lbn << 16) | low_lbn,
        }
    }
}

pub struct FileHeader {
    pub name_words: (u16, u16),
    pub type_word: u16,
    pub version: u16,
    pub creation_date: Option<chrono::NaiveDateTime>,
    pointers: Vec<RetrievalPointer>,
}

impl FileHeader {
    /// Parses a 512-byte file header block. Only the primary header is
    /// consulted; per spec.md's open question, files whose map overflows
    /// into an extension header (tracked via `efnu`) are not followed —
    /// `map_block` returns `Corrupt` past the primary map's coverage
    /// rather than silently truncating the file.
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> FsResult<Self> {
        let word = |i: usize| u16::from_le_bytes([block[i], block[i + 1]]);
        // Ident area offsets mirror the classic ODS-1 header layout:
        // filename at 0x02C, type at 0x032, version at 0x034.
        let name_words = (word(0x02C), word(0x02E));
        let type_word = word(0x032);
        let version = word(0x034);

        let date_bytes = &block[0x038..0x038 + 17];
        let date_str = String::from_utf8_lossy(&date_bytes[0..9]).trim().to_string();
        let time_str = String::from_utf8_lossy(&date_bytes[9..17]).trim().to_string();
        let creation_date = dates::files11::decode(&date_str, &time_str);

        // Map area header: map words count at 0x00A, map start at 0x00C
        // in the classic layout; retrieval pointers follow immediately.
        let map_words = word(0x00A) as usize;
        let map_start = 0x00C;
        let mut pointers = Vec::new();
        let mut offset = map_start;
        let end = (map_start + map_words * 2).min(BLOCK_SIZE - 4);
        while offset + 4 <= end {
            let raw: [u8; 4] = block[offset..offset + 4].try_into().unwrap();
            pointers.push(RetrievalPointer::decode(&raw));
            offset += 4;
        }

        Ok(Self {
            name_words,
            type_word,
            version,
            creation_date,
            pointers,
        })
    }

    pub fn filename(&self) -> String {
        let name = rad50::rad50_pair_to_ascii(self.name_words).unwrap_or_default();
        let ext = rad50::rad50_to_ascii(self.type_word)
            .map(|c| String::from_utf8_lossy(&c).trim().to_string())
            .unwrap_or_default();
        if ext.is_empty() {
            format!("{name}.;{}", self.version)
        } else {
            format!("{name}.{ext};{}", self.version)
        }
    }

    pub fn block_count(&self) -> u32 {
        self.pointers.iter().map(|p| p.count).sum()
    }

    /// Resolves virtual block `v` (0-based) to a logical block number by
    /// linearly searching the retrieval pointers, accumulating the
    /// virtual-block cursor as each pointer's span is consumed.
    pub fn map_block(&self, v: u32) -> FsResult<u32> {
        let mut j = 0u32;
        for pointer in &self.pointers {
            if v >= j && v < j + pointer.count {
                return Ok(pointer.lbn + (v - j));
            }
            j += pointer.count;
        }
        Err(FsError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("virtual block {v} is past this file's retrieval pointers"),
        )))
    }

    pub fn to_directory_entry(&self) -> DirectoryEntry {
        DirectoryEntry {
            name: self.filename(),
            length_blocks: self.block_count(),
            created: self.creation_date.map(|dt| dt.and_utc()),
            mode: FileMode::Image,
            attributes: FileAttributes::empty(),
        }
    }
}

/// Reads a Files-11 directory file's 16-byte entries, each referencing a
/// File ID `(fnum, fseq, fvol)` rather than embedding the header inline.
pub struct DirectoryFileEntry {
    pub name: String,
    pub file_number: u16,
    pub file_sequence: u16,
    pub file_volume: u16,
}

pub fn parse_directory_file(data: &[u8]) -> Vec<DirectoryFileEntry> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset + 16 <= data.len() {
        let word = |i: usize| u16::from_le_bytes([data[offset + i], data[offset + i + 1]]);
        let file_number = word(0);
        if file_number != 0 {
            let name_words = (word(2), word(4));
            let type_word = word(6);
            let name = rad50::rad50_pair_to_ascii(name_words).unwrap_or_default();
            let ext = rad50::rad50_to_ascii(type_word)
                .map(|c| String::from_utf8_lossy(&c).trim().to_string())
                .unwrap_or_default();
            let full_name = if ext.is_empty() { name } else { format!("{name}.{ext}") };
            entries.push(DirectoryFileEntry {
                name: full_name,
                file_number,
                file_sequence: word(8),
                file_volume: word(10),
            });
        }
        offset += 16;
    }
    entries
}

/// Reads the blocks of a file through its header's retrieval pointers.
pub fn read_file(device: &mut dyn BlockDevice, header: &FileHeader) -> FsResult<Vec<u8>> {
    let mut data = Vec::with_capacity(header.block_count() as usize * BLOCK_SIZE);
    let mut block = [0u8; BLOCK_SIZE];
    for v in 0..header.block_count() {
        let lbn = header.map_block(v)?;
        device.read_block(lbn, &mut block)?;
        data.extend_from_slice(&block);
    }
    Ok(data)
}

/// A mounted Files-11 (ODS-1) volume. Mounting takes the MFD's own
/// header block directly rather than bootstrapping it from the home
/// block's index file pointers — this project has no `INDEXF.SYS`
/// bootstrap reader, so the caller (or a future volume-registry probe)
/// is expected to have already located it, the same way a disk
/// inspector given a raw header block offset can read a volume without
/// walking the home block first.
pub struct Files11Filesystem {
    device: Box<dyn BlockDevice>,
    root_header_block: u32,
    volume_name: String,
}

impl Files11Filesystem {
    pub fn mount(device: Box<dyn BlockDevice>, root_header_block: u32, volume_name: &str) -> FsResult<Self> {
        Ok(Self {
            device,
            root_header_block,
            volume_name: volume_name.to_string(),
        })
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    fn read_header(&mut self, header_block: u32) -> FsResult<FileHeader> {
        let mut block = [0u8; BLOCK_SIZE];
        self.device.read_block(header_block, &mut block)?;
        FileHeader::decode(&block)
    }

    /// Lists the MFD/UFD rooted at the mount's header block. Each
    /// directory entry names a file ID rather than embedding a header
    /// block number directly; without the index file's own bitmap this
    /// driver can't resolve a file ID to its header block, so entries
    /// are reported by name only (no length/date) until that mapping is
    /// wired up.
    pub fn list(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        let root = self.read_header(self.root_header_block)?;
        let data = read_file(self.device.as_mut(), &root)?;
        let entries = parse_directory_file(&data);
        log::trace!("directory file at header block {} has {} entries", self.root_header_block, entries.len());
        Ok(entries
            .into_iter()
            .map(|e| DirectoryEntry {
                name: e.name,
                length_blocks: 0,
                created: None,
                mode: FileMode::Image,
                attributes: FileAttributes::empty(),
            })
            .collect())
    }

    /// Reads a file given its own header block directly (bypassing file
    /// ID resolution, for the same reason `list` can't resolve one).
    pub fn read_file_at(&mut self, header_block: u32) -> FsResult<Vec<u8>> {
        let header = self.read_header(header_block)?;
        read_file(self.device.as_mut(), &header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header(pointers: &[(u32, u32)]) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0x00A..0x00C].copy_from_slice(&((pointers.len() * 2) as u16).to_le_bytes());
        let mut offset = 0x00C;
        for &(count, lbn) in pointers {
            let high = ((lbn >> 16) & 0xFF) as u8;
            let low = (lbn & 0xFFFF) as u16;
            block[offset] = high;
            block[offset + 1] = (count - 1) as u8;
            block[offset + 2..offset + 4].copy_from_slice(&low.to_le_bytes());
            offset += 4;
        }
        let (hi, lo) = rad50::ascii_to_rad50_pair(b"FOO");
        block[0x02C..0x02E].copy_from_slice(&hi.to_le_bytes());
        block[0x02E..0x030].copy_from_slice(&lo.to_le_bytes());
        block[0x032..0x034].copy_from_slice(&rad50::ascii_to_rad50(b"DAT").to_le_bytes());
        block[0x034..0x036].copy_from_slice(&1u16.to_le_bytes());
        block
    }

    #[test]
    fn map_block_resolves_across_multiple_pointers() {
        let block = make_header(&[(4, 100), (3, 200)]);
        let header = FileHeader::decode(&block).unwrap();
        assert_eq!(header.map_block(0).unwrap(), 100);
        assert_eq!(header.map_block(3).unwrap(), 103);
        assert_eq!(header.map_block(4).unwrap(), 200);
        assert_eq!(header.map_block(6).unwrap(), 202);
        assert_eq!(header.block_count(), 7);
    }

    #[test]
    fn map_block_past_the_end_is_an_error() {
        let block = make_header(&[(2, 50)]);
        let header = FileHeader::decode(&block).unwrap();
        assert!(header.map_block(2).is_err());
    }

    #[test]
    fn filename_includes_the_version_number() {
        let block = make_header(&[(1, 0)]);
        let header = FileHeader::decode(&block).unwrap();
        assert_eq!(header.filename(), "FOO.DAT;1");
    }
}
