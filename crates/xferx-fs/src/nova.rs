//! Data General Nova RDOS. The System Directory (`SYS.DR`) is a random
//! file: an index block followed by data blocks, each data block an
//! array of 36-byte User File Descriptors (UFDs). The disk map
//! (`MAP.DR`) is a contiguous file holding the free-block bitmap.
//! Filenames are stored byte-swapped (Nova is big-endian internally,
//! the image is little-endian words) and a position-weighted hash of
//! the name picks the preferred `SYS.DR` block for a new entry.
//! Grounded on `xferx/nova/dgdosfs.py`.

use xferx_common::dates;
use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
/// Primary partition base address: blocks below this are never part
/// of the allocatable bitmap range (disk ID block, SYS.DR/MAP.DR roots).
const SCPPA: u32 = 6;
const DISK_ID_BLOCK: u32 = 3;
const UFD_ENTRY_LEN: usize = 36;
const FILE_NAME_LENGTH: usize = 10;
const FILE_EXTENSION_LENGTH: usize = 2;

pub const ATWP: u16 = 1 << 0;
pub const ATPER: u16 = 1 << 1;
pub const ATRAN: u16 = 1 << 2;
pub const ATCON: u16 = 1 << 3;
pub const ATDIR: u16 = 1 << 10;
pub const ATLNK: u16 = 1 << 12;
pub const ATRP: u16 = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NovaFileType {
    Random,
    Contiguous,
    Sequential,
}

/// Swaps adjacent byte pairs, undoing Nova's big-endian-word-in-little-
/// endian-image name encoding.
fn swap_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        out.push(pair[1]);
        out.push(pair[0]);
    }
    out.extend_from_slice(chunks.remainder());
    out
}

fn bytes_to_ascii(raw: &[u8]) -> String {
    let swapped = swap_bytes(raw);
    String::from_utf8_lossy(&swapped)
        .trim_end_matches('\0')
        .to_string()
}

fn ascii_to_bytes(val: &str, length: usize) -> Vec<u8> {
    let mut padded = val.as_bytes().to_vec();
    padded.resize(length, 0);
    swap_bytes(&padded)
}

/// Position-weighted hash of (name, extension): even-indexed bytes
/// weighted ×1, odd-indexed bytes weighted ×0o400 (256), summed modulo
/// 0xFFFF then modulo the disk's frame size.
pub fn filename_hash(filename: &str, extension: &str, frame_size: u32) -> u32 {
    let weigh = |bytes: &[u8]| -> u32 {
        bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| b as u32 * if i % 2 == 1 { 0o400 } else { 1 })
            .sum()
    };
    let t0 = weigh(&ascii_to_bytes(&filename.to_uppercase(), FILE_NAME_LENGTH));
    let t1 = weigh(&ascii_to_bytes(&extension.to_uppercase(), FILE_EXTENSION_LENGTH));
    (t0 + t1) % 0xFFFF % frame_size.max(1)
}

pub struct UfdEntry {
    pub filename: String,
    pub extension: String,
    pub attributes: u16,
    pub number_of_last_block: u16,
    pub bytes_in_last_block: u16,
    pub address: u16,
    pub last_modification_date: u16,
    pub last_modification_time: u16,
}

impl UfdEntry {
    pub fn decode(bytes: &[u8; UFD_ENTRY_LEN]) -> Self {
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let name_raw = &bytes[0..10];
        let ext_raw = &bytes[10..12];
        let (filename, extension) = if name_raw[0] == 0 && name_raw[1] == 0 {
            (String::new(), String::new())
        } else {
            (bytes_to_ascii(name_raw), bytes_to_ascii(ext_raw))
        };
        Self {
            filename,
            extension,
            attributes: word(12),
            number_of_last_block: word(16),
            bytes_in_last_block: word(18),
            address: word(20),
            last_modification_date: word(24),
            last_modification_time: word(26),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filename.is_empty()
    }

    pub fn is_random(&self) -> bool {
        self.attributes & ATRAN != 0
    }

    pub fn is_contiguous(&self) -> bool {
        self.attributes & ATCON != 0
    }

    pub fn is_link(&self) -> bool {
        self.attributes & ATLNK != 0
    }

    pub fn file_type(&self) -> NovaFileType {
        if self.is_random() {
            NovaFileType::Random
        } else if self.is_contiguous() {
            NovaFileType::Contiguous
        } else {
            NovaFileType::Sequential
        }
    }

    pub fn fullname(&self) -> String {
        if self.extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }

    pub fn length_blocks(&self) -> u32 {
        self.number_of_last_block as u32 + 1
    }

    pub fn to_directory_entry(&self) -> DirectoryEntry {
        let mut attrs = FileAttributes::empty();
        if self.attributes & ATWP != 0 {
            attrs |= FileAttributes::READ_ONLY;
        }
        if self.attributes & ATPER != 0 {
            attrs |= FileAttributes::PROTECTED;
        }
        DirectoryEntry {
            name: self.fullname(),
            length_blocks: self.length_blocks(),
            created: dates::nova::decode(self.last_modification_date, self.last_modification_time)
                .map(|dt| dt.and_utc()),
            mode: FileMode::Image,
            attributes: attrs,
        }
    }
}

/// Free-block bitmap backing `MAP.DR`. `SCPPA` and below are always
/// considered used (they hold the disk ID block and the SYS.DR/MAP.DR
/// roots, never reassignable).
pub struct Bitmap {
    words: Vec<u16>,
}

impl Bitmap {
    pub fn from_words(words: Vec<u16>) -> Self {
        Self { words }
    }

    pub fn total_bits(&self) -> u32 {
        self.words.len() as u32 * 16
    }

    pub fn is_free(&self, block: u32) -> bool {
        if block < SCPPA {
            return false;
        }
        let bit_index = block - SCPPA;
        let word = self.words[(bit_index / 16) as usize];
        (word & (1 << (bit_index % 16))) == 0
    }

    pub fn set_used(&mut self, block: u32) {
        if block < SCPPA {
            return;
        }
        let bit_index = block - SCPPA;
        self.words[(bit_index / 16) as usize] |= 1 << (bit_index % 16);
    }

    pub fn set_free(&mut self, block: u32) {
        if block < SCPPA {
            return;
        }
        let bit_index = block - SCPPA;
        self.words[(bit_index / 16) as usize] &= !(1 << (bit_index % 16));
    }

    pub fn find_contiguous(&self, size: u32) -> FsResult<u32> {
        let mut run_start = None;
        let mut run_len = 0;
        for block in SCPPA..(self.total_bits() + SCPPA) {
            if self.is_free(block) {
                if run_len == 0 {
                    run_start = Some(block);
                }
                run_len += 1;
                if run_len == size {
                    return Ok(run_start.unwrap());
                }
            } else {
                run_len = 0;
            }
        }
        Err(FsError::NoSpace)
    }

    pub fn allocate(&mut self, size: u32, contiguous: bool) -> FsResult<Vec<u32>> {
        if contiguous && size != 1 {
            let start = self.find_contiguous(size)?;
            let blocks: Vec<u32> = (start..start + size).collect();
            for &b in &blocks {
                self.set_used(b);
            }
            return Ok(blocks);
        }
        let mut blocks = Vec::new();
        for block in SCPPA..(self.total_bits() + SCPPA) {
            if self.is_free(block) {
                self.set_used(block);
                blocks.push(block);
                if blocks.len() as u32 == size {
                    return Ok(blocks);
                }
            }
        }
        Err(FsError::NoSpace)
    }

    pub fn used(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn free(&self) -> u32 {
        self.total_bits() - self.used()
    }
}

/// Disk ID block: disk-wide characteristics (double addressing,
/// top-loader dual-platter, and the hash frame size).
pub struct DiskInformationBlock {
    pub characteristics: u16,
    pub frame_size: u32,
}

const CHDOBL: u16 = 1 << 15;
const CHTOPL: u16 = 1 << 14;

impl DiskInformationBlock {
    pub fn read(device: &mut dyn BlockDevice) -> FsResult<Self> {
        let mut block = vec![0u8; BLOCK_SIZE];
        device.read_block(DISK_ID_BLOCK, &mut block)?;
        let characteristics = u16::from_le_bytes([block[0], block[1]]);
        let frame_size = u16::from_le_bytes([block[2], block[3]]) as u32;
        Ok(Self {
            characteristics,
            frame_size: if frame_size == 0 { 0xFFFF } else { frame_size },
        })
    }

    pub fn is_double_addressing(&self) -> bool {
        self.characteristics & CHDOBL != 0
    }

    pub fn is_top_loader(&self) -> bool {
        self.characteristics & CHTOPL != 0
    }
}

pub struct NovaFilesystem {
    device: Box<dyn BlockDevice>,
    volume_name: String,
    sys_dr_blocks: Vec<u32>,
}

impl NovaFilesystem {
    pub fn mount(mut device: Box<dyn BlockDevice>, sys_dr_blocks: Vec<u32>, strict: bool) -> FsResult<Self> {
        let info = DiskInformationBlock::read(device.as_mut())?;
        if strict && info.frame_size == 0 {
            return Err(FsError::Corrupt("Nova disk information block has a zero frame size".into()));
        }
        Ok(Self {
            device,
            volume_name: "RDOS".into(),
            sys_dr_blocks,
        })
    }

    pub fn list(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut block = vec![0u8; BLOCK_SIZE];
        for &block_number in &self.sys_dr_blocks {
            self.device.read_block(block_number, &mut block)?;
            let mut offset = 0;
            while offset + UFD_ENTRY_LEN <= BLOCK_SIZE {
                let raw: [u8; UFD_ENTRY_LEN] = block[offset..offset + UFD_ENTRY_LEN].try_into().unwrap();
                let entry = UfdEntry::decode(&raw);
                if !entry.is_empty() && !entry.is_link() {
                    entries.push(entry.to_directory_entry());
                }
                offset += UFD_ENTRY_LEN;
            }
        }
        Ok(entries)
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

    #[test]
    fn filename_hash_is_position_weighted() {
        let h1 = filename_hash("FOO", "DAT", 0xFFFF);
        let h2 = filename_hash("OOF", "DAT", 0xFFFF);
        assert_ne!(h1, h2);
        assert!(h1 < 0xFFFF);
    }

    #[test]
    fn bitmap_allocate_contiguous_then_free() {
        let mut bitmap = Bitmap::from_words(vec![0u16; 4]);
        let blocks = bitmap.allocate(5, true).unwrap();
        assert_eq!(blocks.len(), 5);
        assert_eq!(bitmap.used(), 5);
        for b in &blocks {
            bitmap.set_free(*b);
        }
        assert_eq!(bitmap.used(), 0);
    }

    #[test]
    fn bitmap_below_scppa_is_never_free() {
        let bitmap = Bitmap::from_words(vec![0u16; 1]);
        assert!(!bitmap.is_free(0));
        assert!(!bitmap.is_free(SCPPA - 1));
        assert!(bitmap.is_free(SCPPA));
    }

    #[test]
    fn ufd_entry_round_trips_name_and_type() {
        let mut bytes = [0u8; UFD_ENTRY_LEN];
        bytes[0..10].copy_from_slice(&ascii_to_bytes("FOO", 10));
        bytes[10..12].copy_from_slice(&ascii_to_bytes("DT", 2));
        bytes[12..14].copy_from_slice(&ATCON.to_le_bytes());
        bytes[16..18].copy_from_slice(&9u16.to_le_bytes());
        let entry = UfdEntry::decode(&bytes);
        assert_eq!(entry.fullname(), "FOO.DT");
        assert_eq!(entry.file_type(), NovaFileType::Contiguous);
        assert_eq!(entry.length_blocks(), 10);
    }

    #[test]
    fn disk_information_block_reports_frame_size() {
        let mut data = vec![0u8; BLOCK_SIZE * 8];
        let offset = DISK_ID_BLOCK as usize * BLOCK_SIZE;
        data[offset..offset + 2].copy_from_slice(&CHTOPL.to_le_bytes());
        data[offset + 2..offset + 4].copy_from_slice(&100u16.to_le_bytes());
        let device: Box<dyn BlockDevice> = Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 8));
        let fs = NovaFilesystem::mount(device, vec![6], true).unwrap();
        assert_eq!(fs.volume_name(), "RDOS");
    }
}
