//! Apple ProDOS. Directory entries are 39-byte records in a chain of
//! directory blocks rooted at block 2 (the volume directory). Regular
//! files are **seedling** (data fits one block, the file entry's key
//! pointer *is* the data block), **sapling** (key pointer is an index
//! block of up to 256 data-block pointers), or **tree** (key pointer is
//! a master index of up to 128 index-block pointers, each indexing up
//! to 256 data blocks). **Extended files** store two 256-byte
//! mini-entries (data fork, resource fork) in a single key block.
//! Grounded on `xferx/apple2/prodosfs.py`.

use xferx_common::dates;
use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const ENTRY_SIZE: usize = 39;
const ENTRIES_PER_BLOCK: usize = 13;
const FILENAME_LEN: usize = 15;
const VOLUME_DIRECTORY_BLOCK: u32 = 2;
const INDEX_ENTRIES: usize = BLOCK_SIZE / 2;

pub const INACTIVE_STORAGE_TYPE: u8 = 0x0;
pub const SEEDLING_FILE_STORAGE_TYPE: u8 = 0x1;
pub const SAPLING_FILE_STORAGE_TYPE: u8 = 0x2;
pub const TREE_FILE_STORAGE_TYPE: u8 = 0x3;
pub const EXTENDED_FILE_STORAGE_TYPE: u8 = 0x5;
pub const PASCAL_AREA_STORAGE_TYPE: u8 = 0x4;
pub const SUBDIRECTORY_HEADER_STORAGE_TYPE: u8 = 0xE;
pub const VOLUME_DIRECTORY_HEADER_STORAGE_TYPE: u8 = 0xF;

pub const ACCESS_WRITE_ENABLE: u8 = 0x02;
pub const ACCESS_READ_ENABLE: u8 = 0x01;

pub struct DirHeader {
    pub storage_type: u8,
    pub name: String,
    pub entry_length: u8,
    pub entries_per_block: u8,
    pub file_count: u16,
    pub next_block: u32,
}

pub struct FileEntry {
    pub storage_type: u8,
    pub name: String,
    pub file_type: u8,
    pub key_pointer: u32,
    pub blocks_used: u16,
    pub eof: u32,
    pub creation: Option<chrono::NaiveDateTime>,
}

impl FileEntry {
    fn decode(bytes: &[u8; ENTRY_SIZE]) -> Option<Self> {
        let storage_and_len = bytes[0];
        let storage_type = storage_and_len >> 4;
        let name_len = (storage_and_len & 0x0F) as usize;
        if storage_type == INACTIVE_STORAGE_TYPE {
            return None;
        }
        let name = String::from_utf8_lossy(&bytes[1..1 + name_len.min(FILENAME_LEN)]).to_string();
        let file_type = bytes[16];
        let key_pointer = u16::from_le_bytes([bytes[17], bytes[18]]) as u32;
        let blocks_used = u16::from_le_bytes([bytes[19], bytes[20]]);
        let eof = bytes[21] as u32 | ((bytes[22] as u32) << 8) | ((bytes[23] as u32) << 16);
        let creation_date = u16::from_le_bytes([bytes[24], bytes[25]]);
        let creation_time = u16::from_le_bytes([bytes[26], bytes[27]]);
        Some(Self {
            storage_type,
            name,
            file_type,
            key_pointer,
            blocks_used,
            eof,
            creation: dates::prodos::decode(creation_date, creation_time),
        })
    }

    pub fn is_seedling(&self) -> bool {
        self.storage_type == SEEDLING_FILE_STORAGE_TYPE
    }

    pub fn is_sapling(&self) -> bool {
        self.storage_type == SAPLING_FILE_STORAGE_TYPE
    }

    pub fn is_tree(&self) -> bool {
        self.storage_type == TREE_FILE_STORAGE_TYPE
    }

    pub fn is_directory(&self) -> bool {
        self.storage_type == SUBDIRECTORY_HEADER_STORAGE_TYPE
    }

    pub fn is_extended(&self) -> bool {
        self.storage_type == EXTENDED_FILE_STORAGE_TYPE
    }

    /// True for a PPM (Pascal ProFile Manager) partition file: a
    /// contiguous run reserved for nested Apple Pascal volumes. See
    /// [`crate::ppm`].
    pub fn is_pascal_area(&self) -> bool {
        self.storage_type == PASCAL_AREA_STORAGE_TYPE
    }

    pub fn to_directory_entry(&self) -> DirectoryEntry {
        let attrs = FileAttributes::empty();
        DirectoryEntry {
            name: self.name.clone(),
            length_blocks: self.blocks_used as u32,
            created: self.creation.map(|dt| dt.and_utc()),
            mode: FileMode::Image,
            attributes: attrs,
        }
    }
}

fn read_dir_header(block: &[u8; BLOCK_SIZE]) -> DirHeader {
    let storage_and_len = block[4];
    let storage_type = storage_and_len >> 4;
    let name_len = (storage_and_len & 0x0F) as usize;
    let name = String::from_utf8_lossy(&block[5..5 + name_len.min(FILENAME_LEN)]).to_string();
    let entry_length = block[35];
    let entries_per_block = block[36];
    let file_count = u16::from_le_bytes([block[37], block[38]]);
    let next_block = u16::from_le_bytes([block[2], block[3]]) as u32;
    DirHeader {
        storage_type,
        name,
        entry_length,
        entries_per_block,
        file_count,
        next_block,
    }
}

/// Computes the blocks required for a tree-shaped file: `n` data
/// blocks + `ceil(n/256)` index blocks + 1 master index (only for
/// saplings needing more than one index block).
pub fn blocks_for_tree_file(data_blocks: u32) -> u32 {
    if data_blocks <= 1 {
        return data_blocks;
    }
    let index_blocks = data_blocks.div_ceil(256);
    if index_blocks <= 1 {
        data_blocks + 1
    } else {
        data_blocks + index_blocks + 1
    }
}

pub struct ProdosFilesystem {
    device: Box<dyn BlockDevice>,
    volume_name: String,
}

impl ProdosFilesystem {
    pub fn mount(mut device: Box<dyn BlockDevice>, strict: bool) -> FsResult<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        device.read_block(VOLUME_DIRECTORY_BLOCK, &mut block)?;
        let header = read_dir_header(&block);
        if strict && header.storage_type != VOLUME_DIRECTORY_HEADER_STORAGE_TYPE {
            return Err(FsError::Corrupt("ProDOS volume directory header storage type mismatch".into()));
        }
        log::debug!("mounted ProDOS volume {:?}", header.name);
        Ok(Self {
            device,
            volume_name: header.name,
        })
    }

    /// Reads every active entry from the volume directory's block chain.
    pub fn list(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut block_number = VOLUME_DIRECTORY_BLOCK;
        let mut first = true;
        loop {
            let mut block = [0u8; BLOCK_SIZE];
            self.device.read_block(block_number, &mut block)?;
            let header = if first {
                Some(read_dir_header(&block))
            } else {
                None
            };
            let start = if first { ENTRY_SIZE } else { 4 };
            let mut offset = start;
            while offset + ENTRY_SIZE <= BLOCK_SIZE {
                let raw: [u8; ENTRY_SIZE] = block[offset..offset + ENTRY_SIZE].try_into().unwrap();
                if let Some(entry) = FileEntry::decode(&raw) {
                    entries.push(entry.to_directory_entry());
                }
                offset += ENTRY_SIZE;
            }
            let next = if first {
                header.unwrap().next_block
            } else {
                u16::from_le_bytes([block[2], block[3]]) as u32
            };
            first = false;
            if next == 0 {
                break;
            }
            block_number = next;
        }
        Ok(entries)
    }

    /// Resolves a seedling/sapling/tree file's data blocks in order.
    pub fn file_blocks(&mut self, entry: &FileEntry) -> FsResult<Vec<u32>> {
        match entry.storage_type {
            SEEDLING_FILE_STORAGE_TYPE => Ok(vec![entry.key_pointer]),
            SAPLING_FILE_STORAGE_TYPE => self.read_index_block(entry.key_pointer, entry.blocks_used as usize),
            TREE_FILE_STORAGE_TYPE => {
                let mut block = [0u8; BLOCK_SIZE];
                self.device.read_block(entry.key_pointer, &mut block)?;
                let mut data_blocks = Vec::new();
                for i in 0..128 {
                    let lo = block[i] as u32;
                    let hi = block[256 + i] as u32;
                    let index_block = lo | (hi << 8);
                    if index_block == 0 {
                        continue;
                    }
                    let remaining = entry.blocks_used as usize - data_blocks.len();
                    if remaining == 0 {
                        break;
                    }
                    data_blocks.extend(self.read_index_block(index_block, remaining.min(INDEX_ENTRIES))?);
                }
                Ok(data_blocks)
            }
            _ => Err(FsError::Invalid("not a regular ProDOS file storage type".into())),
        }
    }

    fn read_index_block(&mut self, index_block: u32, max_entries: usize) -> FsResult<Vec<u32>> {
        let mut block = [0u8; BLOCK_SIZE];
        self.device.read_block(index_block, &mut block)?;
        let mut data_blocks = Vec::new();
        for i in 0..256.min(max_entries) {
            let lo = block[i] as u32;
            let hi = block[256 + i] as u32;
            let data_block = lo | (hi << 8);
            if data_block != 0 {
                data_blocks.push(data_block);
            }
        }
        Ok(data_blocks)
    }

    pub fn read_file(&mut self, entry: &FileEntry) -> FsResult<Vec<u8>> {
        let blocks = self.file_blocks(entry)?;
        let mut data = Vec::with_capacity(blocks.len() * BLOCK_SIZE);
        let mut block = [0u8; BLOCK_SIZE];
        for b in blocks {
            self.device.read_block(b, &mut block)?;
            data.extend_from_slice(&block);
        }
        data.truncate(entry.eof as usize);
        Ok(data)
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
        let mut data = vec![0u8; BLOCK_SIZE * 8];
        let dir_block = &mut data[VOLUME_DIRECTORY_BLOCK as usize * BLOCK_SIZE..][..BLOCK_SIZE];
        dir_block[4] = (VOLUME_DIRECTORY_HEADER_STORAGE_TYPE << 4) | 6;
        dir_block[5..11].copy_from_slice(b"MYDISK");
        dir_block[35] = ENTRY_SIZE as u8;
        dir_block[36] = ENTRIES_PER_BLOCK as u8;
        dir_block[37..39].copy_from_slice(&1u16.to_le_bytes());

        let entry_offset = ENTRY_SIZE;
        dir_block[entry_offset] = (SEEDLING_FILE_STORAGE_TYPE << 4) | 3;
        dir_block[entry_offset + 1..entry_offset + 4].copy_from_slice(b"FOO");
        dir_block[entry_offset + 16] = 0x04;
        dir_block[entry_offset + 17..entry_offset + 19].copy_from_slice(&5u16.to_le_bytes());
        dir_block[entry_offset + 19..entry_offset + 21].copy_from_slice(&1u16.to_le_bytes());
        dir_block[entry_offset + 21..entry_offset + 24].copy_from_slice(&[200, 0, 0]);

        Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 8))
    }

    #[test]
    fn mount_reads_the_volume_name() {
        let fs = ProdosFilesystem::mount(make_volume(), true).unwrap();
        assert_eq!(fs.volume_name(), "MYDISK");
    }

    #[test]
    fn list_finds_the_seedling_entry() {
        let mut fs = ProdosFilesystem::mount(make_volume(), true).unwrap();
        let entries = fs.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "FOO");
        assert_eq!(entries[0].length_blocks, 1);
    }

    #[test]
    fn tree_file_block_count_adds_index_and_master_blocks() {
        assert_eq!(blocks_for_tree_file(1), 1);
        assert_eq!(blocks_for_tree_file(256), 257);
        assert_eq!(blocks_for_tree_file(257), 257 + 2 + 1);
    }
}
