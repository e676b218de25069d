//! PPM (Pascal ProFile Manager). A PPM partition is a contiguous
//! ProDOS file of type `PAS` and storage type 4 (see
//! [`crate::prodos::PASCAL_AREA_STORAGE_TYPE`]) that starts at the
//! file's key pointer and runs to the end of the disk. The first two
//! blocks are a Pascal Volume Directory describing up to 31 nested
//! Apple Pascal volumes, each of which is mounted with
//! [`crate::pascal::PascalFilesystem`]. Grounded on `xferx/apple2/ppm.py`.

use xferx_common::pascal_str::PascalString;
use xferx_core::{BlockDevice, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const HEADER_BLOCKS: u32 = 2;
const MAX_VOLUMES: usize = 31;
const INFO_ENTRY_SIZE: usize = 8;
const DESCRIPTION_BASE: usize = 0x100;
const DESCRIPTION_ENTRY_SIZE: usize = 0x16;
const DESCRIPTION_LENGTH: usize = 16;
const NAME_BASE: usize = 0x300;
const NAME_ENTRY_SIZE: usize = 8;

/// A single nested Apple Pascal volume as described by the PPM
/// volume directory, relative to the partition's own key block.
pub struct PpmVolumeInfo {
    pub index: usize,
    pub start_block: u16,
    pub length_blocks: u16,
    pub default_unit: u8,
    pub write_protected: bool,
    pub description: String,
    pub name: String,
}

impl PpmVolumeInfo {
    /// Absolute block number of this nested volume, given the block
    /// number the PPM partition's directory itself lives at.
    pub fn absolute_start_block(&self, partition_key_block: u32) -> u32 {
        partition_key_block + self.start_block as u32
    }
}

pub struct PpmVolumeDirectory {
    pub size_blocks: u16,
    pub number_of_volumes: u16,
    pub volumes: Vec<PpmVolumeInfo>,
}

impl PpmVolumeDirectory {
    pub fn read(device: &mut dyn BlockDevice, key_block: u32) -> FsResult<Self> {
        let mut buffer = vec![0u8; BLOCK_SIZE * HEADER_BLOCKS as usize];
        for i in 0..HEADER_BLOCKS {
            device.read_block(key_block + i, &mut buffer[(i as usize) * BLOCK_SIZE..(i as usize + 1) * BLOCK_SIZE])?;
        }
        let size_blocks = u16::from_le_bytes([buffer[0], buffer[1]]);
        let number_of_volumes = u16::from_le_bytes([buffer[2], buffer[3]]);
        let tag = PascalString::decode(&buffer[4..8]);
        if tag.as_str() != "PPM" {
            return Err(FsError::Corrupt("PPM volume directory missing 'PPM' tag".into()));
        }

        let count = (number_of_volumes as usize).min(MAX_VOLUMES);
        let mut volumes = Vec::with_capacity(count);
        for n in 1..=count {
            let info_offset = n * INFO_ENTRY_SIZE;
            if info_offset + INFO_ENTRY_SIZE > buffer.len() {
                break;
            }
            let start_block = u16::from_le_bytes([buffer[info_offset], buffer[info_offset + 1]]);
            let length_blocks = u16::from_le_bytes([buffer[info_offset + 2], buffer[info_offset + 3]]);
            let default_unit = buffer[info_offset + 4];
            let write_protected = buffer[info_offset + 5] != 0;

            let desc_offset = DESCRIPTION_BASE + n * DESCRIPTION_ENTRY_SIZE;
            let description = if desc_offset + DESCRIPTION_LENGTH <= buffer.len() {
                PascalString::decode(&buffer[desc_offset..desc_offset + DESCRIPTION_LENGTH]).as_str().to_string()
            } else {
                String::new()
            };

            let name_offset = NAME_BASE + n * NAME_ENTRY_SIZE;
            let name = if name_offset + NAME_ENTRY_SIZE <= buffer.len() {
                PascalString::decode(&buffer[name_offset..name_offset + NAME_ENTRY_SIZE]).as_str().to_string()
            } else {
                String::new()
            };

            volumes.push(PpmVolumeInfo {
                index: n,
                start_block,
                length_blocks,
                default_unit,
                write_protected,
                description,
                name,
            });
        }

        log::debug!("PPM partition directory at block {key_block} lists {number_of_volumes} volume(s)");
        Ok(Self {
            size_blocks,
            number_of_volumes,
            volumes,
        })
    }
}

/// A sub-device exposing a single nested Pascal volume's blocks as
/// block 0..length, so it can be handed to
/// [`crate::pascal::PascalFilesystem::mount`] unmodified.
pub struct PpmVolumeDevice<'a> {
    device: &'a mut dyn BlockDevice,
    base_block: u32,
    length_blocks: u32,
}

impl<'a> PpmVolumeDevice<'a> {
    pub fn new(device: &'a mut dyn BlockDevice, base_block: u32, length_blocks: u32) -> Self {
        Self { device, base_block, length_blocks }
    }
}

impl<'a> BlockDevice for PpmVolumeDevice<'a> {
    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FsResult<()> {
        if block >= self.length_blocks {
            return Err(FsError::Invalid(format!("PPM volume block {block} out of range")));
        }
        self.device.read_block(self.base_block + block, buf)
    }

    fn write_block(&mut self, block: u32, buf: &[u8]) -> FsResult<()> {
        if block >= self.length_blocks {
            return Err(FsError::Invalid(format!("PPM volume block {block} out of range")));
        }
        self.device.write_block(self.base_block + block, buf)
    }

    fn block_count(&self) -> u32 {
        self.length_blocks
    }

    fn block_size(&self) -> usize {
        self.device.block_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use xferx_core::ByteFile;

    fn make_partition() -> Box<dyn BlockDevice> {
        let mut data = vec![0u8; BLOCK_SIZE * 40];
        data[0..2].copy_from_slice(&40u16.to_le_bytes());
        data[2..4].copy_from_slice(&1u16.to_le_bytes());
        let tag = PascalString::new("PPM").encode(4);
        data[4..8].copy_from_slice(&tag);

        let info_offset = 1 * INFO_ENTRY_SIZE;
        data[info_offset..info_offset + 2].copy_from_slice(&2u16.to_le_bytes());
        data[info_offset + 2..info_offset + 4].copy_from_slice(&38u16.to_le_bytes());

        let name_offset = NAME_BASE + 1 * NAME_ENTRY_SIZE;
        let name = PascalString::new("VOL1").encode(NAME_ENTRY_SIZE);
        data[name_offset..name_offset + NAME_ENTRY_SIZE].copy_from_slice(&name);

        Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 40))
    }

    #[test]
    fn reads_the_single_nested_volume_info() {
        let mut device = make_partition();
        let dir = PpmVolumeDirectory::read(device.as_mut(), 0).unwrap();
        assert_eq!(dir.number_of_volumes, 1);
        assert_eq!(dir.volumes.len(), 1);
        assert_eq!(dir.volumes[0].name, "VOL1");
        assert_eq!(dir.volumes[0].start_block, 2);
        assert_eq!(dir.volumes[0].length_blocks, 38);
    }

    #[test]
    fn rejects_a_directory_missing_the_ppm_tag() {
        let mut data = vec![0u8; BLOCK_SIZE * 2];
        let mut device: Box<dyn BlockDevice> = Box::new(ByteFile::new(Cursor::new(std::mem::take(&mut data)), BLOCK_SIZE, 2));
        assert!(PpmVolumeDirectory::read(device.as_mut(), 0).is_err());
    }

    #[test]
    fn nested_volume_device_offsets_block_numbers() {
        let mut backing = make_partition();
        let mut nested = PpmVolumeDevice::new(backing.as_mut(), 2, 38);
        let mut buf = vec![0u8; BLOCK_SIZE];
        assert!(nested.read_block(0, &mut buf).is_ok());
        assert!(nested.read_block(38, &mut buf).is_err());
    }
}
