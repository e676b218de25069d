//! UNIX v0/v1/v5/v6/v7 on PDP-7/PDP-11: a super-block, a fixed-size
//! inode table starting at block 2, and directories that are themselves
//! regular files of 16-byte `(inode_num, name[14])` entries. Addressing
//! differs by era: v0/v1/v5/v6 inodes hold 8×16-bit block numbers with
//! direct/indirect/double-indirect interpretation selected by the
//! `LARGE` flag and whether the last slot is non-zero ("huge" files);
//! v7 packs 13×3-byte (24-bit) addresses with 10 direct + single +
//! double + triple indirect slots. Grounded on
//! `xferx/unix/{commons,unix4fs,unix6fs,unix7fs}.py`.

use xferx_common::byteswap::word_swap32;
use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const INODE_TABLE_START_BLOCK: u32 = 2;
const FILENAME_LEN: usize = 14;
const DIR_ENTRY_LEN: usize = 16;

pub const V4_USED: u16 = 0o100000;
pub const V4_DIR: u16 = 0o040000;
pub const V4_LARGE: u16 = 0o010000;
pub const V4_NADDR: usize = 8;
pub const V4_INODE_SIZE: usize = 32;

pub const V7_DIR: u16 = 0o0040000;
pub const V7_NADDR: usize = 13;
pub const V7_INODE_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnixVersion {
    V4,
    V6,
    V7,
}

impl UnixVersion {
    fn inode_size(self) -> usize {
        match self {
            UnixVersion::V4 | UnixVersion::V6 => V4_INODE_SIZE,
            UnixVersion::V7 => V7_INODE_SIZE,
        }
    }
}

/// Unpacks `n` little-endian 24-bit (3-byte) addresses, as used by v7's
/// `addr[13]` field.
pub fn l3tol(data: &[u8], n: usize) -> Vec<u32> {
    (0..n)
        .map(|i| {
            let o = i * 3;
            if o + 3 > data.len() {
                0
            } else {
                data[o] as u32 | ((data[o + 1] as u32) << 8) | ((data[o + 2] as u32) << 16)
            }
        })
        .collect()
}

fn iterate_words(block: &[u8]) -> impl Iterator<Item = u32> + '_ {
    block.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]) as u32)
}

fn iterate_long(block: &[u8]) -> impl Iterator<Item = u32> + '_ {
    block.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

pub struct Inode {
    pub inode_num: u32,
    pub version: UnixVersion,
    pub flags: u16,
    pub nlinks: u32,
    pub uid: u16,
    pub size: u64,
    pub addr: Vec<u32>,
    pub mtime: u32,
}

impl Inode {
    fn decode_v4(inode_num: u32, bytes: &[u8]) -> Self {
        let flags = u16::from_le_bytes([bytes[0], bytes[1]]);
        let nlinks = bytes[2] as u32;
        let uid = bytes[3] as u16;
        let sz0 = bytes[4] as u64;
        let sz1 = u16::from_le_bytes([bytes[5], bytes[6]]) as u64;
        let addr: Vec<u32> = (0..V4_NADDR)
            .map(|i| u16::from_le_bytes([bytes[8 + i * 2], bytes[8 + i * 2 + 1]]) as u32)
            .collect();
        let mtime_raw = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);
        Self {
            inode_num,
            version: UnixVersion::V4,
            flags,
            nlinks,
            uid,
            size: (sz0 << 16) + sz1,
            addr,
            mtime: word_swap32(mtime_raw),
        }
    }

    fn decode_v7(inode_num: u32, bytes: &[u8]) -> Self {
        let flags = u16::from_le_bytes([bytes[0], bytes[1]]);
        let nlinks = u16::from_le_bytes([bytes[2], bytes[3]]) as u32;
        let uid = u16::from_le_bytes([bytes[4], bytes[5]]);
        let sz0 = u16::from_le_bytes([bytes[8], bytes[9]]) as u64;
        let sz1 = u16::from_le_bytes([bytes[10], bytes[11]]) as u64;
        let addr = l3tol(&bytes[12..12 + 40], V7_NADDR);
        let mtime_offset = 12 + 40 + 4;
        let mtime_raw = u32::from_le_bytes([
            bytes[mtime_offset],
            bytes[mtime_offset + 1],
            bytes[mtime_offset + 2],
            bytes[mtime_offset + 3],
        ]);
        Self {
            inode_num,
            version: UnixVersion::V7,
            flags,
            nlinks,
            uid,
            size: (sz0 << 16) + sz1,
            addr,
            mtime: word_swap32(mtime_raw),
        }
    }

    pub fn is_allocated(&self) -> bool {
        match self.version {
            UnixVersion::V4 | UnixVersion::V6 => self.flags & V4_USED != 0,
            UnixVersion::V7 => self.flags != 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        match self.version {
            UnixVersion::V4 | UnixVersion::V6 => self.flags & V4_DIR == V4_DIR,
            UnixVersion::V7 => self.flags & V7_DIR == V7_DIR,
        }
    }

    pub fn is_large(&self) -> bool {
        self.flags & V4_LARGE != 0
    }

    /// True for v6 files whose last `addr` slot is non-zero while
    /// `LARGE` is also set — the undocumented-by-flag "huge" case
    /// spec.md calls out explicitly.
    pub fn is_huge(&self) -> bool {
        self.version == UnixVersion::V6 && self.is_large() && *self.addr.last().unwrap_or(&0) != 0
    }

    pub fn block_count(&self) -> usize {
        self.size.div_ceil(BLOCK_SIZE as u64) as usize
    }

    /// Walks this inode's direct/indirect/double-indirect (v6) or
    /// direct/single/double/triple-indirect (v7) block map, yielding
    /// logical block numbers in file order. Stops at the first zero
    /// entry (sparse files are legal and simply have holes).
    pub fn blocks(&self, device: &mut dyn BlockDevice) -> FsResult<Vec<u32>> {
        match self.version {
            UnixVersion::V7 => self.blocks_v7(device),
            UnixVersion::V6 if self.is_huge() => self.blocks_v6_huge(device),
            UnixVersion::V4 | UnixVersion::V6 if self.is_large() => self.blocks_indirect(device, &self.addr),
            _ => Ok(self.addr.iter().take_while(|&&b| b != 0).copied().collect()),
        }
    }

    fn blocks_indirect(&self, device: &mut dyn BlockDevice, addr: &[u32]) -> FsResult<Vec<u32>> {
        let mut out = Vec::new();
        for &block_number in addr {
            if block_number == 0 {
                break;
            }
            let mut block = vec![0u8; BLOCK_SIZE];
            device.read_block(block_number, &mut block)?;
            for n in iterate_words(&block) {
                if n == 0 {
                    break;
                }
                out.push(n);
            }
        }
        Ok(out)
    }

    fn blocks_v6_huge(&self, device: &mut dyn BlockDevice) -> FsResult<Vec<u32>> {
        let mut out = Vec::new();
        for (index, &block_number) in self.addr.iter().enumerate() {
            if block_number == 0 {
                break;
            }
            if index < V4_NADDR - 1 {
                let mut block = vec![0u8; BLOCK_SIZE];
                device.read_block(block_number, &mut block)?;
                for n in iterate_words(&block) {
                    if n == 0 {
                        break;
                    }
                    out.push(n);
                }
            } else {
                let mut double = vec![0u8; BLOCK_SIZE];
                device.read_block(block_number, &mut double)?;
                for d in iterate_words(&double) {
                    if d == 0 {
                        break;
                    }
                    let mut indirect = vec![0u8; BLOCK_SIZE];
                    device.read_block(d, &mut indirect)?;
                    for n in iterate_words(&indirect) {
                        if n == 0 {
                            break;
                        }
                        out.push(n);
                    }
                }
            }
        }
        Ok(out)
    }

    fn blocks_v7(&self, device: &mut dyn BlockDevice) -> FsResult<Vec<u32>> {
        let mut out = Vec::new();
        let mut remaining = self.size as i64;
        for &block_number in &self.addr[..self.addr.len() - 3] {
            if block_number == 0 {
                break;
            }
            remaining -= BLOCK_SIZE as i64;
            out.push(block_number);
        }
        if remaining > 0 {
            let block_number = self.addr[self.addr.len() - 3];
            if block_number != 0 {
                let mut block = vec![0u8; BLOCK_SIZE];
                device.read_block(block_number, &mut block)?;
                for n in iterate_long(&block) {
                    if n != 0 {
                        remaining -= BLOCK_SIZE as i64;
                        out.push(n);
                    }
                }
            }
        }
        if remaining > 0 {
            let block_number = self.addr[self.addr.len() - 2];
            if block_number != 0 {
                let mut outer = vec![0u8; BLOCK_SIZE];
                device.read_block(block_number, &mut outer)?;
                for d in iterate_long(&outer) {
                    if d == 0 {
                        break;
                    }
                    let mut inner = vec![0u8; BLOCK_SIZE];
                    device.read_block(d, &mut inner)?;
                    for n in iterate_long(&inner) {
                        if n != 0 {
                            remaining -= BLOCK_SIZE as i64;
                            out.push(n);
                        }
                    }
                    if remaining <= 0 {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }
}

pub struct DirEntry {
    pub inode_num: u32,
    pub name: String,
}

/// Parses a directory file's body into `(inode_num, name)` entries;
/// skips entries with inode number 0 (deleted/unused slots).
pub fn parse_directory(data: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset + DIR_ENTRY_LEN <= data.len() {
        let inode_num = u16::from_le_bytes([data[offset], data[offset + 1]]) as u32;
        if inode_num != 0 {
            let name_bytes = &data[offset + 2..offset + 2 + FILENAME_LEN];
            let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(FILENAME_LEN);
            entries.push(DirEntry {
                inode_num,
                name: String::from_utf8_lossy(&name_bytes[..end]).to_string(),
            });
        }
        offset += DIR_ENTRY_LEN;
    }
    entries
}

pub struct UnixFilesystem {
    device: Box<dyn BlockDevice>,
    version: UnixVersion,
    volume_name: String,
}

impl UnixFilesystem {
    pub fn mount(device: Box<dyn BlockDevice>, version: UnixVersion, strict: bool) -> FsResult<Self> {
        if strict && device.block_count() < 4 {
            return Err(FsError::Corrupt("UNIX image is too small to hold a super-block and inode table".into()));
        }
        Ok(Self {
            device,
            version,
            volume_name: match version {
                UnixVersion::V4 => "UNIXV4".into(),
                UnixVersion::V6 => "UNIXV6".into(),
                UnixVersion::V7 => "UNIXV7".into(),
            },
        })
    }

    pub fn read_inode(&mut self, inode_num: u32) -> FsResult<Inode> {
        let inode_size = self.version.inode_size();
        let byte_offset = BLOCK_SIZE as u64 * INODE_TABLE_START_BLOCK as u64 + (inode_num - 1) as u64 * inode_size as u64;
        let block = byte_offset / BLOCK_SIZE as u64;
        let in_block = (byte_offset % BLOCK_SIZE as u64) as usize;
        let mut buf = vec![0u8; BLOCK_SIZE];
        self.device.read_block(block as u32, &mut buf)?;
        let bytes = if in_block + inode_size <= BLOCK_SIZE {
            buf[in_block..in_block + inode_size].to_vec()
        } else {
            let mut next = vec![0u8; BLOCK_SIZE];
            self.device.read_block(block as u32 + 1, &mut next)?;
            let mut combined = buf[in_block..].to_vec();
            combined.extend_from_slice(&next[..inode_size - combined.len()]);
            combined
        };
        Ok(match self.version {
            UnixVersion::V4 | UnixVersion::V6 => Inode::decode_v4(inode_num, &bytes),
            UnixVersion::V7 => Inode::decode_v7(inode_num, &bytes),
        })
    }

    pub fn read_file(&mut self, inode: &Inode) -> FsResult<Vec<u8>> {
        let blocks = inode.blocks(self.device.as_mut())?;
        let mut data = Vec::with_capacity(blocks.len() * BLOCK_SIZE);
        let mut block = vec![0u8; BLOCK_SIZE];
        for &b in &blocks {
            self.device.read_block(b, &mut block)?;
            data.extend_from_slice(&block);
        }
        data.truncate(inode.size as usize);
        Ok(data)
    }

    pub fn list_directory(&mut self, dir_inode: &Inode) -> FsResult<Vec<DirectoryEntry>> {
        let data = self.read_file(dir_inode)?;
        let mut entries = Vec::new();
        for entry in parse_directory(&data) {
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            let inode = self.read_inode(entry.inode_num)?;
            entries.push(DirectoryEntry {
                name: entry.name,
                length_blocks: inode.block_count() as u32,
                created: chrono::DateTime::from_timestamp(inode.mtime as i64, 0),
                mode: FileMode::Image,
                attributes: if inode.is_dir() {
                    FileAttributes::empty()
                } else {
                    FileAttributes::empty()
                },
            });
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

    #[test]
    fn l3tol_unpacks_24_bit_little_endian_addresses() {
        let data = [0x01, 0x00, 0x00, 0x02, 0x00, 0x00];
        let addrs = l3tol(&data, 2);
        assert_eq!(addrs, vec![1, 2]);
    }

    #[test]
    fn v4_inode_decodes_flags_and_size() {
        let mut bytes = [0u8; V4_INODE_SIZE];
        bytes[0..2].copy_from_slice(&(V4_USED | V4_DIR).to_le_bytes());
        bytes[5..7].copy_from_slice(&300u16.to_le_bytes());
        let inode = Inode::decode_v4(1, &bytes);
        assert!(inode.is_allocated());
        assert!(inode.is_dir());
        assert_eq!(inode.size, 300);
    }

    #[test]
    fn huge_v6_file_is_detected_only_with_large_flag_and_nonzero_last_slot() {
        let mut bytes = [0u8; V4_INODE_SIZE];
        bytes[0..2].copy_from_slice(&(V4_USED | V4_LARGE).to_le_bytes());
        bytes[8 + 7 * 2..8 + 7 * 2 + 2].copy_from_slice(&42u16.to_le_bytes());
        let mut inode = Inode::decode_v4(1, &bytes);
        inode.version = UnixVersion::V6;
        assert!(inode.is_huge());
    }

    #[test]
    fn directory_parse_skips_zero_inode_slots() {
        let mut data = vec![0u8; DIR_ENTRY_LEN * 2];
        data[0..2].copy_from_slice(&5u16.to_le_bytes());
        data[2..5].copy_from_slice(b"abc");
        let entries = parse_directory(&data);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "abc");
    }
}
