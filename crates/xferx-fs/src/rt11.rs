//! RT-11: a single, flat, 2-block directory segment chain. Ported from
//! `xferx/pdp11/rt11fs.py`: entries are RAD-50 name+extension plus a
//! length and a creation date, describing a strictly contiguous run of
//! data blocks; free space is just another entry type (`EMPTY`) rather
//! than a separate bitmap.

use std::fmt;

use chrono::NaiveDate;
use xferx_common::rad50;
use xferx_core::{BlockDevice, DirectoryEntry, File, FileAttributes, FileMode, Filesystem, FsError, FsResult};

const BLOCK_SIZE: usize = 512;
const SEGMENT_BLOCKS: u32 = 2;
const ENTRY_SIZE: usize = 14;
const HEADER_SIZE: usize = 10;
const FIRST_SEGMENT_BLOCK: u32 = 6;

const E_TENT: u16 = 1 << 0;
const E_MPTY: u16 = 1 << 1;
const E_PERM: u16 = 1 << 2;
const E_EOS: u16 = 1 << 3;
const E_READ: u16 = 1 << 6;
const E_PROT: u16 = 1 << 7;

#[derive(Debug, Clone)]
struct RawEntry {
    flags: u16,
    name_words: [u16; 3],
    length: u16,
    date_word: u16,
}

impl RawEntry {
    fn decode(bytes: &[u8]) -> Self {
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        RawEntry {
            flags: word(0),
            name_words: [word(2), word(4), word(6)],
            length: word(8),
            date_word: word(10),
        }
    }

    fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        out[0..2].copy_from_slice(&self.flags.to_le_bytes());
        out[2..4].copy_from_slice(&self.name_words[0].to_le_bytes());
        out[4..6].copy_from_slice(&self.name_words[1].to_le_bytes());
        out[6..8].copy_from_slice(&self.name_words[2].to_le_bytes());
        out[8..10].copy_from_slice(&self.length.to_le_bytes());
        out[10..12].copy_from_slice(&self.date_word.to_le_bytes());
        out
    }

    fn is_empty(&self) -> bool {
        self.flags & E_MPTY != 0
    }

    fn is_permanent(&self) -> bool {
        self.flags & E_PERM != 0
    }

    fn is_end_of_segment(&self) -> bool {
        self.flags & E_EOS != 0
    }

    fn filename(&self) -> String {
        let name = rad50::rad50_pair_to_ascii((self.name_words[0], self.name_words[1]))
            .unwrap_or_default()
            .trim()
            .to_string();
        let ext = rad50::rad50_to_ascii(self.name_words[2])
            .map(|c| String::from_utf8_lossy(&c).trim().to_string())
            .unwrap_or_default();
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }
}

/// RT-11's `rt11_to_date`: a zero day or month defaults to 1 rather
/// than being treated as "no date", since the field only has 5/4 bits
/// to work with and a well-formed entry always carries some date.
fn decode_date(val: u16) -> Option<NaiveDate> {
    xferx_common::dates::rt11::decode(val)
}

struct Segment {
    blocks: Vec<RawEntry>,
    extra_bytes: u16,
    next_segment: u16,
    first_data_block: u16,
    segment_number: u16,
}

pub struct Rt11Filesystem {
    device: Box<dyn BlockDevice>,
    volume_name: String,
    read_only: bool,
}

impl fmt::Debug for Rt11Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rt11Filesystem").field("volume_name", &self.volume_name).finish()
    }
}

impl Rt11Filesystem {
    /// `INITIALIZE /RT11`: writes a single directory segment covering
    /// the whole volume as one `EMPTY` entry and mounts it. `blocks` is
    /// the device's total block count.
    pub fn initialize(mut device: Box<dyn BlockDevice>, blocks: u32) -> FsResult<Self> {
        if blocks <= FIRST_SEGMENT_BLOCK + SEGMENT_BLOCKS {
            return Err(FsError::Invalid(format!("volume of {blocks} blocks too small for an RT-11 directory")));
        }
        let mut header = [0u8; SEGMENT_BLOCKS as usize * BLOCK_SIZE];
        header[0..2].copy_from_slice(&1u16.to_le_bytes());
        header[2..4].copy_from_slice(&0u16.to_le_bytes());
        header[4..6].copy_from_slice(&1u16.to_le_bytes());
        header[6..8].copy_from_slice(&0u16.to_le_bytes());
        header[8..10].copy_from_slice(&(FIRST_SEGMENT_BLOCK as u16 + SEGMENT_BLOCKS as u16).to_le_bytes());
        let empty = RawEntry {
            flags: E_MPTY | E_EOS,
            name_words: [0, 0, 0],
            length: blocks as u16 - FIRST_SEGMENT_BLOCK as u16 - SEGMENT_BLOCKS as u16,
            date_word: 0,
        };
        header[HEADER_SIZE..HEADER_SIZE + ENTRY_SIZE].copy_from_slice(&empty.encode());
        device.write_bytes(FIRST_SEGMENT_BLOCK as u64 * BLOCK_SIZE as u64, &header)?;
        log::debug!("initialized RT-11 directory covering {blocks} blocks");
        Self::mount(device, true)
    }

    pub fn mount(mut device: Box<dyn BlockDevice>, strict: bool) -> FsResult<Self> {
        let mut header = [0u8; HEADER_SIZE];
        device.read_bytes(FIRST_SEGMENT_BLOCK as u64 * BLOCK_SIZE as u64, &mut header)?;
        let total_segments = u16::from_le_bytes([header[0], header[1]]);
        if strict && total_segments == 0 {
            return Err(FsError::Corrupt("RT-11 directory has zero segments".into()));
        }
        log::trace!("RT-11 directory header reports {total_segments} segment(s)");
        Ok(Self {
            device,
            volume_name: "RT11".into(),
            read_only: false,
        })
    }

    fn read_segment(&mut self, segment_number: u16) -> FsResult<Segment> {
        let block = FIRST_SEGMENT_BLOCK as u64 + (segment_number as u64 - 1) * SEGMENT_BLOCKS as u64;
        let mut raw = vec![0u8; SEGMENT_BLOCKS as usize * BLOCK_SIZE];
        self.device.read_bytes(block * BLOCK_SIZE as u64, &mut raw)?;

        let _total_segments = u16::from_le_bytes([raw[0], raw[1]]);
        let next_segment = u16::from_le_bytes([raw[2], raw[3]]);
        let _highest_segment = u16::from_le_bytes([raw[4], raw[5]]);
        let extra_bytes = u16::from_le_bytes([raw[6], raw[7]]);
        let first_data_block = u16::from_le_bytes([raw[8], raw[9]]);

        let entry_size = ENTRY_SIZE + extra_bytes as usize;
        let mut entries = Vec::new();
        let mut offset = HEADER_SIZE;
        while offset + ENTRY_SIZE <= raw.len() {
            let entry = RawEntry::decode(&raw[offset..offset + ENTRY_SIZE]);
            let is_eos = entry.is_end_of_segment();
            entries.push(entry);
            offset += entry_size;
            if is_eos {
                break;
            }
        }

        Ok(Segment {
            blocks: entries,
            extra_bytes,
            next_segment,
            first_data_block,
            segment_number,
        })
    }

    /// Walks every directory segment, yielding `(segment, entry_index,
    /// entry, starting_block)` for every entry in file-position order.
    fn walk(&mut self) -> FsResult<Vec<(u16, usize, RawEntry, u32)>> {
        let mut out = Vec::new();
        let mut segment_number = 1u16;
        loop {
            let segment = self.read_segment(segment_number)?;
            let mut block = segment.first_data_block as u32;
            for (index, entry) in segment.blocks.iter().enumerate() {
                if entry.is_end_of_segment() {
                    break;
                }
                out.push((segment.segment_number, index, entry.clone(), block));
                block += entry.length as u32;
            }
            if segment.next_segment == 0 {
                break;
            }
            segment_number = segment.next_segment;
        }
        Ok(out)
    }

    /// Best-fit contiguous allocation: the smallest `EMPTY` entry whose
    /// length is at least `blocks`, splitting off the remainder as a
    /// fresh `EMPTY` entry when the fit isn't exact.
    fn allocate(&mut self, blocks: u16) -> FsResult<(u16, usize, u32)> {
        let entries = self.walk()?;
        let candidate = entries
            .iter()
            .filter(|(_, _, entry, _)| entry.is_empty() && entry.length >= blocks)
            .min_by_key(|(_, _, entry, _)| entry.length)
            .cloned();
        let Some((segment_number, index, entry, start_block)) = candidate else {
            return Err(FsError::NoSpace);
        };

        let mut segment = self.read_segment(segment_number)?;
        let remainder = entry.length - blocks;
        segment.blocks[index].length = blocks;
        segment.blocks[index].flags &= !E_MPTY;
        segment.blocks[index].flags |= E_TENT;

        if remainder > 0 {
            let was_eos = segment.blocks[index].is_end_of_segment();
            segment.blocks[index].flags &= !E_EOS;
            let new_empty = RawEntry {
                flags: E_MPTY | if was_eos { E_EOS } else { 0 },
                name_words: [0, 0, 0],
                length: remainder,
                date_word: 0,
            };
            segment.blocks.insert(index + 1, new_empty);
        }

        self.write_segment(&segment)?;
        log::trace!("allocated {blocks} block(s) at block {start_block} in segment {segment_number}");
        Ok((segment_number, index, start_block))
    }

    /// Allocates `blocks` contiguous blocks and immediately finalizes
    /// the entry as permanent under `path`, so it shows up in `list`
    /// and can be reopened by name right away — RT-11 has no separate
    /// close step that would defer writing the directory entry.
    fn allocate_named(&mut self, path: &str, blocks: u16) -> FsResult<u32> {
        let (segment_number, index, start_block) = self.allocate(blocks)?;
        let mut segment = self.read_segment(segment_number)?;
        let upper: Vec<u8> = path.to_ascii_uppercase().into_bytes();
        let (stem, ext) = match upper.iter().position(|&b| b == b'.') {
            Some(dot) => (&upper[..dot], &upper[dot + 1..]),
            None => (&upper[..], &upper[upper.len()..]),
        };
        let (w0, w1) = rad50::ascii_to_rad50_pair(stem);
        let w2 = rad50::ascii_to_rad50(ext);
        segment.blocks[index].name_words = [w0, w1, w2];
        segment.blocks[index].flags &= !E_TENT;
        segment.blocks[index].flags |= E_PERM;
        self.write_segment(&segment)?;
        Ok(start_block)
    }

    /// Creates a permanent entry sized to hold `size_bytes` up front,
    /// the way `COPY` computes the block count from the source file's
    /// length before allocating, rather than growing an entry in place
    /// as `write` is called (RT-11 files are strictly contiguous, so
    /// growing in place would mean relocating the whole file the
    /// moment a neighboring block was already spoken for).
    pub fn create_sized(&mut self, path: &str, size_bytes: u64) -> FsResult<Box<dyn File + '_>> {
        if self.read_only {
            return Err(FsError::ReadOnly);
        }
        let blocks = size_bytes.div_ceil(BLOCK_SIZE as u64).max(1) as u16;
        let start_block = self.allocate_named(path, blocks)?;
        Ok(Box::new(Rt11File {
            device: self.device.as_mut(),
            name: path.to_string(),
            start_block,
            length_blocks: blocks as u32,
            position: 0,
        }))
    }

    fn write_segment(&mut self, segment: &Segment) -> FsResult<()> {
        let block = FIRST_SEGMENT_BLOCK as u64 + (segment.segment_number as u64 - 1) * SEGMENT_BLOCKS as u64;
        let mut raw = vec![0u8; SEGMENT_BLOCKS as usize * BLOCK_SIZE];
        raw[0..2].copy_from_slice(&1u16.to_le_bytes());
        raw[2..4].copy_from_slice(&segment.next_segment.to_le_bytes());
        raw[4..6].copy_from_slice(&segment.segment_number.to_le_bytes());
        raw[6..8].copy_from_slice(&segment.extra_bytes.to_le_bytes());
        raw[8..10].copy_from_slice(&segment.first_data_block.to_le_bytes());

        let entry_size = ENTRY_SIZE + segment.extra_bytes as usize;
        let mut offset = HEADER_SIZE;
        for entry in &segment.blocks {
            if offset + ENTRY_SIZE > raw.len() {
                return Err(FsError::Corrupt("directory segment overflowed while writing".into()));
            }
            raw[offset..offset + ENTRY_SIZE].copy_from_slice(&entry.encode());
            offset += entry_size;
        }
        self.device.write_bytes(block * BLOCK_SIZE as u64, &raw)?;
        Ok(())
    }
}

impl Filesystem for Rt11Filesystem {
    fn volume_name(&self) -> &str {
        &self.volume_name
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn list(&mut self, _directory: &str) -> FsResult<Vec<DirectoryEntry>> {
        let entries = self.walk()?;
        Ok(entries
            .into_iter()
            .filter(|(_, _, entry, _)| entry.is_permanent())
            .map(|(_, _, entry, _)| DirectoryEntry {
                name: entry.filename(),
                length_blocks: entry.length as u32,
                created: decode_date(entry.date_word),
                mode: FileMode::Image,
                attributes: {
                    let mut attrs = FileAttributes::empty();
                    if entry.flags & E_PROT != 0 {
                        attrs |= FileAttributes::PROTECTED;
                    }
                    if entry.flags & E_READ != 0 {
                        attrs |= FileAttributes::READ_ONLY;
                    }
                    attrs
                },
            })
            .collect())
    }

    fn exists(&mut self, path: &str) -> FsResult<bool> {
        Ok(self.list("")?.iter().any(|e| e.name.eq_ignore_ascii_case(path)))
    }

    fn open(&mut self, path: &str) -> FsResult<Box<dyn File + '_>> {
        let entries = self.walk()?;
        let found = entries
            .into_iter()
            .filter(|(_, _, entry, _)| entry.is_permanent())
            .find(|(_, _, entry, _)| entry.filename().eq_ignore_ascii_case(path));
        let Some((_, _, entry, start_block)) = found else {
            return Err(FsError::NotFound(path.to_string()));
        };
        Ok(Box::new(Rt11File {
            device: self.device.as_mut(),
            name: entry.filename(),
            start_block,
            length_blocks: entry.length as u32,
            position: 0,
        }))
    }

    fn create(&mut self, path: &str, mode: FileMode) -> FsResult<Box<dyn File + '_>> {
        if self.read_only {
            return Err(FsError::ReadOnly);
        }
        // one block minimum; callers that know the size up front should
        // use `create_sized` instead so `write` isn't bounded to one block.
        let start_block = self.allocate_named(path, 1)?;
        Ok(Box::new(Rt11File {
            device: self.device.as_mut(),
            name: path.to_string(),
            start_block,
            length_blocks: 1,
            position: 0,
        }))
    }

    fn remove(&mut self, path: &str) -> FsResult<()> {
        if self.read_only {
            return Err(FsError::ReadOnly);
        }
        let mut segment_number = 1u16;
        loop {
            let mut segment = self.read_segment(segment_number)?;
            if let Some(index) = segment
                .blocks
                .iter()
                .position(|e| e.is_permanent() && e.filename().eq_ignore_ascii_case(path))
            {
                segment.blocks[index].flags = E_MPTY | if segment.blocks[index].is_end_of_segment() { E_EOS } else { 0 };
                segment.blocks[index].name_words = [0, 0, 0];
                segment.blocks[index].date_word = 0;
                self.write_segment(&segment)?;
                return Ok(());
            }
            if segment.next_segment == 0 {
                return Err(FsError::NotFound(path.to_string()));
            }
            segment_number = segment.next_segment;
        }
    }

    fn free_space(&mut self) -> FsResult<Option<u64>> {
        let entries = self.walk()?;
        let free_blocks: u64 = entries
            .iter()
            .filter(|(_, _, entry, _)| entry.is_empty())
            .map(|(_, _, entry, _)| entry.length as u64)
            .sum();
        Ok(Some(free_blocks * BLOCK_SIZE as u64))
    }
}

struct Rt11File<'a> {
    device: &'a mut dyn BlockDevice,
    name: String,
    start_block: u32,
    length_blocks: u32,
    position: u64,
}

impl File for Rt11File<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.length_blocks as u64 * BLOCK_SIZE as u64
    }

    fn mode(&self) -> FileMode {
        FileMode::Image
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let remaining = self.len().saturating_sub(self.position);
        let take = buf.len().min(remaining as usize);
        if take == 0 {
            return Ok(0);
        }
        let offset = self.start_block as u64 * BLOCK_SIZE as u64 + self.position;
        self.device.read_bytes(offset, &mut buf[..take])?;
        self.position += take as u64;
        Ok(take)
    }

    fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        let remaining = self.len().saturating_sub(self.position);
        let take = buf.len().min(remaining as usize);
        if take < buf.len() {
            return Err(FsError::Invalid(format!(
                "write of {} bytes exceeds file's allocated {} blocks",
                buf.len(),
                self.length_blocks
            )));
        }
        let offset = self.start_block as u64 * BLOCK_SIZE as u64 + self.position;
        self.device.write_bytes(offset, &buf[..take])?;
        self.position += take as u64;
        Ok(take)
    }

    fn flush(&mut self) -> FsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xferx_core::ByteFile;
    use std::io::Cursor;

    fn blank_image(blocks: u32) -> Box<dyn BlockDevice> {
        let data = vec![0u8; blocks as usize * BLOCK_SIZE];
        Box::new(ByteFile::new(Cursor::new(data), BLOCK_SIZE, blocks))
    }

    #[test]
    fn mount_reads_the_directory_header() {
        let device = blank_image(100);
        let fs = Rt11Filesystem::initialize(device, 100).unwrap();
        assert_eq!(fs.volume_name(), "RT11");
    }

    #[test]
    fn allocate_splits_the_empty_entry() {
        let device = blank_image(100);
        let mut fs = Rt11Filesystem::initialize(device, 100).unwrap();
        let (segment, index, _start) = fs.allocate(5).unwrap();
        let seg = fs.read_segment(segment).unwrap();
        assert!(!seg.blocks[index].is_empty());
        assert_eq!(seg.blocks[index].length, 5);
        assert!(seg.blocks[index + 1].is_empty());
    }

    #[test]
    fn free_space_decreases_after_allocation() {
        let device = blank_image(100);
        let mut fs = Rt11Filesystem::initialize(device, 100).unwrap();
        let before = fs.free_space().unwrap().unwrap();
        fs.allocate(10).unwrap();
        let after = fs.free_space().unwrap().unwrap();
        assert_eq!(before - after, 10 * BLOCK_SIZE as u64);
    }
}
