//! L0/L1: the byte-addressable image file and the block devices format
//! drivers are built on top of.
//!
//! [`ByteFile`] is the L0 layer — any `Read + Write + Seek` byte stream,
//! almost always a host file opened on a `.dsk`/`.img` image. [`BlockDevice`]
//! is the L1 contract every fixed-block-size medium implements; [`BlockCache`]
//! wraps one in an LRU cache of whole blocks (mirrors `xferx/cache.py`'s
//! `BlockCache`, including its 1024-block default), and [`SkewedBlockDevice`]
//! remaps logical block numbers through a skew table for media (Apple DOS
//! 3.3, RX01/RX02) whose physical sector order doesn't match logical order.

use std::collections::VecDeque;

use xferx_io::{Read, Seek, SeekFrom, Write};

use crate::error::{FsError, FsResult};

/// The contract every fixed-block-size medium implements. Block numbers
/// are logical: a device that needs sector skewing or 12-bit unpacking
/// resolves that internally before touching its backing store.
pub trait BlockDevice {
    fn block_size(&self) -> usize;
    fn block_count(&self) -> u32;

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FsResult<()>;
    fn write_block(&mut self, block: u32, buf: &[u8]) -> FsResult<()>;

    /// Reads a byte range that may span multiple blocks.
    fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
        let block_size = self.block_size() as u64;
        let mut remaining = buf;
        let mut pos = offset;
        let mut scratch = vec![0u8; self.block_size()];
        while !remaining.is_empty() {
            let block = (pos / block_size) as u32;
            let block_offset = (pos % block_size) as usize;
            self.read_block(block, &mut scratch)?;
            let take = remaining.len().min(scratch.len() - block_offset);
            remaining[..take].copy_from_slice(&scratch[block_offset..block_offset + take]);
            remaining = &mut remaining[take..];
            pos += take as u64;
        }
        Ok(())
    }

    /// Writes a byte range that may span multiple blocks, read-modify-write
    /// on the first and last partial block.
    fn write_bytes(&mut self, offset: u64, buf: &[u8]) -> FsResult<()> {
        let block_size = self.block_size() as u64;
        let mut remaining = buf;
        let mut pos = offset;
        let mut scratch = vec![0u8; self.block_size()];
        while !remaining.is_empty() {
            let block = (pos / block_size) as u32;
            let block_offset = (pos % block_size) as usize;
            let take = remaining.len().min(scratch.len() - block_offset);
            if take < scratch.len() {
                self.read_block(block, &mut scratch)?;
            }
            scratch[block_offset..block_offset + take].copy_from_slice(&remaining[..take]);
            self.write_block(block, &scratch)?;
            remaining = &remaining[take..];
            pos += take as u64;
        }
        Ok(())
    }
}

/// The L0 layer: a fixed-size block device backed directly by a byte
/// stream, no translation beyond `block * block_size` addressing.
pub struct ByteFile<T> {
    inner: T,
    block_size: usize,
    block_count: u32,
}

impl<T: Read + Write + Seek> ByteFile<T> {
    pub fn new(inner: T, block_size: usize, block_count: u32) -> Self {
        Self {
            inner,
            block_size,
            block_count,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn seek_to_block(&mut self, block: u32) -> FsResult<()> {
        if block >= self.block_count {
            return Err(FsError::Invalid(format!(
                "block {block} out of range (device has {} blocks)",
                self.block_count
            )));
        }
        self.inner
            .seek(SeekFrom::Start(block as u64 * self.block_size as u64))?;
        Ok(())
    }
}

impl<T: Read + Write + Seek> BlockDevice for ByteFile<T> {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FsResult<()> {
        self.seek_to_block(block)?;
        self.inner.read_exact(&mut buf[..self.block_size])?;
        Ok(())
    }

    fn write_block(&mut self, block: u32, buf: &[u8]) -> FsResult<()> {
        self.seek_to_block(block)?;
        self.inner.write_all(&buf[..self.block_size])?;
        Ok(())
    }
}

/// The number of blocks kept resident by a [`BlockCache`] before the
/// least-recently-used entry is evicted and, if dirty, flushed. Matches
/// `xferx/cache.py`'s `DEFAULT_CACHE_SIZE`.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

struct CacheEntry {
    block: u32,
    data: Vec<u8>,
    dirty: bool,
}

/// An LRU write-back cache of whole blocks in front of any [`BlockDevice`].
/// Ported from `xferx/cache.py`'s `BlockCache`: an ordered map keyed by
/// block number, evicting (and flushing, if dirty) the oldest entry once
/// `capacity` is exceeded.
pub struct BlockCache<D> {
    inner: D,
    capacity: usize,
    entries: VecDeque<CacheEntry>,
}

impl<D: BlockDevice> BlockCache<D> {
    pub fn new(inner: D) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_SIZE)
    }

    pub fn with_capacity(inner: D, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    fn position_of(&self, block: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.block == block)
    }

    fn touch(&mut self, index: usize) {
        let entry = self.entries.remove(index).unwrap();
        self.entries.push_back(entry);
    }

    fn evict_if_needed(&mut self) -> FsResult<()> {
        while self.entries.len() > self.capacity {
            let evicted = self.entries.pop_front().unwrap();
            if evicted.dirty {
                self.inner.write_block(evicted.block, &evicted.data)?;
            }
        }
        Ok(())
    }

    /// Flushes every dirty block back to the underlying device without
    /// evicting anything from the cache.
    pub fn flush(&mut self) -> FsResult<()> {
        for entry in &mut self.entries {
            if entry.dirty {
                self.inner.write_block(entry.block, &entry.data)?;
                entry.dirty = false;
            }
        }
        Ok(())
    }

    pub fn into_inner(mut self) -> FsResult<D> {
        self.flush()?;
        Ok(self.inner)
    }
}

impl<D: BlockDevice> BlockDevice for BlockCache<D> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u32 {
        self.inner.block_count()
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FsResult<()> {
        if let Some(index) = self.position_of(block) {
            buf.copy_from_slice(&self.entries[index].data);
            self.touch(index);
            return Ok(());
        }
        let mut data = vec![0u8; self.inner.block_size()];
        self.inner.read_block(block, &mut data)?;
        buf.copy_from_slice(&data);
        self.entries.push_back(CacheEntry {
            block,
            data,
            dirty: false,
        });
        self.evict_if_needed()
    }

    fn write_block(&mut self, block: u32, buf: &[u8]) -> FsResult<()> {
        if let Some(index) = self.position_of(block) {
            self.entries[index].data.copy_from_slice(buf);
            self.entries[index].dirty = true;
            self.touch(index);
            return Ok(());
        }
        self.entries.push_back(CacheEntry {
            block,
            data: buf.to_vec(),
            dirty: true,
        });
        self.evict_if_needed()
    }
}

/// Remaps logical block numbers onto physical ones through a skew table,
/// for media whose sector order on the platter doesn't match the order
/// a filesystem driver addresses them in (Apple DOS 3.3's sector skew,
/// the RX01/RX02 interleave used once 12-bit words have been unpacked
/// into 512-byte logical blocks by `xferx_common::rx`).
pub struct SkewedBlockDevice<D> {
    inner: D,
    skew: Vec<u32>,
}

impl<D: BlockDevice> SkewedBlockDevice<D> {
    /// `skew[logical] = physical`. Panics if `skew` isn't a permutation
    /// of `0..skew.len()`, since a gap or duplicate means some physical
    /// block is unreachable or aliased.
    pub fn new(inner: D, skew: Vec<u32>) -> Self {
        let mut sorted = skew.clone();
        sorted.sort_unstable();
        debug_assert!(
            sorted.iter().enumerate().all(|(i, &v)| i as u32 == v),
            "skew table must be a permutation of 0..len"
        );
        Self { inner, skew }
    }

    fn physical(&self, logical: u32) -> u32 {
        self.skew[logical as usize % self.skew.len()]
    }
}

impl<D: BlockDevice> BlockDevice for SkewedBlockDevice<D> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u32 {
        self.inner.block_count()
    }

    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FsResult<()> {
        self.inner.read_block(self.physical(block), buf)
    }

    fn write_block(&mut self, block: u32, buf: &[u8]) -> FsResult<()> {
        self.inner.write_block(self.physical(block), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_device(block_size: usize, block_count: u32) -> ByteFile<Cursor<Vec<u8>>> {
        let data = vec![0u8; block_size * block_count as usize];
        ByteFile::new(Cursor::new(data), block_size, block_count)
    }

    #[test]
    fn byte_file_round_trips_a_block() {
        let mut device = make_device(512, 4);
        let payload = vec![0xAB; 512];
        device.write_block(2, &payload).unwrap();
        let mut buf = vec![0u8; 512];
        device.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, payload);
    }

    #[test]
    fn byte_file_rejects_out_of_range_blocks() {
        let mut device = make_device(512, 2);
        let mut buf = vec![0u8; 512];
        assert!(device.read_block(5, &mut buf).is_err());
    }

    #[test]
    fn byte_range_spans_multiple_blocks() {
        let mut device = make_device(512, 4);
        let payload: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();
        device.write_bytes(256, &payload).unwrap();
        let mut readback = vec![0u8; 1024];
        device.read_bytes(256, &mut readback).unwrap();
        assert_eq!(readback, payload);
    }

    #[test]
    fn cache_evicts_least_recently_used_block() {
        let device = make_device(512, 8);
        let mut cache = BlockCache::with_capacity(device, 2);
        let mut buf = [0u8; 512];
        cache.write_block(0, &[1u8; 512]).unwrap();
        cache.write_block(1, &[2u8; 512]).unwrap();
        cache.write_block(2, &[3u8; 512]).unwrap();
        // block 0 should have been evicted and flushed through to the device
        cache.read_block(0, &mut buf).unwrap();
        assert_eq!(buf, [1u8; 512]);
    }

    #[test]
    fn cache_flush_persists_dirty_blocks_without_evicting() {
        let device = make_device(512, 4);
        let mut cache = BlockCache::with_capacity(device, 16);
        cache.write_block(0, &[9u8; 512]).unwrap();
        cache.flush().unwrap();
        let device = cache.into_inner().unwrap();
        let mut plain = device;
        let mut buf = [0u8; 512];
        plain.read_block(0, &mut buf).unwrap();
        assert_eq!(buf, [9u8; 512]);
    }

    #[test]
    fn skewed_device_remaps_logical_to_physical() {
        let device = make_device(512, 4);
        let mut skewed = SkewedBlockDevice::new(device, vec![2, 0, 3, 1]);
        skewed.write_block(0, &[7u8; 512]).unwrap();
        let mut buf = [0u8; 512];
        skewed.inner.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, [7u8; 512]);
    }
}
