//! The L2/L3 contract: every format driver in `xferx-fs` implements
//! [`Filesystem`], handing out [`File`] trait objects rather than a
//! concrete type. Formats differ too much in how a file is addressed
//! (RT-11's contiguous extent, Files-11's retrieval pointers, a UNIX
//! inode's indirect blocks) to share one struct; they share this
//! interface instead, the same way `hadris_core::FileSystem` did for
//! FAT versus the other container formats it once supported.

use chrono::{DateTime, Utc};

use crate::error::FsResult;

/// The line-ending translation `COPY` applies in text mode. `Ascii`
/// files are translated to/from the host's line endings as they cross
/// the L2 boundary; `Image` files are copied byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    #[default]
    Image,
    Ascii,
}

bitflags::bitflags! {
    /// Protection/permission bits a directory entry may carry. Not every
    /// format uses every bit; formats that lack a concept (RT-11 has no
    /// read-protect bit, for instance) simply never set it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u8 {
        const PROTECTED  = 0b0000_0001;
        const READ_ONLY  = 0b0000_0010;
        const TENTATIVE  = 0b0000_0100;
        const EMPTY      = 0b0000_1000;
    }
}

/// A directory listing entry. Every format driver fills in as many
/// fields as its on-disk directory structure actually carries; formats
/// with no creation date (OS/8's directory has none) leave it `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub name: String,
    pub length_blocks: u32,
    pub created: Option<DateTime<Utc>>,
    pub mode: FileMode,
    pub attributes: FileAttributes,
}

impl DirectoryEntry {
    /// True for placeholder entries (RT-11's `E_MPTY`, DOS-11's
    /// `UNUSED` marker) that occupy a directory slot but name no file.
    pub fn is_empty(&self) -> bool {
        self.attributes.contains(FileAttributes::EMPTY)
    }
}

/// A single open file. Reads and writes are sequential; formats with
/// non-contiguous storage (linked allocation, retrieval pointers,
/// indirect blocks) resolve the underlying block chain internally and
/// expose only a flat byte stream here.
pub trait File {
    fn name(&self) -> &str;
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn mode(&self) -> FileMode;

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;
    fn write(&mut self, buf: &[u8]) -> FsResult<usize>;

    /// Flushes any buffered state (directory entry, bitmap, cache) back
    /// to the underlying device. Drivers whose `write` updates the disk
    /// immediately can make this a no-op.
    fn flush(&mut self) -> FsResult<()>;
}

/// The per-format driver contract every L3 filesystem implements.
pub trait Filesystem {
    fn volume_name(&self) -> &str;
    fn is_read_only(&self) -> bool;

    fn list(&mut self, directory: &str) -> FsResult<Vec<DirectoryEntry>>;
    fn exists(&mut self, path: &str) -> FsResult<bool>;

    fn open(&mut self, path: &str) -> FsResult<Box<dyn File + '_>>;
    fn create(&mut self, path: &str, mode: FileMode) -> FsResult<Box<dyn File + '_>>;
    fn remove(&mut self, path: &str) -> FsResult<()>;

    /// Free space remaining, in bytes, or `None` for formats (magtape)
    /// where the concept doesn't apply.
    fn free_space(&mut self) -> FsResult<Option<u64>>;

    /// Changes the current working directory. Flat formats with no
    /// directory hierarchy always return `false`.
    fn chdir(&mut self, _path: &str) -> bool {
        false
    }

    /// The current working directory, format-specific in form (a UIC
    /// for DOS-11, a `/`-separated path for ProDOS/UNIX, empty for
    /// formats with no hierarchy at all).
    fn get_pwd(&self) -> String {
        String::new()
    }
}

/// Read-only filesystem support split out from [`Filesystem`], the way
/// `hadris_core::internal::FileSystemRead`/`FileSystemWrite` separate
/// the two capabilities — a format driver mounted against a write-
/// protected image, or one like RSTS/E that this project only reads,
/// implements just this half.
pub trait FilesystemRead: Filesystem {
    fn read_file(&mut self, path: &str) -> FsResult<Vec<u8>> {
        let mut file = self.open(path)?;
        let mut data = vec![0u8; file.len() as usize];
        let mut offset = 0;
        while offset < data.len() {
            let n = file.read(&mut data[offset..])?;
            if n == 0 {
                break;
            }
            offset += n;
        }
        data.truncate(offset);
        Ok(data)
    }
}

impl<T: Filesystem> FilesystemRead for T {}

pub trait FilesystemWrite: Filesystem {
    fn write_file(&mut self, path: &str, mode: FileMode, data: &[u8]) -> FsResult<()> {
        let mut file = self.create(path, mode)?;
        let mut offset = 0;
        while offset < data.len() {
            let n = file.write(&data[offset..])?;
            if n == 0 {
                break;
            }
            offset += n;
        }
        file.flush()
    }
}

impl<T: Filesystem> FilesystemWrite for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_attribute_marks_a_placeholder_entry() {
        let entry = DirectoryEntry {
            name: String::new(),
            length_blocks: 0,
            created: None,
            mode: FileMode::Image,
            attributes: FileAttributes::EMPTY,
        };
        assert!(entry.is_empty());
    }

    #[test]
    fn named_entry_is_not_empty() {
        let entry = DirectoryEntry {
            name: "FOO.TXT".into(),
            length_blocks: 2,
            created: None,
            mode: FileMode::Ascii,
            attributes: FileAttributes::empty(),
        };
        assert!(!entry.is_empty());
    }
}
