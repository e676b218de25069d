//! XFERX Core
//!
//! The layered device model every format driver in `xferx-fs` is built
//! on: an L0 byte-addressable image file, L1 fixed-block and L1b tape
//! devices, and the L2/L3 `Filesystem`/`File` trait contract drivers
//! implement instead of sharing a concrete base type. Also home to the
//! closed error taxonomy every driver's format-specific failures map
//! into, and the clock abstraction drivers stamp new files with.

pub mod device;
pub mod error;
pub mod fs;
pub mod tape;
pub mod time;

pub use device::{BlockCache, BlockDevice, ByteFile, SkewedBlockDevice, DEFAULT_CACHE_SIZE};
pub use error::{FsError, FsResult};
pub use fs::{DirectoryEntry, File, FileAttributes, FileMode, Filesystem, FilesystemRead, FilesystemWrite};
pub use tape::{TapeDevice, TapeRecord};
pub use time::{FixedTimeProvider, SystemTimeProvider, TimeProvider};
