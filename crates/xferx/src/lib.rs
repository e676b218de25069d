//! xferx is a unified package over the layered device model and the
//! per-format filesystem drivers: open an image file, mount it against
//! the format it holds, and list/read/write through the common
//! [`Filesystem`]/[`File`] contract.

pub use xferx_core::{
    BlockCache, BlockDevice, ByteFile, DirectoryEntry, File, FileAttributes, FileMode, Filesystem,
    FilesystemRead, FilesystemWrite, FixedTimeProvider, FsError, FsResult, SkewedBlockDevice,
    SystemTimeProvider, TapeDevice, TapeRecord, TimeProvider, DEFAULT_CACHE_SIZE,
};

pub use xferx_fs::volumes::{self, Volumes};

/// PDP-11/PDP-8 and related formats.
pub mod pdp {
    pub use xferx_fs::caps11;
    pub use xferx_fs::dos11;
    pub use xferx_fs::dos11_tape;
    pub use xferx_fs::files11;
    pub use xferx_fs::os8;
    pub use xferx_fs::rsts;
    pub use xferx_fs::rt11;
    pub use xferx_fs::tss8;
    pub use xferx_fs::unix;
}

/// Data General Nova RDOS.
pub mod nova {
    pub use xferx_fs::nova::*;
    pub use xferx_fs::nova_tape;
}

/// Apple II formats.
pub mod apple2 {
    pub use xferx_fs::appledos;
    pub use xferx_fs::pascal;
    pub use xferx_fs::ppm;
    pub use xferx_fs::prodos;
}
