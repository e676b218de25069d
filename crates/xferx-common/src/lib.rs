//! XFERX Common
//!
//! Encoding primitives used by every L3 filesystem driver in `xferx-fs`,
//! but specific to no single one of them: RAD-50, 12-bit word packing for
//! RX01/RX02 media, Pascal length-prefixed strings, byte-swap helpers, the
//! per-format date codecs, and the AppleSingle metadata envelope.
//!
//! Nothing in this crate knows what a directory entry or a bitmap looks
//! like for any particular format; that is `xferx-fs`'s job.

pub mod applesingle;
pub mod byteswap;
pub mod dates;
pub mod pascal_str;
pub mod rad50;
pub mod rx;
pub mod uic;

pub use applesingle::{AppleSingleError, AppleSingleFile};
pub use pascal_str::PascalString;
pub use rad50::{Rad50Error, ascii_to_rad50, rad50_to_ascii};
pub use uic::Uic;
