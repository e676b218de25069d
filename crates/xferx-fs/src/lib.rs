//! XFERX FS
//!
//! Per-format L3 filesystem drivers and the L4 volume registry. Most
//! drivers implement [`xferx_core::Filesystem`] directly; a handful of
//! sequential/tape-scanned formats (DOS-11 magtape, Nova RDOS magtape)
//! expose a narrower `scan`-based reader instead, since "directory" for
//! them is a byproduct of a linear pass rather than a random-access
//! structure. See `DESIGN.md` at the workspace root for what each
//! module is grounded on.

pub mod appledos;
pub mod caps11;
pub mod dos11;
pub mod dos11_tape;
pub mod files11;
pub mod nova;
pub mod nova_tape;
pub mod os8;
pub mod pascal;
pub mod ppm;
pub mod prodos;
pub mod rsts;
pub mod rt11;
pub mod tss8;
pub mod unix;
pub mod volumes;

pub use rt11::Rt11Filesystem;
pub use volumes::Volumes;
