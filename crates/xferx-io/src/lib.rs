//! XFERX IO
//!
//! A thin re-export of the `std::io` traits that every L0/L1 device in
//! `xferx-core` and every L3 driver in `xferx-fs` is generic over. Kept as
//! its own crate (rather than depending on `std::io` directly everywhere)
//! so the trait surface XFERX drivers are written against is named once,
//! the same way `hadris-io` gives the Hadris crates one place to swap the
//! std/no-std implementation of `Read`/`Write`/`Seek`.
//!
//! XFERX only targets host tooling (it inspects disk/tape image files on
//! the machine running the shell), so unlike `hadris-io` there is no
//! no-std branch here — but keeping the indirection means a driver never
//! has to write `std::io::Read` directly, and the crate boundary documents
//! which traits are "the device contract".

pub use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write};
