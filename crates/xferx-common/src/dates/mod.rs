//! Per-format date encodings (spec.md's "Canonical date encodings" table).
//!
//! Each submodule is self-contained: a format-specific packed integer (or
//! ASCII string, for Files-11) in, a `chrono` date/time out, and back.
//! None of these share a representation, by design — RT-11's 2-bit "age"
//! field and ProDOS's year/month/day/hour/minute bitfield have nothing in
//! common except both compressing a timestamp into one machine word.

pub mod dos11;
pub mod files11;
pub mod nova;
pub mod os8;
pub mod pascal;
pub mod prodos;
pub mod rt11;
pub mod tss8;
pub mod unix;
