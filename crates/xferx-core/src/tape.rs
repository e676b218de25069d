//! L1b: magnetic tape images in SIMH `.tap` format.
//!
//! A `.tap` file is a sequence of variable-length records: a 32-bit
//! little-endian byte count, the record's payload, a pad byte if the
//! payload length is odd, then the byte count repeated (so the format
//! can be read forwards or backwards). A byte count of zero is a tape
//! mark (an inter-file gap); the two reserved values `0xFFFFFFFE` and
//! `0xFFFFFFFF` mark erased gaps and end-of-medium respectively and are
//! surfaced as [`TapeRecord::EndOfMedium`] rather than being decoded as
//! data.

use xferx_io::{Read, Seek, SeekFrom, Write};

use crate::error::{FsError, FsResult};

const MARK_TAPE_MARK: u32 = 0x0000_0000;
const MARK_ERASE_GAP: u32 = 0xFFFF_FFFE;
const MARK_END_OF_MEDIUM: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeRecord {
    Data(Vec<u8>),
    TapeMark,
    EndOfMedium,
}

/// A sequential SIMH-format tape device. Unlike [`crate::device::BlockDevice`]
/// this has no random access: callers step forward record by record, as
/// a real tape drive does.
pub struct TapeDevice<T> {
    inner: T,
}

impl<T: Read + Write + Seek> TapeDevice<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn rewind(&mut self) -> FsResult<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Reads the next record and advances past it.
    pub fn read_record(&mut self) -> FsResult<TapeRecord> {
        let count = self.read_marker()?;
        match count {
            MARK_TAPE_MARK => Ok(TapeRecord::TapeMark),
            MARK_END_OF_MEDIUM | MARK_ERASE_GAP => Ok(TapeRecord::EndOfMedium),
            len => {
                let len = len as usize;
                let mut data = vec![0u8; len];
                self.inner.read_exact(&mut data)?;
                if len % 2 == 1 {
                    let mut pad = [0u8; 1];
                    self.inner.read_exact(&mut pad)?;
                }
                let trailer = self.read_marker()?;
                if trailer != len as u32 {
                    return Err(FsError::Corrupt(format!(
                        "tape record trailer {trailer} does not match leading count {len}"
                    )));
                }
                Ok(TapeRecord::Data(data))
            }
        }
    }

    /// Appends a data record, or a tape mark if `data` is `None`.
    pub fn write_record(&mut self, data: Option<&[u8]>) -> FsResult<()> {
        match data {
            None => self.write_marker(MARK_TAPE_MARK),
            Some(data) => {
                let len = data.len() as u32;
                self.write_marker(len)?;
                self.inner.write_all(data)?;
                if data.len() % 2 == 1 {
                    self.inner.write_all(&[0u8])?;
                }
                self.write_marker(len)
            }
        }
    }

    fn read_marker(&mut self) -> FsResult<u32> {
        let mut raw = [0u8; 4];
        self.inner.read_exact(&mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    fn write_marker(&mut self, value: u32) -> FsResult<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_sequence_of_records_and_a_tape_mark() {
        let mut tape = TapeDevice::new(Cursor::new(Vec::new()));
        tape.write_record(Some(b"hello")).unwrap();
        tape.write_record(Some(b"world!")).unwrap();
        tape.write_record(None).unwrap();

        tape.rewind().unwrap();
        assert_eq!(tape.read_record().unwrap(), TapeRecord::Data(b"hello".to_vec()));
        assert_eq!(tape.read_record().unwrap(), TapeRecord::Data(b"world!".to_vec()));
        assert_eq!(tape.read_record().unwrap(), TapeRecord::TapeMark);
    }

    #[test]
    fn odd_length_records_are_padded_to_even() {
        let mut tape = TapeDevice::new(Cursor::new(Vec::new()));
        tape.write_record(Some(b"odd")).unwrap();
        let raw = tape.into_inner().into_inner();
        // 4-byte count + 3 bytes + 1 pad byte + 4-byte trailer count
        assert_eq!(raw.len(), 12);
    }

    #[test]
    fn end_of_medium_marker_is_reported() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&MARK_END_OF_MEDIUM.to_le_bytes());
        let mut tape = TapeDevice::new(Cursor::new(raw));
        assert_eq!(tape.read_record().unwrap(), TapeRecord::EndOfMedium);
    }

    #[test]
    fn mismatched_trailer_is_corrupt() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&5u32.to_le_bytes());
        raw.extend_from_slice(b"hello");
        raw.extend_from_slice(&6u32.to_le_bytes());
        let mut tape = TapeDevice::new(Cursor::new(raw));
        assert!(tape.read_record().is_err());
    }
}
