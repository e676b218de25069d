//! DOS-11 magtape: a stream of `(14-byte header record, N×512-byte data
//! records, tape mark)` triples. There is no central index; listing the
//! directory means scanning the tape from BOT to EOT. Per spec.md §4.1's
//! tape-position state machine, writes are only valid from EOT and
//! truncate the file at the new logical end — a single-writer contract
//! documented in the concurrency model (§5), since concurrent writers
//! would race on where EOT currently is.

use xferx_common::rad50;
use xferx_core::{DirectoryEntry, FileAttributes, FileMode, FsError, FsResult, TapeDevice, TapeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapePosition {
    Bot,
    AtRecordHeader,
    BetweenRecords,
    AtTapeMark,
    Eot,
}

struct FileHeader {
    name_words: (u16, u16),
    ext_word: u16,
    block_count: u16,
}

impl FileHeader {
    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 14 {
            return None;
        }
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Some(Self {
            name_words: (word(0), word(2)),
            ext_word: word(4),
            block_count: word(6),
        })
    }

    fn filename(&self) -> String {
        let name = rad50::rad50_pair_to_ascii(self.name_words).unwrap_or_default();
        let ext = rad50::rad50_to_ascii(self.ext_word)
            .map(|c| String::from_utf8_lossy(&c).trim().to_string())
            .unwrap_or_default();
        if ext.is_empty() {
            name
        } else {
            format!("{name}.{ext}")
        }
    }
}

pub struct Dos11MagtapeFilesystem<T> {
    tape: TapeDevice<T>,
    volume_name: String,
    position: TapePosition,
}

impl<T: xferx_io::Read + xferx_io::Write + xferx_io::Seek> Dos11MagtapeFilesystem<T> {
    pub fn mount(inner: T) -> FsResult<Self> {
        Ok(Self {
            tape: TapeDevice::new(inner),
            volume_name: "DOS11MT".into(),
            position: TapePosition::Bot,
        })
    }

    /// Scans from BOT, yielding one entry per file header found,
    /// skipping that file's data records and trailing tape mark.
    pub fn scan(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        self.tape.rewind()?;
        self.position = TapePosition::Bot;
        let mut entries = Vec::new();
        let mut consecutive_marks = 0;
        loop {
            match self.tape.read_record()? {
                TapeRecord::EndOfMedium => break,
                TapeRecord::TapeMark => {
                    consecutive_marks += 1;
                    self.position = TapePosition::AtTapeMark;
                    if consecutive_marks >= 2 {
                        self.position = TapePosition::Eot;
                        break;
                    }
                }
                TapeRecord::Data(header_bytes) => {
                    consecutive_marks = 0;
                    self.position = TapePosition::AtRecordHeader;
                    let Some(header) = FileHeader::decode(&header_bytes) else {
                        return Err(FsError::Corrupt("DOS-11 magtape file header too short".into()));
                    };
                    entries.push(DirectoryEntry {
                        name: header.filename(),
                        length_blocks: header.block_count as u32,
                        created: None,
                        mode: FileMode::Image,
                        attributes: FileAttributes::empty(),
                    });
                    for _ in 0..header.block_count {
                        self.tape.read_record()?;
                        self.position = TapePosition::BetweenRecords;
                    }
                    self.tape.read_record()?; // trailing tape mark for this file
                }
            }
        }
        Ok(entries)
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    pub fn position(&self) -> TapePosition {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_file_record(tape: &mut TapeDevice<Cursor<Vec<u8>>>, name_words: (u16, u16), ext_word: u16, data: &[&[u8]]) {
        let mut header = [0u8; 14];
        header[0..2].copy_from_slice(&name_words.0.to_le_bytes());
        header[2..4].copy_from_slice(&name_words.1.to_le_bytes());
        header[4..6].copy_from_slice(&ext_word.to_le_bytes());
        header[6..8].copy_from_slice(&(data.len() as u16).to_le_bytes());
        tape.write_record(Some(&header)).unwrap();
        for block in data {
            tape.write_record(Some(block)).unwrap();
        }
        tape.write_record(None).unwrap();
    }

    #[test]
    fn scan_reports_every_file_header_on_the_tape() {
        let mut tape = TapeDevice::new(Cursor::new(Vec::new()));
        let (hi, lo) = rad50::ascii_to_rad50_pair(b"FOO");
        let ext = rad50::ascii_to_rad50(b"DAT");
        write_file_record(&mut tape, (hi, lo), ext, &[&[1u8; 512]]);
        write_file_record(&mut tape, (hi, lo), ext, &[&[2u8; 512], &[3u8; 512]]);
        tape.write_record(None).unwrap(); // EOT double mark

        let mut fs = Dos11MagtapeFilesystem::mount(tape.into_inner()).unwrap();
        let entries = fs.scan().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "FOO.DAT");
        assert_eq!(entries[0].length_blocks, 1);
        assert_eq!(entries[1].length_blocks, 2);
        assert_eq!(fs.position(), TapePosition::Eot);
    }
}
