//! Nova RDOS magtape. Like DOS-11 magtape (§3, [`crate::dos11_tape`]),
//! files are stored as sequential header/data/tape-mark triples and
//! the directory is built by scanning from BOT — there is no separate
//! `dgdosmagtapefs.py` in the retrieved source pack, so the record
//! framing here follows the same [`xferx_core::TapeDevice`] SIMH
//! framing used by every other tape format in this workspace, with
//! Nova's plain decimal-numbered filenames (as seen in the reference
//! test fixtures, e.g. file "5") rather than RAD-50 names.

use xferx_core::{DirectoryEntry, FileAttributes, FileMode, FsError, FsResult, TapeDevice, TapeRecord};

struct FileHeader {
    name: String,
    block_count: u16,
}

impl FileHeader {
    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 18 {
            return None;
        }
        let name = String::from_utf8_lossy(&bytes[0..16])
            .trim_end_matches('\0')
            .trim()
            .to_string();
        let block_count = u16::from_le_bytes([bytes[16], bytes[17]]);
        Some(Self { name, block_count })
    }
}

pub struct NovaMagtapeFilesystem<T> {
    tape: TapeDevice<T>,
    volume_name: String,
}

impl<T: xferx_io::Read + xferx_io::Write + xferx_io::Seek> NovaMagtapeFilesystem<T> {
    pub fn mount(inner: T) -> FsResult<Self> {
        Ok(Self {
            tape: TapeDevice::new(inner),
            volume_name: "DGDOSMT".into(),
        })
    }

    pub fn scan(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        self.tape.rewind()?;
        let mut entries = Vec::new();
        let mut consecutive_marks = 0;
        loop {
            match self.tape.read_record()? {
                TapeRecord::EndOfMedium => break,
                TapeRecord::TapeMark => {
                    consecutive_marks += 1;
                    if consecutive_marks >= 2 {
                        break;
                    }
                }
                TapeRecord::Data(header_bytes) => {
                    consecutive_marks = 0;
                    let Some(header) = FileHeader::decode(&header_bytes) else {
                        return Err(FsError::Corrupt("Nova magtape file header too short".into()));
                    };
                    entries.push(DirectoryEntry {
                        name: header.name,
                        length_blocks: header.block_count as u32,
                        created: None,
                        mode: FileMode::Image,
                        attributes: FileAttributes::empty(),
                    });
                    for _ in 0..header.block_count {
                        self.tape.read_record()?;
                    }
                    self.tape.read_record()?; // trailing tape mark
                }
            }
        }
        Ok(entries)
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_file_record(tape: &mut TapeDevice<Cursor<Vec<u8>>>, name: &str, data: &[&[u8]]) {
        let mut header = vec![0u8; 18];
        let name_bytes = name.as_bytes();
        header[0..name_bytes.len()].copy_from_slice(name_bytes);
        header[16..18].copy_from_slice(&(data.len() as u16).to_le_bytes());
        tape.write_record(Some(&header)).unwrap();
        for block in data {
            tape.write_record(Some(block)).unwrap();
        }
        tape.write_record(None).unwrap();
    }

    #[test]
    fn scan_reports_numbered_files() {
        let mut tape = TapeDevice::new(Cursor::new(Vec::new()));
        write_file_record(&mut tape, "5", &[&[0u8; 512], &[0u8; 512]]);
        tape.write_record(None).unwrap();

        let mut fs = NovaMagtapeFilesystem::mount(tape.into_inner()).unwrap();
        let entries = fs.scan().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "5");
        assert_eq!(entries[0].length_blocks, 2);
    }
}
