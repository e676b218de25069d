//! AppleSingle: a container format bundling a file's data fork, resource
//! fork, and ProDOS metadata (access bits, file type, aux type) into one
//! byte stream, used by the shell's `COPY` to preserve metadata that a
//! host filesystem can't otherwise carry.
//!
//! Layout: magic `0x00051600`, a version word, 16 bytes of filler, an
//! entry count, then that many `{id: u32, offset: u32, length: u32}`
//! directory entries pointing into the rest of the stream. This module
//! only interprets entry IDs 1 (data fork), 2 (resource fork), and 11
//! (ProDOS file info); other entries are preserved on encode but ignored
//! on decode.

const MAGIC: u32 = 0x0005_1600;
const VERSION: u32 = 0x0002_0000;
const ENTRY_DATA_FORK: u32 = 1;
const ENTRY_RESOURCE_FORK: u32 = 2;
const ENTRY_PRODOS_FILE_INFO: u32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AppleSingleError {
    #[error("input is too short to contain an AppleSingle header")]
    TooShort,
    #[error("magic number {0:#010x} does not match AppleSingle")]
    BadMagic(u32),
    #[error("entry descriptor out of range of the input buffer")]
    EntryOutOfRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProdosFileInfo {
    pub access: u16,
    pub file_type: u16,
    pub aux_type: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppleSingleFile {
    pub data_fork: Vec<u8>,
    pub resource_fork: Option<Vec<u8>>,
    pub prodos_info: Option<ProdosFileInfo>,
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().unwrap())
}

impl AppleSingleFile {
    pub fn new(data_fork: Vec<u8>) -> Self {
        Self {
            data_fork,
            resource_fork: None,
            prodos_info: None,
        }
    }

    /// Decodes an AppleSingle envelope. Per spec.md's recovery rule, the
    /// caller should fall back to treating `bytes` as a raw data fork when
    /// this returns `Err`, rather than surfacing the error to the user.
    pub fn decode(bytes: &[u8]) -> Result<Self, AppleSingleError> {
        if bytes.len() < 26 {
            return Err(AppleSingleError::TooShort);
        }
        let magic = be_u32(&bytes[0..4]);
        if magic != MAGIC {
            return Err(AppleSingleError::BadMagic(magic));
        }
        let _version = be_u32(&bytes[4..8]);
        let entry_count = u16::from_be_bytes(bytes[24..26].try_into().unwrap()) as usize;

        let mut file = AppleSingleFile::default();
        for i in 0..entry_count {
            let start = 26 + i * 12;
            if start + 12 > bytes.len() {
                return Err(AppleSingleError::EntryOutOfRange);
            }
            let id = be_u32(&bytes[start..start + 4]);
            let offset = be_u32(&bytes[start + 4..start + 8]) as usize;
            let length = be_u32(&bytes[start + 8..start + 12]) as usize;
            if offset + length > bytes.len() {
                return Err(AppleSingleError::EntryOutOfRange);
            }
            let payload = &bytes[offset..offset + length];
            match id {
                ENTRY_DATA_FORK => file.data_fork = payload.to_vec(),
                ENTRY_RESOURCE_FORK => file.resource_fork = Some(payload.to_vec()),
                ENTRY_PRODOS_FILE_INFO if payload.len() >= 8 => {
                    file.prodos_info = Some(ProdosFileInfo {
                        access: u16::from_be_bytes(payload[0..2].try_into().unwrap()),
                        file_type: u16::from_be_bytes(payload[2..4].try_into().unwrap()),
                        aux_type: be_u32(&payload[4..8]),
                    });
                }
                _ => {}
            }
        }
        Ok(file)
    }

    /// Encodes into an AppleSingle envelope containing only the entries
    /// that are present (data fork is always written, even if empty).
    pub fn encode(&self) -> Vec<u8> {
        let mut entries: Vec<(u32, Vec<u8>)> = vec![(ENTRY_DATA_FORK, self.data_fork.clone())];
        if let Some(res) = &self.resource_fork {
            entries.push((ENTRY_RESOURCE_FORK, res.clone()));
        }
        if let Some(info) = &self.prodos_info {
            let mut payload = Vec::with_capacity(8);
            payload.extend_from_slice(&info.access.to_be_bytes());
            payload.extend_from_slice(&info.file_type.to_be_bytes());
            payload.extend_from_slice(&info.aux_type.to_be_bytes());
            entries.push((ENTRY_PRODOS_FILE_INFO, payload));
        }

        let header_len = 26 + entries.len() * 12;
        let mut out = Vec::with_capacity(header_len + self.data_fork.len());
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());

        let mut offset = header_len;
        let mut directory = Vec::with_capacity(entries.len() * 12);
        let mut payloads = Vec::new();
        for (id, payload) in &entries {
            directory.extend_from_slice(&id.to_be_bytes());
            directory.extend_from_slice(&(offset as u32).to_be_bytes());
            directory.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            offset += payload.len();
            payloads.extend_from_slice(payload);
        }
        out.extend_from_slice(&directory);
        out.extend_from_slice(&payloads);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_data_and_resource_forks_with_prodos_info() {
        let mut file = AppleSingleFile::new(b"Hello, world!".to_vec());
        file.resource_fork = Some(b"resource data".to_vec());
        file.prodos_info = Some(ProdosFileInfo {
            access: 0xC3,
            file_type: 0x06,
            aux_type: 0x2000,
        });

        let encoded = file.encode();
        let decoded = AppleSingleFile::decode(&encoded).unwrap();
        assert_eq!(decoded.data_fork, file.data_fork);
        assert_eq!(decoded.resource_fork, file.resource_fork);
        assert_eq!(decoded.prodos_info, file.prodos_info);
    }

    #[test]
    fn rejects_input_without_the_magic_number() {
        let raw = vec![0u8; 64];
        assert!(AppleSingleFile::decode(&raw).is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(AppleSingleFile::decode(&[0u8; 4]).is_err());
    }
}
