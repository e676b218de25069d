//! Apple DOS 3.3. The VTOC (track 17, sector 0) holds a per-track free
//! bitmap (32 bits/track, top-aligned to `sectors_per_track`) and the
//! address of the first catalog sector; the catalog is a chain of
//! sectors each holding 7 File Descriptive Entries. Each file's data is
//! reached through a chain of Track/Sector List sectors, each holding
//! up to 122 data T/S pointers plus a forward link to the next T/S
//! list sector. Grounded on `xferx/apple2/appledosfs.py`.

use xferx_core::{BlockDevice, DirectoryEntry, FileAttributes, FileMode, FsError, FsResult};

pub const SECTOR_SIZE: usize = 256;
const VTOC_TRACK: u8 = 17;
const VTOC_SECTOR: u8 = 0;
const VTOC_BITMAP_OFFSET: usize = 0x38;
const RESERVED_TRACKS: u8 = 3;
const FILE_DESCRIPTIVE_ENTRY_OFFSET: usize = 0x0B;
const FILE_DESCRIPTIVE_ENTRY_SIZE: usize = 35;
const DATA_SECTORS_PER_TS_LIST: usize = 122;
const TS_LIST_DATA_OFFSET: usize = 0x0C;
const DELETED_TRACK: u8 = 0xFF;

/// Logical-block-to-physical-sector translation table for images stored
/// in DOS 3.3 sector order (as opposed to ProDOS order), per spec.md's
/// sector-translation algorithm.
pub const DOS_SECTOR_ORDER: [u8; 16] = [0, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 15];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSector {
    pub track: u8,
    pub sector: u8,
}

impl TrackSector {
    pub fn is_free_marker(&self) -> bool {
        self.track == 0 && self.sector == 0
    }
}

pub struct Vtoc {
    pub catalog_track: u8,
    pub catalog_sector: u8,
    pub sectors_per_track: u8,
    pub tracks_per_disk: u8,
    bitmap: Vec<u8>,
}

impl Vtoc {
    pub fn read(device: &mut dyn BlockDevice) -> FsResult<Self> {
        let mut sector = vec![0u8; SECTOR_SIZE];
        read_sector(device, TrackSector { track: VTOC_TRACK, sector: VTOC_SECTOR }, &mut sector)?;
        let catalog_track = sector[1];
        let catalog_sector = sector[2];
        let sectors_per_track = sector[0x35];
        let tracks_per_disk = sector[0x34];
        let bitmap_len = 4 * tracks_per_disk as usize;
        let bitmap = sector[VTOC_BITMAP_OFFSET..(VTOC_BITMAP_OFFSET + bitmap_len).min(SECTOR_SIZE)].to_vec();
        Ok(Self {
            catalog_track,
            catalog_sector,
            sectors_per_track,
            tracks_per_disk,
            bitmap,
        })
    }

    /// A track's 32-bit word is top-aligned to `sectors_per_track`: bit
    /// `31 - sector` set means that sector is free.
    pub fn is_free(&self, track: u8, sector: u8) -> bool {
        let base = track as usize * 4;
        if base + 4 > self.bitmap.len() {
            return false;
        }
        let word = u32::from_le_bytes([self.bitmap[base], self.bitmap[base + 1], self.bitmap[base + 2], self.bitmap[base + 3]]);
        let bit = 31 - sector as u32;
        (word & (1 << bit)) != 0
    }
}

pub struct FileDescriptiveEntry {
    pub track_sector_list: TrackSector,
    pub file_type: u8,
    pub locked: bool,
    pub name: String,
    pub sector_count: u16,
}

impl FileDescriptiveEntry {
    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FILE_DESCRIPTIVE_ENTRY_SIZE {
            return None;
        }
        let track = bytes[0];
        if track == DELETED_TRACK || track == 0 {
            return None;
        }
        let sector = bytes[1];
        let raw_type = bytes[2];
        let locked = raw_type & 0x80 != 0;
        let file_type = raw_type & 0x7F;
        let name_bytes: Vec<u8> = bytes[3..33].iter().map(|&b| b & 0x7F).collect();
        let name = String::from_utf8_lossy(&name_bytes).trim_end().to_string();
        let sector_count = u16::from_le_bytes([bytes[33], bytes[34]]);
        Some(Self {
            track_sector_list: TrackSector { track, sector },
            file_type,
            locked,
            name,
            sector_count,
        })
    }

    fn to_directory_entry(&self) -> DirectoryEntry {
        let mut attrs = FileAttributes::empty();
        if self.locked {
            attrs |= FileAttributes::READ_ONLY;
        }
        DirectoryEntry {
            name: self.name.clone(),
            length_blocks: self.sector_count as u32,
            created: None,
            mode: FileMode::Image,
            attributes: attrs,
        }
    }
}

fn read_sector(device: &mut dyn BlockDevice, ts: TrackSector, buf: &mut [u8]) -> FsResult<()> {
    // Two 256-byte Apple sectors pack into one 512-byte xferx block.
    let block = ts.track as u32 * 8 + ts.sector as u32 / 2;
    let mut raw = vec![0u8; 512];
    device.read_block(block, &mut raw)?;
    let half = if ts.sector % 2 == 0 { 0 } else { 256 };
    buf.copy_from_slice(&raw[half..half + SECTOR_SIZE]);
    Ok(())
}

pub struct AppleDosFilesystem {
    device: Box<dyn BlockDevice>,
    vtoc: Vtoc,
}

impl AppleDosFilesystem {
    pub fn mount(mut device: Box<dyn BlockDevice>, strict: bool) -> FsResult<Self> {
        let vtoc = Vtoc::read(device.as_mut())?;
        if strict && vtoc.sectors_per_track == 0 {
            return Err(FsError::Corrupt("Apple DOS 3.3 VTOC reports zero sectors per track".into()));
        }
        Ok(Self { device, vtoc })
    }

    pub fn list(&mut self) -> FsResult<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut ts = TrackSector { track: self.vtoc.catalog_track, sector: self.vtoc.catalog_sector };
        while !(ts.track == 0 && ts.sector == 0) {
            let mut sector = vec![0u8; SECTOR_SIZE];
            read_sector(self.device.as_mut(), ts, &mut sector)?;
            let mut offset = FILE_DESCRIPTIVE_ENTRY_OFFSET;
            while offset + FILE_DESCRIPTIVE_ENTRY_SIZE <= SECTOR_SIZE {
                if let Some(entry) = FileDescriptiveEntry::decode(&sector[offset..offset + FILE_DESCRIPTIVE_ENTRY_SIZE]) {
                    entries.push(entry.to_directory_entry());
                }
                offset += FILE_DESCRIPTIVE_ENTRY_SIZE;
            }
            ts = TrackSector { track: sector[1], sector: sector[2] };
        }
        Ok(entries)
    }

    /// Walks a file's Track/Sector List chain, returning data sectors
    /// in file order.
    pub fn file_sectors(&mut self, entry: &FileDescriptiveEntry) -> FsResult<Vec<TrackSector>> {
        let mut data_sectors = Vec::new();
        let mut ts = entry.track_sector_list;
        while !(ts.track == 0 && ts.sector == 0) {
            let mut sector = vec![0u8; SECTOR_SIZE];
            read_sector(self.device.as_mut(), ts, &mut sector)?;
            let mut offset = TS_LIST_DATA_OFFSET;
            for _ in 0..DATA_SECTORS_PER_TS_LIST {
                if offset + 2 > SECTOR_SIZE {
                    break;
                }
                let track = sector[offset];
                let data_sector = sector[offset + 1];
                if !(track == 0 && data_sector == 0) {
                    data_sectors.push(TrackSector { track, sector: data_sector });
                }
                offset += 2;
            }
            ts = TrackSector { track: sector[1], sector: sector[2] };
        }
        Ok(data_sectors)
    }

    pub fn sectors_per_track(&self) -> u8 {
        self.vtoc.sectors_per_track
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use xferx_core::ByteFile;

    fn make_volume() -> Box<dyn BlockDevice> {
        let mut data = vec![0u8; 512 * 8 * 35];
        let vtoc_block = (VTOC_TRACK as usize) * 8;
        let vtoc_offset = vtoc_block * 512;
        data[vtoc_offset + 1] = 17;
        data[vtoc_offset + 2] = 15;
        data[vtoc_offset + 0x34] = 35;
        data[vtoc_offset + 0x35] = 16;
        Box::new(ByteFile::new(Cursor::new(data), 512, 8 * 35))
    }

    #[test]
    fn mount_reads_sectors_per_track() {
        let fs = AppleDosFilesystem::mount(make_volume(), true).unwrap();
        assert_eq!(fs.sectors_per_track(), 16);
    }

    #[test]
    fn vtoc_bitmap_reports_default_unformatted_as_not_free() {
        let mut device = make_volume();
        let vtoc = Vtoc::read(device.as_mut()).unwrap();
        assert!(!vtoc.is_free(0, 0));
    }

    #[test]
    fn dos_sector_order_table_has_sixteen_entries() {
        assert_eq!(DOS_SECTOR_ORDER.len(), 16);
        assert_eq!(DOS_SECTOR_ORDER[0], 0);
        assert_eq!(DOS_SECTOR_ORDER[15], 15);
    }
}
