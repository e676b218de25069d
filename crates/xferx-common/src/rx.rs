//! RX01/RX02 floppy geometry: sector interleave and 12-bit word packing for
//! the PDP-8 family (OS/8, TSS/8.24).
//!
//! Ported from `xferx/rx.py` in the original source: the interleave tables
//! and the `rxfactr`/`rxfactr_12bit` position functions are reproduced
//! byte-for-byte (including the `3328`-byte-per-track constant, which is
//! `26 * 128`, the RX01 sector size times sectors/track) since spec.md
//! leaves the exact interleave as something to "preserve" rather than
//! re-derive.

pub const SECTORS_PER_TRACK: usize = 26;
pub const TRACKS_PER_DISK: usize = 77;
pub const RX01_SECTOR_SIZE: usize = 128;
pub const RX02_SECTOR_SIZE: usize = 256;
pub const RX01_SIZE: usize = TRACKS_PER_DISK * SECTORS_PER_TRACK * RX01_SECTOR_SIZE;
pub const RX02_SIZE: usize = TRACKS_PER_DISK * SECTORS_PER_TRACK * RX02_SECTOR_SIZE;
pub const BLOCK_SIZE: usize = 512;

/// Picks RX01/RX02/generic sector size from a device's total byte length.
pub fn sector_size_for_device(device_size: usize) -> usize {
    if device_size == RX01_SIZE {
        RX01_SECTOR_SIZE
    } else if device_size == RX02_SIZE {
        RX02_SECTOR_SIZE
    } else {
        BLOCK_SIZE
    }
}

/// Physical byte offset of logical block `blkno` in standard (8-bit mode)
/// RX01/RX02 interleave, or a flat `blkno * BLOCK_SIZE` for any other
/// sector size.
pub fn rxfactr(blkno: usize, sector_size: usize) -> usize {
    if sector_size == RX01_SECTOR_SIZE || sector_size == RX02_SECTOR_SIZE {
        let mut track = blkno / SECTORS_PER_TRACK + 1;
        let mut i = (blkno % SECTORS_PER_TRACK) << 1;
        if i >= SECTORS_PER_TRACK {
            i += 1;
        }
        let sector = ((i + 6 * (track - 1)) % SECTORS_PER_TRACK) + 1;
        if track >= TRACKS_PER_DISK {
            track = 0;
        }
        track * 3328 + (sector - 1) * sector_size
    } else {
        blkno * BLOCK_SIZE
    }
}

fn interleave_12b(sector_size: usize) -> Vec<usize> {
    if sector_size == RX01_SECTOR_SIZE {
        let mut table = Vec::with_capacity(2 * SECTORS_PER_TRACK);
        for t in 0..2 {
            for s in (1..SECTORS_PER_TRACK).step_by(2) {
                table.push(t * SECTORS_PER_TRACK + s - 1);
            }
            for s in (2..=SECTORS_PER_TRACK).step_by(2) {
                table.push(t * SECTORS_PER_TRACK + s - 1);
            }
        }
        table
    } else {
        let mut table = Vec::with_capacity(SECTORS_PER_TRACK);
        for s in (1..=SECTORS_PER_TRACK).step_by(3) {
            table.push(s - 1);
        }
        for s in (2..=SECTORS_PER_TRACK).step_by(3) {
            table.push(s - 1);
        }
        for s in (3..=SECTORS_PER_TRACK).step_by(3) {
            table.push(s - 1);
        }
        table
    }
}

/// Physical byte offsets of the sectors making up one 512-byte logical
/// block, in 12-bit mode, for RX01/RX02 media.
pub fn rxfactr_12bit(block_number: usize, sector_size: usize) -> Vec<usize> {
    let interleave = interleave_12b(sector_size);
    let sectors_per_block = BLOCK_SIZE / sector_size;
    let repeat = interleave.len() / sectors_per_block;
    let base = (block_number / repeat) * repeat * BLOCK_SIZE / RX01_SECTOR_SIZE;
    let offset = block_number % repeat;
    let skip = SECTORS_PER_TRACK * sector_size;
    (0..sectors_per_block)
        .map(|i| {
            let sector = base + interleave[offset * sectors_per_block + i];
            sector * sector_size + skip
        })
        .collect()
}

/// Extracts 64 (RX01) or 128 (RX02) 12-bit words, big-endian bit-packed,
/// from the first 96 or 192 bytes of `data` starting at `data[0]`.
pub fn extract_12bit_words(data: &[u8], sector_size: usize) -> Vec<u16> {
    let packed_len = match sector_size {
        RX01_SECTOR_SIZE => 96,
        RX02_SECTOR_SIZE => 192,
        _ => panic!("invalid sector size: {sector_size}"),
    };
    let bytes = &data[..packed_len];
    let total_bits = bytes.len() * 8;
    let total_words = total_bits / 12;

    let mut bit_buffer: u128 = 0;
    for &b in bytes {
        bit_buffer = (bit_buffer << 8) | b as u128;
    }

    (0..total_words)
        .map(|i| ((bit_buffer >> (total_bits - 12 * (i + 1))) & 0xFFF) as u16)
        .collect()
}

/// Packs 64 (RX01) or 128 (RX02) 12-bit words back into a byte array,
/// the inverse of [`extract_12bit_words`].
pub fn pack_12bit_words(words: &[u16], sector_size: usize) -> Vec<u8> {
    let expected = match sector_size {
        RX01_SECTOR_SIZE => 64,
        RX02_SECTOR_SIZE => 128,
        _ => panic!("invalid sector size: {sector_size}"),
    };
    assert_eq!(words.len(), expected, "wrong word count for sector size");

    let mut bit_buffer: u128 = 0;
    for &w in words {
        bit_buffer = (bit_buffer << 12) | (w as u128 & 0xFFF);
    }
    let byte_len = (words.len() * 12 + 7) / 8;
    let mut out = vec![0u8; byte_len];
    for i in (0..byte_len).rev() {
        out[i] = (bit_buffer & 0xFF) as u8;
        bit_buffer >>= 8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx01_12bit_word_packing_round_trips() {
        let words: Vec<u16> = (0..64).map(|i| (i * 17) & 0xFFF).collect();
        let packed = pack_12bit_words(&words, RX01_SECTOR_SIZE);
        assert_eq!(packed.len(), 96);
        let mut sector = vec![0u8; RX01_SECTOR_SIZE];
        sector[..96].copy_from_slice(&packed);
        let decoded = extract_12bit_words(&sector, RX01_SECTOR_SIZE);
        assert_eq!(decoded, words);
    }

    #[test]
    fn rx02_12bit_word_packing_round_trips() {
        let words: Vec<u16> = (0..128).map(|i| (i * 31) & 0xFFF).collect();
        let packed = pack_12bit_words(&words, RX02_SECTOR_SIZE);
        assert_eq!(packed.len(), 192);
        let mut sector = vec![0u8; RX02_SECTOR_SIZE];
        sector[..192].copy_from_slice(&packed);
        let decoded = extract_12bit_words(&sector, RX02_SECTOR_SIZE);
        assert_eq!(decoded, words);
    }

    #[test]
    fn sector_size_detection_matches_known_image_sizes() {
        assert_eq!(sector_size_for_device(RX01_SIZE), RX01_SECTOR_SIZE);
        assert_eq!(sector_size_for_device(RX02_SIZE), RX02_SECTOR_SIZE);
        assert_eq!(sector_size_for_device(512 * 2000), BLOCK_SIZE);
    }

    #[test]
    fn rxfactr_first_track_is_identity_interleaved() {
        // Track 0 (blkno 0..26 maps to track 1 per the source's 1-based
        // track numbering), sector 0 sits at the start of track 1's data.
        let pos = rxfactr(0, RX01_SECTOR_SIZE);
        assert_eq!(pos, 1 * 3328 + 0);
    }
}
