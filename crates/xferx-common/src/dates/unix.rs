//! UNIX date: the familiar 32-bit epoch-seconds timestamp, except on the
//! PDP-11 it's stored as two 16-bit words in middle-endian order (the
//! low-order word first) rather than a straight 32-bit big/little-endian
//! value. [`crate::byteswap::word_swap32`] converts between the two.
//! Second precision.

use chrono::{DateTime, Utc};

pub fn decode(epoch_seconds: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch_seconds as i64, 0)
}

pub fn encode(dt: DateTime<Utc>) -> Option<u32> {
    u32::try_from(dt.timestamp()).ok()
}

/// Decodes a middle-endian on-disk value (low word first) as stored by
/// PDP-11 UNIX directory entries.
pub fn decode_middle_endian(raw: u32) -> Option<DateTime<Utc>> {
    decode(crate::byteswap::word_swap32(raw))
}

pub fn encode_middle_endian(dt: DateTime<Utc>) -> Option<u32> {
    encode(dt).map(crate::byteswap::word_swap32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_epoch_seconds() {
        let dt = DateTime::from_timestamp(1_000_000_000, 0).unwrap();
        let encoded = encode(dt).unwrap();
        assert_eq!(decode(encoded), Some(dt));
    }

    #[test]
    fn middle_endian_round_trips_through_the_word_swap() {
        let dt = DateTime::from_timestamp(500_000_000, 0).unwrap();
        let raw = encode_middle_endian(dt).unwrap();
        assert_eq!(decode_middle_endian(raw), Some(dt));
    }
}
