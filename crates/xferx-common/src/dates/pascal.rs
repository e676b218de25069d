//! Apple Pascal date: 16-bit word, `year(7) | day(5) | month(4)` from the
//! high bit. `year` is years since 1900, with the filesystem's own
//! convention of treating `year >= 80` as 19xx and below as 20xx (mirrors
//! the century pivot the Apple II clock cards used in their driver code).
//! Day precision only.

use chrono::{Datelike, NaiveDate};

pub fn decode(val: u16) -> Option<NaiveDate> {
    if val == 0 {
        return None;
    }
    let year_field = (val >> 9) & 0x7F;
    let day = ((val >> 4) & 0x1F) as u32;
    let month = (val & 0x0F) as u32;
    let year = if year_field >= 80 {
        1900 + year_field as i32
    } else {
        2000 + year_field as i32
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn encode(date: NaiveDate) -> Option<u16> {
    let year = date.year();
    let year_field = if year >= 2000 {
        (year - 2000) as u16
    } else {
        (year - 1900) as u16
    };
    if year_field > 0x7F {
        return None;
    }
    Some((year_field << 9) | ((date.day() as u16) << 4) | (date.month() as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_across_the_century_pivot() {
        for year in [1980, 1999, 2000, 2020, 2079] {
            let date = NaiveDate::from_ymd_opt(year, 3, 17).unwrap();
            let encoded = encode(date).unwrap();
            assert_eq!(decode(encoded), Some(date), "year {year}");
        }
    }

    #[test]
    fn zero_means_no_date() {
        assert_eq!(decode(0), None);
    }
}
