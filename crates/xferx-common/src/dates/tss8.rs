//! TSS/8 date: a single word, `(year - 1974) * 372 + (month - 1) * 31 +
//! (day - 1)`, a fixed 31-day-month encoding rather than a true calendar
//! (month/day combinations past a month's real length never occur on
//! disk but decode harmlessly into the next month). Day precision only.

use chrono::{Datelike, NaiveDate};

const BASE_YEAR: i32 = 1974;

pub fn decode(val: u16) -> Option<NaiveDate> {
    if val == 0 {
        return None;
    }
    let val = val as i32;
    let year = BASE_YEAR + val / 372;
    let remainder = val % 372;
    let month = remainder / 31 + 1;
    let day = remainder % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

pub fn encode(date: NaiveDate) -> Option<u16> {
    let year_offset = date.year() - BASE_YEAR;
    if year_offset < 0 {
        return None;
    }
    let val = year_offset * 372 + (date.month() as i32 - 1) * 31 + (date.day() as i32 - 1);
    u16::try_from(val).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_across_years() {
        for year in [1974, 1980, 1999, 2010] {
            for &(month, day) in &[(1u32, 1u32), (6, 15), (12, 31)] {
                let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
                let encoded = encode(date).unwrap();
                assert_eq!(decode(encoded), Some(date));
            }
        }
    }

    #[test]
    fn zero_means_no_date() {
        assert_eq!(decode(0), None);
    }

    #[test]
    fn years_before_the_epoch_are_rejected() {
        assert_eq!(encode(NaiveDate::from_ymd_opt(1973, 1, 1).unwrap()), None);
    }
}
