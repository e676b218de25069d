//! ProDOS date/time: two 16-bit words. The date word is
//! `year(7) | month(4) | day(5)` from the high bit; the time word is
//! `hour(5) | minute(6)` right-justified in its low bits, top byte zero.
//! `year` is years since 1900, except ProDOS treats `year >= 40` as 19xx
//! and `year < 40` as 20xx (the GS/OS clock-chip convention). Minute
//! precision only.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub fn decode(date_word: u16, time_word: u16) -> Option<NaiveDateTime> {
    if date_word == 0 {
        return None;
    }
    let year_field = (date_word >> 9) & 0x7F;
    let month = ((date_word >> 5) & 0x0F) as u32;
    let day = (date_word & 0x1F) as u32;
    let year = if year_field >= 40 {
        1900 + year_field as i32
    } else {
        2000 + year_field as i32
    };
    let hour = ((time_word >> 8) & 0x1F) as u32;
    let minute = (time_word & 0x3F) as u32;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(NaiveDateTime::new(date, time))
}

pub fn encode(dt: NaiveDateTime) -> Option<(u16, u16)> {
    let year = dt.year();
    let year_field = if year >= 2000 {
        (year - 2000) as u16
    } else {
        (year - 1900) as u16
    };
    if year_field > 0x7F {
        return None;
    }
    let date_word = (year_field << 9) | ((dt.month() as u16) << 5) | (dt.day() as u16);
    let time_word = (dt.hour() as u16) << 8 | (dt.minute() as u16);
    Some((date_word, time_word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn round_trips_with_minute_precision() {
        for year in [1940, 1975, 1999, 2000, 2039] {
            let date = NaiveDate::from_ymd_opt(year, 6, 15).unwrap();
            let time = NaiveTime::from_hms_opt(13, 45, 0).unwrap();
            let dt = NaiveDateTime::new(date, time);
            let (d, t) = encode(dt).unwrap();
            assert_eq!(decode(d, t), Some(dt), "year {year}");
        }
    }

    #[test]
    fn zero_date_word_means_no_date() {
        assert_eq!(decode(0, 0), None);
    }

    #[test]
    fn century_boundary_picks_19xx_at_40_and_above() {
        let date = NaiveDate::from_ymd_opt(1940, 1, 1).unwrap();
        let time = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let dt = NaiveDateTime::new(date, time);
        let (d, t) = encode(dt).unwrap();
        assert_eq!(decode(d, t).unwrap().year(), 1940);
    }
}
