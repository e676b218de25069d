//! Nova RDOS date/time: a 16-bit day count since 1967-12-31 (day 1 is
//! 1968-01-01), plus a 16-bit word holding `hour << 8 | minute`. Minute
//! precision only.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1967, 12, 31).unwrap()
}

pub fn decode(day_word: u16, time_word: u16) -> Option<NaiveDateTime> {
    if day_word == 0 {
        return None;
    }
    let date = epoch().checked_add_days(chrono::Days::new(day_word as u64))?;
    let hour = ((time_word >> 8) & 0xFF) as u32;
    let minute = (time_word & 0xFF) as u32;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(NaiveDateTime::new(date, time))
}

pub fn encode(dt: NaiveDateTime) -> Option<(u16, u16)> {
    let days = dt.date().signed_duration_since(epoch()).num_days();
    if !(1..=0xFFFF).contains(&days) {
        return None;
    }
    let time_word = ((dt.hour() as u16) << 8) | (dt.minute() as u16);
    Some((days as u16, time_word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_minute_precision() {
        for (year, month, day) in [(1968, 1, 1), (1980, 6, 15), (2010, 12, 31)] {
            let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
            let dt = NaiveDateTime::new(date, time);
            let (d, t) = encode(dt).unwrap();
            assert_eq!(decode(d, t), Some(dt), "{year}-{month}-{day}");
        }
    }

    #[test]
    fn zero_day_word_means_no_date() {
        assert_eq!(decode(0, 0), None);
    }
}
