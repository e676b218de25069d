//! Files-11 (ODS-1) date/time: not a packed integer like the other
//! formats — stored on disk as two fixed-width ASCII fields, `DDMMMYY`
//! (e.g. `17-JUN-85`, hyphens included in the 9-byte field) and
//! `HHMMSS` (`HH:MM:SS`, a 8-byte field). Second precision.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

pub fn decode(date_field: &str, time_field: &str) -> Option<NaiveDateTime> {
    let date_field = date_field.trim();
    if date_field.is_empty() {
        return None;
    }
    let mut parts = date_field.splitn(3, '-');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month_name = parts.next()?.trim().to_ascii_uppercase();
    let year_suffix: i32 = parts.next()?.trim().parse().ok()?;
    let month = MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
    let year = if year_suffix < 70 { 2000 + year_suffix } else { 1900 + year_suffix };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time_field = time_field.trim();
    let time = if time_field.is_empty() {
        NaiveTime::from_hms_opt(0, 0, 0)?
    } else {
        let mut fields = time_field.splitn(3, ':');
        let hour: u32 = fields.next()?.trim().parse().ok()?;
        let minute: u32 = fields.next().unwrap_or("0").trim().parse().ok()?;
        let second: u32 = fields.next().unwrap_or("0").trim().parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, second)?
    };
    Some(NaiveDateTime::new(date, time))
}

pub fn encode(dt: NaiveDateTime) -> (String, String) {
    let year_suffix = dt.year() % 100;
    let date_field = format!(
        "{:02}-{}-{:02}",
        dt.day(),
        MONTHS[dt.month() as usize - 1],
        year_suffix
    );
    let time_field = format!("{:02}:{:02}:{:02}", dt.hour(), dt.minute(), dt.second());
    (date_field, time_field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_second_precision() {
        let date = NaiveDate::from_ymd_opt(1985, 6, 17).unwrap();
        let time = NaiveTime::from_hms_opt(14, 5, 33).unwrap();
        let dt = NaiveDateTime::new(date, time);
        let (d, t) = encode(dt);
        assert_eq!(decode(&d, &t), Some(dt));
    }

    #[test]
    fn empty_date_field_means_no_date() {
        assert_eq!(decode("", ""), None);
    }

    #[test]
    fn two_digit_year_pivots_at_seventy() {
        let dt = decode("01-JAN-99", "00:00:00").unwrap();
        assert_eq!(dt.year(), 1999);
        let dt2 = decode("01-JAN-05", "00:00:00").unwrap();
        assert_eq!(dt2.year(), 2005);
    }
}
