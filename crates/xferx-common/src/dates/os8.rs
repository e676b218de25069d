//! OS/8 date: a 12-bit word, `year(3) | day(5) | month(4)` from the high
//! bit. The 3-bit year field wraps every 8 years with no epoch marker on
//! disk, so decoding requires a reference year to resolve which 8-year
//! bucket the on-disk value falls in; callers that don't have one should
//! use `decode_near` with the current year as the reference.

use chrono::{Datelike, NaiveDate};

const BASE_YEAR: i32 = 1970;

pub fn decode_near(val: u16, reference_year: i32) -> Option<NaiveDate> {
    let val = val & 0x0FFF;
    if val == 0 {
        return None;
    }
    let year_field = ((val >> 9) & 0x07) as i32;
    let day = ((val >> 4) & 0x1F) as u32;
    let month = (val & 0x0F) as u32;

    let reference_bucket = (reference_year - BASE_YEAR).div_euclid(8);
    let mut best_year = None;
    for bucket in [reference_bucket - 1, reference_bucket, reference_bucket + 1] {
        let candidate = BASE_YEAR + bucket * 8 + year_field;
        if best_year.is_none_or(|best: i32| (candidate - reference_year).abs() < (best - reference_year).abs()) {
            best_year = Some(candidate);
        }
    }
    NaiveDate::from_ymd_opt(best_year.unwrap(), month, day)
}

pub fn encode(date: NaiveDate) -> u16 {
    let year_field = ((date.year() - BASE_YEAR).rem_euclid(8)) as u16;
    ((year_field & 0x07) << 9) | ((date.day() as u16 & 0x1F) << 4) | (date.month() as u16 & 0x0F)
}
