use chrono::{Datelike, NaiveDate};

/// Whole days elapsed between two dates. Negative when `to` precedes `from`.
pub fn elapsed_days(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Completed years between `birth` and `today` (floor, birthday-aware).
pub fn age_years(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}
