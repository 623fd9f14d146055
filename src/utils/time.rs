use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use now::DateTimeNow;

/// This is the standard way of converting a date to a day file name in deepwork.
pub fn date_to_day_file(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Inverse of [date_to_day_file]. Files in the session directory that don't
/// parse back are not day files and get ignored.
pub fn day_file_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

/// The local calendar day containing `moment`, as a half-open UTC range.
pub fn day_window(moment: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = moment.beginning_of_day();
    (start.to_utc(), next_day_start(start).to_utc())
}

/// The local week containing `moment`, as a half-open UTC range. Weeks start
/// on Monday.
pub fn week_window(moment: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = moment.beginning_of_week();
    let next = (start + Duration::weeks(1)).beginning_of_week();
    (start.to_utc(), next.to_utc())
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}
