//! Second-granularity timestamp tokens used to make saved filenames unique.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

/// Token for the current local wall-clock time, e.g. `2024_3_9_7_5_2_`.
///
/// Two calls within the same second return the same token.
pub fn time_token() -> String {
    time_token_at(&Local::now())
}

/// Render `Y_M_D_H_M_S_` for an explicit instant, without zero padding.
pub fn time_token_at<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    let units = [
        time.year() as i64,
        time.month() as i64,
        time.day() as i64,
        time.hour() as i64,
        time.minute() as i64,
        time.second() as i64,
    ];

    let mut token = String::new();
    for unit in units {
        token.push_str(&unit.to_string());
        token.push('_');
    }
    token
}
