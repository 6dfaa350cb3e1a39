use crate::agenda::MS_PER_MINUTE;

/// Minutes rounded to one decimal place, the precision at which completed
/// items commit their actual time. Rounding rule is round(x * 10) / 10.
pub fn round_to_tenth_minutes(ms: i64) -> f64 {
    ((ms as f64 / MS_PER_MINUTE) * 10.0).round() / 10.0
}

/// `m:ss` rendering of a millisecond span. Negative spans render their
/// magnitude; the caller decides how to mark overrun.
pub fn format_clock(ms: i64) -> String {
    let total_secs = ms.abs() / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

pub fn format_minutes(minutes: f64) -> String {
    if (minutes - minutes.round()).abs() < f64::EPSILON {
        format!("{}", minutes.round() as i64)
    } else {
        format!("{:.1}", minutes)
    }
}
