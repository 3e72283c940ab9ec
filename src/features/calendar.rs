//! Calendar feature encodings.
//!
//! Bounded periodic fields (hour of day, day of week, month) are projected
//! onto the unit circle so that adjacent-in-time values stay adjacent in
//! feature space: hour 23 and hour 0 are one step apart on the circle, while
//! a plain integer encoding would put them 23 apart.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Encode a periodic field as a (sin, cos) pair on the unit circle.
///
/// For `value` in `[0, period)` the angle `atan2(sin, cos)` recovers
/// `value` modulo `period` within floating tolerance.
pub fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * std::f64::consts::PI * value / period;
    (angle.sin(), angle.cos())
}

/// Hour of day, 0..=23.
pub fn hour_of_day(ts: DateTime<Utc>) -> u32 {
    ts.hour()
}

/// Day of week with Monday = 0, Sunday = 6.
pub fn day_of_week(ts: DateTime<Utc>) -> u32 {
    ts.weekday().num_days_from_monday()
}

/// Calendar month, 1..=12.
pub fn month(ts: DateTime<Utc>) -> u32 {
    ts.month()
}

/// Whether the timestamp falls on Saturday or Sunday.
pub fn is_weekend(ts: DateTime<Utc>) -> bool {
    day_of_week(ts) >= 5
}
