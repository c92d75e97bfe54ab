//! Human-readable renderings of timestamps and numbers for display.

use chrono::{DateTime, Utc};

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 12 * MONTH;
const LONG_TIME: i64 = 37 * YEAR;

enum Unit {
    /// Fixed text, no count.
    Fixed(&'static str),
    /// Count of the given unit (in milliseconds), followed by the label.
    Count(i64, &'static str),
}

/// Upper bound (exclusive, milliseconds) and how to render values below it.
const MAGNITUDES: &[(i64, Unit)] = &[
    (SECOND, Unit::Fixed("now")),
    (2 * SECOND, Unit::Fixed("1 second")),
    (MINUTE, Unit::Count(SECOND, "seconds")),
    (2 * MINUTE, Unit::Fixed("1 minute")),
    (HOUR, Unit::Count(MINUTE, "minutes")),
    (2 * HOUR, Unit::Fixed("1 hour")),
    (DAY, Unit::Count(HOUR, "hours")),
    (2 * DAY, Unit::Fixed("1 day")),
    (WEEK, Unit::Count(DAY, "days")),
    (2 * WEEK, Unit::Fixed("1 week")),
    (MONTH, Unit::Count(WEEK, "weeks")),
    (2 * MONTH, Unit::Fixed("1 month")),
    (YEAR, Unit::Count(MONTH, "months")),
    (18 * MONTH, Unit::Fixed("1 year")),
    (2 * YEAR, Unit::Fixed("2 years")),
    (LONG_TIME, Unit::Count(YEAR, "years")),
    (i64::MAX, Unit::Fixed("a long while")),
];

/// Describe `t` relative to `now`, e.g. `"3 days ago"` or `"2 hours from now"`.
pub fn humanize_since(t: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut diff = (now - t).num_milliseconds();
    let suffix = if diff < 0 {
        diff = diff.saturating_neg();
        "from now"
    } else {
        "ago"
    };

    let (_, unit) = MAGNITUDES
        .iter()
        .find(|(bound, _)| *bound > diff)
        .unwrap_or(&MAGNITUDES[MAGNITUDES.len() - 1]);

    match unit {
        Unit::Fixed("now") => "now".to_string(),
        Unit::Fixed(text) => format!("{text} {suffix}"),
        Unit::Count(div, label) => format!("{} {label} {suffix}", diff / div),
    }
}

/// Format an integer with thousands separators: `1234567` -> `"1,234,567"`.
pub fn humanize_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
