use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

/// Humanized label for a session's last activity, relative to `now`.
///
/// Days are counted between calendar dates in `now`'s time zone:
/// same day (or later) gives `HH:MM`, one day gives `yesterday`, up to six
/// days gives `N days ago`, anything older gives a month/day such as `Oct 12`.
pub fn format_time_display<Tz>(timestamp: DateTime<Utc>, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = timestamp.with_timezone(&now.timezone());
    let diff_days = (now.date_naive() - local.date_naive()).num_days();

    match diff_days {
        d if d <= 0 => local.format("%H:%M").to_string(),
        1 => "yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        _ => local.format("%b %-d").to_string(),
    }
}
