mod jobs;
mod style;

pub use jobs::{JobRow, print_jobs};
pub use style::{
    bold, command, configure, failure, info, muted, number, status, success, warning,
};

use std::time::Duration;
use time::OffsetDateTime;

pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

pub fn relative_time(at: OffsetDateTime, now: OffsetDateTime) -> String {
    let age = now - at;

    if age.whole_minutes() < 1 {
        return "just now".to_string();
    }

    if age.whole_hours() < 1 {
        return plural(age.whole_minutes(), "min");
    }

    if age.whole_days() < 1 {
        return plural(age.whole_hours(), "hour");
    }

    if age.whole_days() < 7 {
        return match age.whole_days() {
            1 => "yesterday".to_string(),
            days => format!("{days} days ago"),
        };
    }

    at.format(time::macros::format_description!(
        "[month repr:short] [day]"
    ))
    .unwrap_or_else(|_| "-".to_string())
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

pub fn compact_command(command: &str, max_chars: usize) -> String {
    let compact = command.split_whitespace().collect::<Vec<_>>().join(" ");

    if max_chars == 0 || compact.chars().count() <= max_chars {
        return compact;
    }

    let limit = max_chars.max(4) - 3;
    format!("{}...", compact.chars().take(limit).collect::<String>())
}
