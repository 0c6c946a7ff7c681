use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Timelike, Utc};
use regex::Regex;

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]").unwrap());
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());

/// Reads the leading `[HH:MM:SS]` stamp of a server log line as today's local time.
pub fn extract_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let time_s = TIMESTAMP.captures(input).map(|v| v[1].to_string())?;
    let time = NaiveTime::parse_from_str(&time_s, "%H:%M:%S").ok()?;

    let today = Local::now().date_naive();

    let local_dt = Local
        .with_ymd_and_hms(
            today.year(),
            today.month(),
            today.day(),
            time.hour(),
            time.minute(),
            time.second(),
        )
        .single()?;

    Some(local_dt.with_timezone(&Utc))
}

pub fn strip_ansi(input: &str) -> String {
    ANSI_ESCAPE.replace_all(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sgr_and_cursor_sequences() {
        assert_eq!(strip_ansi("\u{1b}[1;31mred\u{1b}[0m text"), "red text");
        assert_eq!(strip_ansi("\u{1b}[2Kclear"), "clear");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn timestamp_needs_a_clock_time() {
        assert!(extract_timestamp("[12:34:56] [Server thread/INFO]: hi").is_some());
        assert!(extract_timestamp("[Server thread/INFO]: hi").is_none());
        assert!(extract_timestamp("no brackets").is_none());
    }
}
