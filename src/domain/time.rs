use chrono::{DateTime, Duration, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Formats accepted for hand-typed local timestamps (no offset)
const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Current instant in the canonical persisted form
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Canonical persisted form: UTC, millisecond precision, `Z` suffix
pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp as stored in the archive or typed by the user.
///
/// Accepts RFC 3339 and a few offset-less local forms. Returns `None` for
/// blank or unparsable input.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

/// Re-emit a user supplied timestamp in canonical form
pub fn normalize(value: &str) -> Option<String> {
    parse_instant(value).map(to_iso)
}

/// Elapsed time between two persisted timestamps, `now` standing in for a
/// missing end. Never negative; unparsable input counts as zero.
pub fn elapsed_between(start: &str, end: Option<&str>, now: DateTime<Utc>) -> Duration {
    let Some(start) = parse_instant(start) else {
        return Duration::zero();
    };
    let end = match end {
        Some(raw) => match parse_instant(raw) {
            Some(end) => end,
            None => return Duration::zero(),
        },
        None => now,
    };

    std::cmp::max(Duration::zero(), end - start)
}

/// Format a duration as "1h 5m 03s" (hours and minutes omitted when zero)
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::zero() {
        return "00s".to_string();
    }

    let total_secs = duration.num_seconds();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{:02}s", seconds));

    parts.join(" ")
}

/// Local wall-clock time of a timestamp ("14:03:09"), empty when unparsable
pub fn format_clock(value: &str) -> String {
    parse_instant(value)
        .map(|instant| instant.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Local date and time of a timestamp ("2024-05-01 14:03"), empty when unparsable
pub fn format_date(value: &str) -> String {
    parse_instant(value)
        .map(|instant| instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Whether both timestamps fall on the same local calendar day
pub fn is_same_day(start: &str, end: Option<&str>) -> bool {
    let Some(end) = end else {
        return false;
    };
    match (parse_instant(start), parse_instant(end)) {
        (Some(start), Some(end)) => {
            start.with_timezone(&Local).date_naive() == end.with_timezone(&Local).date_naive()
        }
        _ => false,
    }
}

/// Human readable span: "2024-05-01 14:03 - 15:10:00" when it ends the same
/// day, otherwise both dates; a running entry ends in "-".
pub fn format_span(start: &str, end: Option<&str>) -> String {
    match end {
        Some(end) if is_same_day(start, Some(end)) => {
            format!("{} - {}", format_date(start), format_clock(end))
        }
        Some(end) => format!("{} - {}", format_date(start), format_date(end)),
        None => format!("{} - -", format_date(start)),
    }
}
