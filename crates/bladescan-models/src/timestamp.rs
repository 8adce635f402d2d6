//! Playback-time parsing and display formatting.

use thiserror::Error;

/// Parse a playback position into seconds.
///
/// Accepts `SS`, `MM:SS` and `HH:MM:SS`, each with optional fractional
/// seconds.
///
/// # Examples
/// ```
/// use bladescan_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30").unwrap(), 90.0);
/// assert_eq!(parse_timestamp("2.5").unwrap(), 2.5);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    let mut total = 0.0;
    for part in &parts {
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(part.to_string()))?;
        if value < 0.0 || !value.is_finite() {
            return Err(TimestampError::InvalidValue(part.to_string()));
        }
        total = total * 60.0 + value;
    }
    Ok(total)
}

/// Format a playback position as `M:SS.s` (or `H:MM:SS.s` past an hour).
///
/// This is the text shown next to the player, e.g. `0:03.5 / 1:20.0`.
pub fn format_playback_time(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let tenths = (secs * 10.0).round() as u64;
    let hours = tenths / 36_000;
    let mins = (tenths / 600) % 60;
    let sec_tenths = tenths % 600;

    if hours > 0 {
        format!(
            "{}:{:02}:{:02}.{}",
            hours,
            mins,
            sec_tenths / 10,
            sec_tenths % 10
        )
    } else {
        format!("{}:{:02}.{}", mins, sec_tenths / 10, sec_tenths % 10)
    }
}

/// Current position and duration, e.g. `0:03.5 / 1:20.0`.
pub fn format_position(current: f64, duration: Option<f64>) -> String {
    match duration {
        Some(d) => format!("{} / {}", format_playback_time(current), format_playback_time(d)),
        None => format_playback_time(current),
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Invalid timestamp component: {0}")]
    InvalidValue(String),

    #[error("Invalid timestamp format '{0}'. Use SS, MM:SS or HH:MM:SS")]
    InvalidFormat(String),
}
