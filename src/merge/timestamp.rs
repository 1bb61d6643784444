//! Subtitle timestamp formatting and parsing.
//!
//! SRT uses `HH:MM:SS,mmm`, WebVTT uses `HH:MM:SS.mmm`. Formatter and parser
//! round-trip at millisecond precision for any time in `[0, 24h)`.

use crate::error::{CallscribeError, Result};

/// Formats seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_timestamp(seconds: f64) -> String {
    format_timestamp(seconds, ',')
}

/// Formats seconds as a WebVTT timestamp (`HH:MM:SS.mmm`).
pub fn format_vtt_timestamp(seconds: f64) -> String {
    format_timestamp(seconds, '.')
}

/// Parses an SRT timestamp back to seconds.
pub fn parse_srt_timestamp(input: &str) -> Result<f64> {
    parse_timestamp(input, ',')
}

/// Parses a WebVTT timestamp back to seconds.
pub fn parse_vtt_timestamp(input: &str) -> Result<f64> {
    parse_timestamp(input, '.')
}

fn format_timestamp(seconds: f64, millis_sep: char) -> String {
    // Round once in the millisecond domain so format/parse round-trips.
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, millis_sep, millis
    )
}

fn parse_timestamp(input: &str, millis_sep: char) -> Result<f64> {
    let invalid = || CallscribeError::Other(format!("Invalid timestamp: '{}'", input));

    let (clock, millis_str) = input.rsplit_once(millis_sep).ok_or_else(invalid)?;
    let mut clock_parts = clock.split(':');
    let (hours, minutes, secs) = match (
        clock_parts.next(),
        clock_parts.next(),
        clock_parts.next(),
        clock_parts.next(),
    ) {
        (Some(h), Some(m), Some(s), None) => (h, m, s),
        _ => return Err(invalid()),
    };

    let hours: u64 = hours.parse().map_err(|_| invalid())?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let secs: u64 = secs.parse().map_err(|_| invalid())?;
    if millis_str.len() != 3 || minutes >= 60 || secs >= 60 {
        return Err(invalid());
    }
    let millis: u64 = millis_str.parse().map_err(|_| invalid())?;

    let total_millis = hours * 3_600_000 + minutes * 60_000 + secs * 1000 + millis;
    Ok(total_millis as f64 / 1000.0)
}
