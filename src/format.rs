//! Duration rendering for values returned by the resolver.
//!
//! Durations arrive as strings (cached or freshly fetched), so the formatter
//! accepts text: blank input renders as nothing and anything that is not a
//! number is passed through untouched.

use std::{fmt, str::FromStr};

use anyhow::{Result, bail};

/// Output style requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationFormat {
    /// `1 hour 2 mins 5 secs`
    #[default]
    Hms,
    /// `01:02:05`
    Colon,
    /// ` 3725 secs`
    Seconds,
}

impl FromStr for DurationFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "hms" => Ok(Self::Hms),
            "::" => Ok(Self::Colon),
            "seconds" => Ok(Self::Seconds),
            other => bail!("unknown duration format {other:?} (expected hms, :: or seconds)"),
        }
    }
}

impl fmt::Display for DurationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hms => "hms",
            Self::Colon => "::",
            Self::Seconds => "seconds",
        })
    }
}

const WORD_UNITS: [(&str, &str, u64); 4] = [
    ("day", "days", 86_400),
    ("hour", "hours", 3_600),
    ("min", "mins", 60),
    ("sec", "secs", 1),
];

/// Renders `seconds` in the requested style.
///
/// With `legacy_quirks` set, the colon and seconds styles reproduce the
/// historical output byte for byte: `::` drops the hour component unless
/// hours, minutes and seconds are all nonzero, and `seconds` pluralizes on the
/// seconds component rather than the total.
pub fn format_duration(seconds: &str, mode: DurationFormat, legacy_quirks: bool) -> String {
    let trimmed = seconds.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Some(total) = parse_seconds(trimmed) else {
        return seconds.to_string();
    };
    if total == 0 {
        return String::new();
    }

    match mode {
        DurationFormat::Hms => format_words(total),
        DurationFormat::Colon => format_colon(total, legacy_quirks),
        DurationFormat::Seconds => format_seconds(total, legacy_quirks),
    }
}

/// Whole seconds from an integer or decimal string; `None` for anything else.
fn parse_seconds(value: &str) -> Option<u64> {
    if let Ok(whole) = value.parse::<u64>() {
        return Some(whole);
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() && number >= 0.0 => Some(number.trunc() as u64),
        _ => None,
    }
}

fn format_words(total: u64) -> String {
    let mut remaining = total;
    let mut parts = Vec::new();
    for (singular, plural, size) in WORD_UNITS {
        let count = remaining / size;
        remaining %= size;
        if count == 0 {
            continue;
        }
        let unit = if count == 1 { singular } else { plural };
        parts.push(format!("{count} {unit}"));
    }
    parts.join(" ")
}

fn format_colon(total: u64, legacy_quirks: bool) -> String {
    let hours = total / 3_600;
    let mins = (total % 3_600) / 60;
    let secs = total % 60;

    if legacy_quirks {
        if hours != 0 && mins != 0 && secs != 0 {
            format!("{hours:02}:{mins:02}:{secs:02}")
        } else if mins != 0 && secs != 0 {
            format!("{mins:02}:{secs:02}")
        } else {
            format!("00:{secs:02}")
        }
    } else if hours > 0 {
        format!("{hours:02}:{mins:02}:{secs:02}")
    } else {
        format!("{mins:02}:{secs:02}")
    }
}

fn format_seconds(total: u64, legacy_quirks: bool) -> String {
    let plural = if legacy_quirks {
        total % 60 > 1
    } else {
        total != 1
    };
    let unit = if plural { "secs" } else { "sec" };
    format!(" {total} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_zero_render_nothing() {
        for mode in [DurationFormat::Hms, DurationFormat::Colon, DurationFormat::Seconds] {
            assert_eq!(format_duration("", mode, false), "");
            assert_eq!(format_duration("0", mode, true), "");
            assert_eq!(format_duration("   ", mode, false), "");
        }
    }

    #[test]
    fn non_numeric_passes_through() {
        assert_eq!(format_duration("n/a", DurationFormat::Colon, false), "n/a");
        assert_eq!(format_duration("1:05", DurationFormat::Hms, true), "1:05");
        assert_eq!(format_duration("inf", DurationFormat::Seconds, false), "inf");
    }

    #[test]
    fn colon_format_shared_cases() {
        for quirks in [false, true] {
            assert_eq!(format_duration("3725", DurationFormat::Colon, quirks), "01:02:05");
            assert_eq!(format_duration("65", DurationFormat::Colon, quirks), "01:05");
            assert_eq!(format_duration("5", DurationFormat::Colon, quirks), "00:05");
        }
    }

    #[test]
    fn colon_format_legacy_drops_hours() {
        assert_eq!(format_duration("3600", DurationFormat::Colon, true), "00:00");
        assert_eq!(format_duration("3605", DurationFormat::Colon, true), "00:05");
        assert_eq!(format_duration("120", DurationFormat::Colon, true), "00:00");
    }

    #[test]
    fn colon_format_corrected_keeps_hours() {
        assert_eq!(format_duration("3600", DurationFormat::Colon, false), "01:00:00");
        assert_eq!(format_duration("3605", DurationFormat::Colon, false), "01:00:05");
        assert_eq!(format_duration("120", DurationFormat::Colon, false), "02:00");
    }

    #[test]
    fn seconds_format_pluralization() {
        assert_eq!(format_duration("61", DurationFormat::Seconds, true), " 61 sec");
        assert_eq!(format_duration("60", DurationFormat::Seconds, true), " 60 sec");
        assert_eq!(format_duration("65", DurationFormat::Seconds, true), " 65 secs");
        assert_eq!(format_duration("61", DurationFormat::Seconds, false), " 61 secs");
        assert_eq!(format_duration("65", DurationFormat::Seconds, false), " 65 secs");
        assert_eq!(format_duration("1", DurationFormat::Seconds, false), " 1 sec");
    }

    #[test]
    fn words_format_omits_zero_components() {
        assert_eq!(format_duration("7380", DurationFormat::Hms, false), "2 hours 3 mins");
        assert_eq!(format_duration("3725", DurationFormat::Hms, false), "1 hour 2 mins 5 secs");
        assert_eq!(
            format_duration("90061", DurationFormat::Hms, false),
            "1 day 1 hour 1 min 1 sec"
        );
        assert_eq!(format_duration("42.9", DurationFormat::Hms, false), "42 secs");
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("hms".parse::<DurationFormat>().unwrap(), DurationFormat::Hms);
        assert_eq!("::".parse::<DurationFormat>().unwrap(), DurationFormat::Colon);
        assert_eq!("seconds".parse::<DurationFormat>().unwrap(), DurationFormat::Seconds);
        assert!("minutes".parse::<DurationFormat>().is_err());
        assert_eq!(DurationFormat::Colon.to_string(), "::");
    }
}
