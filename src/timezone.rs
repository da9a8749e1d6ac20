//! Camera time zone choices. The index into `TIME_ZONES` is what gets
//! persisted, so the table order must never change.

use crate::error::ConfigError;

pub const UTC_INDEX: usize = 13;

pub const TIME_ZONES: [&str; 37] = [
    "-12:00", "-11:00", "-10:00", "-09:00", "-08:00", "-07:00", "-06:00", "-05:00", "-04:00",
    "-03:30", "-03:00", "-02:00", "-01:00", "+00:00", "+01:00", "+02:00", "+03:00", "+03:30",
    "+04:00", "+04:30", "+05:00", "+05:30", "+05:45", "+06:00", "+06:30", "+07:00", "+08:00",
    "+08:45", "+09:00", "+09:30", "+10:00", "+10:30", "+11:00", "+12:00", "+12:45", "+13:00",
    "+14:00",
];

/// Parses `"+05:30"` / `"-03:00"` into seconds east of UTC.
pub fn parse_offset(text: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidValue { key: "time zone", value: text.to_string() };

    let (sign, rest) = match text.as_bytes().first() {
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i64 = hours.parse().map_err(|_| invalid())?;
    let minutes: i64 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 || minutes < 0 || hours < 0 {
        return Err(invalid());
    }
    Ok(sign * (hours * 3600 + minutes * 60))
}

pub fn format_offset(seconds: i64) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

pub fn offset_for_index(index: usize) -> Option<i64> {
    TIME_ZONES.get(index).and_then(|tz| parse_offset(tz).ok())
}

pub fn index_for_offset(seconds: i64) -> Option<usize> {
    TIME_ZONES.iter().position(|tz| parse_offset(tz).ok() == Some(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_index() {
        assert_eq!(TIME_ZONES[UTC_INDEX], "+00:00");
        assert_eq!(offset_for_index(UTC_INDEX), Some(0));
        assert_eq!(index_for_offset(0), Some(UTC_INDEX));
    }

    #[test]
    fn test_table_sorted_and_parsable() {
        let offsets: Vec<i64> = (0..TIME_ZONES.len()).map(|i| offset_for_index(i).unwrap()).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(offset_for_index(TIME_ZONES.len()), None);
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(parse_offset("+05:30").unwrap(), 19800);
        assert_eq!(parse_offset("-03:30").unwrap(), -12600);
        assert!(parse_offset("05:30").is_err());
        assert!(parse_offset("+5").is_err());
        assert!(parse_offset("+05:75").is_err());
        assert_eq!(format_offset(19800), "+05:30");
        assert_eq!(format_offset(-12600), "-03:30");
        assert_eq!(format_offset(0), "+00:00");
        assert_eq!(index_for_offset(20700), Some(22));
        assert_eq!(index_for_offset(60), None);
    }
}
