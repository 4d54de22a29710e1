use anyhow::{anyhow, Result};
use cadence_core::models::IntervalUnit;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parses an absolute or natural-language date, interpreting wall-clock times in `timezone`.
///
/// Accepts RFC 3339, `YYYY-MM-DD[ HH:MM]`, and phrases such as "tomorrow 9am" or
/// "next friday".
pub fn parse_date(input: &str, now: DateTime<Utc>, timezone: &Tz) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let local = DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });
    if let Some(local) = local {
        return timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("'{}' does not exist in {}", input, timezone));
    }

    parse_date_string(input, now.with_timezone(timezone), Dialect::Us)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses an interval like `3d`, `2 weeks`, `6h` or a shortcut like `weekly`.
///
/// The amount is returned signed; negative amounts are rejected by the engine's
/// pattern validation.
pub fn parse_interval(input: &str) -> Result<(i64, IntervalUnit)> {
    let input = input.trim().to_lowercase();

    let shortcut = match input.as_str() {
        "once" => Some((0, IntervalUnit::Days)),
        "hourly" => Some((1, IntervalUnit::Hours)),
        "daily" => Some((1, IntervalUnit::Days)),
        "weekly" => Some((1, IntervalUnit::Weeks)),
        "biweekly" | "fortnightly" => Some((2, IntervalUnit::Weeks)),
        "monthly" => Some((1, IntervalUnit::Months)),
        "quarterly" => Some((3, IntervalUnit::Months)),
        "yearly" | "annually" => Some((12, IntervalUnit::Months)),
        _ => None,
    };
    if let Some(interval) = shortcut {
        return Ok(interval);
    }

    let split = input
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let (amount, unit) = input.split_at(split);

    let amount: i64 = amount
        .parse()
        .map_err(|_| anyhow!("Invalid interval '{}': expected a number such as '3d'", input))?;
    let unit: IntervalUnit = unit
        .trim()
        .parse()
        .map_err(|_| {
            anyhow!("Invalid interval '{}': unit must be hours, days, weeks or months", input)
        })?;

    Ok((amount, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_absolute_dates() {
        assert_eq!(
            parse_date("2024-02-01", now(), &Tz::UTC).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("2024-02-01 09:30", now(), &Tz::UTC).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_date("2024-02-01T09:30:00+02:00", now(), &Tz::UTC).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 7, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_local_times_use_timezone() {
        // Tokyo is nine hours ahead of UTC
        assert_eq!(
            parse_date("2024-02-01 09:00", now(), &chrono_tz::Asia::Tokyo).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_natural_language() {
        let tomorrow = parse_date("tomorrow", now(), &Tz::UTC).unwrap();
        assert_eq!(tomorrow.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
    }

    #[test]
    fn test_parse_garbage_date() {
        assert!(parse_date("not a date at all", now(), &Tz::UTC).is_err());
    }

    #[test]
    fn test_parse_intervals() {
        assert_eq!(parse_interval("3d").unwrap(), (3, IntervalUnit::Days));
        assert_eq!(parse_interval("2 weeks").unwrap(), (2, IntervalUnit::Weeks));
        assert_eq!(parse_interval("6H").unwrap(), (6, IntervalUnit::Hours));
        assert_eq!(parse_interval("1m").unwrap(), (1, IntervalUnit::Months));
        assert_eq!(parse_interval("weekly").unwrap(), (1, IntervalUnit::Weeks));
        assert_eq!(parse_interval("once").unwrap(), (0, IntervalUnit::Days));
        assert_eq!(parse_interval("-1d").unwrap(), (-1, IntervalUnit::Days));
    }

    #[test]
    fn test_parse_invalid_intervals() {
        assert!(parse_interval("d").is_err());
        assert!(parse_interval("3").is_err());
        assert!(parse_interval("3 fortnights").is_err());
    }
}
