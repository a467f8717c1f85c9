//! ISO-8601 duration parsing for state timeouts.
//!
//! Supports the designator form (`P1DT2H30M`, `P2W`). Calendar units use
//! fixed lengths: a year is 365 days, a month 30 -- state timeouts are
//! coarse deadlines, not calendar arithmetic.

use time::Duration;

use crate::error::ModelError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Parse an ISO-8601 duration string into a [`time::Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, ModelError> {
    let invalid = |message: &str| ModelError::InvalidDuration {
        value: input.to_string(),
        message: message.to_string(),
    };

    let rest = input
        .trim()
        .strip_prefix('P')
        .ok_or_else(|| invalid("must start with 'P'"))?;

    let mut seconds: i64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            'T' => {
                if in_time || !digits.is_empty() {
                    return Err(invalid("misplaced 'T' designator"));
                }
                in_time = true;
            }
            '0'..='9' => digits.push(c),
            'W' | 'Y' | 'M' | 'D' | 'H' | 'S' => {
                let count: i64 = digits
                    .parse()
                    .map_err(|_| invalid("designator without a number"))?;
                digits.clear();
                saw_component = true;
                let unit = match (c, in_time) {
                    ('W', false) => 7 * SECONDS_PER_DAY,
                    ('Y', false) => 365 * SECONDS_PER_DAY,
                    ('M', false) => 30 * SECONDS_PER_DAY,
                    ('D', false) => SECONDS_PER_DAY,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return Err(invalid("designator on the wrong side of 'T'")),
                };
                seconds = seconds
                    .checked_add(count.saturating_mul(unit))
                    .ok_or_else(|| invalid("duration overflows"))?;
            }
            _ => return Err(invalid("unexpected character")),
        }
    }

    if !digits.is_empty() {
        return Err(invalid("trailing number without a designator"));
    }
    if !saw_component {
        return Err(invalid("no duration components"));
    }
    Ok(Duration::seconds(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_and_time_components() {
        assert_eq!(
            parse_duration("P1DT2H30M").unwrap(),
            Duration::seconds(86_400 + 2 * 3_600 + 30 * 60)
        );
    }

    #[test]
    fn parses_weeks() {
        assert_eq!(parse_duration("P2W").unwrap(), Duration::days(14));
    }

    #[test]
    fn parses_time_only() {
        assert_eq!(parse_duration("PT45S").unwrap(), Duration::seconds(45));
    }

    #[test]
    fn distinguishes_months_from_minutes() {
        assert_eq!(parse_duration("P1M").unwrap(), Duration::days(30));
        assert_eq!(parse_duration("PT1M").unwrap(), Duration::minutes(1));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_duration("1D").is_err());
        assert!(parse_duration("P").is_err());
        assert!(parse_duration("P1H").is_err());
        assert!(parse_duration("PT1D").is_err());
        assert!(parse_duration("P1D2").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
