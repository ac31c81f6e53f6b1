//! interval - suffixed durations used on the command line.
//!
//! Грамматика: целое число (допускается знак) + ровно один суффикс:
//!   h = час, d = сутки, w = неделя (7d), m = месяц (30d).
//! Дробные и составные значения (`1.5d`, `1d12h`) не поддерживаются.
//!
//! Значение хранится в секундах; знак сохраняется, чтобы конфигурация могла
//! отвергнуть отрицательные пороги с внятной ошибкой.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;

use crate::error::{Error, Result};

pub const SECS_PER_HOUR: i64 = 3600;
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
pub const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;
pub const SECS_PER_MONTH: i64 = 30 * SECS_PER_DAY;
/// Upper bound for any interval (~1000 years), keeps timestamp arithmetic in range.
pub const MAX_SECS: i64 = 1000 * 365 * SECS_PER_DAY;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    secs: i64,
}

impl Interval {
    pub const ZERO: Interval = Interval { secs: 0 };

    pub const fn from_secs(secs: i64) -> Self {
        Self { secs }
    }

    pub const fn hours(n: i64) -> Self {
        Self::from_secs(n * SECS_PER_HOUR)
    }

    pub const fn days(n: i64) -> Self {
        Self::from_secs(n * SECS_PER_DAY)
    }

    pub const fn weeks(n: i64) -> Self {
        Self::from_secs(n * SECS_PER_WEEK)
    }

    pub const fn months(n: i64) -> Self {
        Self::from_secs(n * SECS_PER_MONTH)
    }

    pub fn as_secs(&self) -> i64 {
        self.secs
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.secs)
    }

    pub fn is_zero(&self) -> bool {
        self.secs == 0
    }

    pub fn is_negative(&self) -> bool {
        self.secs < 0
    }

    pub fn is_positive(&self) -> bool {
        self.secs > 0
    }

    /// Parse `<int><h|d|w|m>`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let suffix = s
            .chars()
            .last()
            .ok_or_else(|| Error::config("empty interval"))?;
        let unit = match suffix {
            'h' => SECS_PER_HOUR,
            'd' => SECS_PER_DAY,
            'w' => SECS_PER_WEEK,
            'm' => SECS_PER_MONTH,
            other => {
                return Err(Error::config(format!(
                    "unsupported interval suffix '{}' in \"{}\" (expected h, d, w or m)",
                    other, s
                )))
            }
        };
        let digits = &s[..s.len() - suffix.len_utf8()];
        let n: i64 = digits
            .parse()
            .map_err(|_| Error::config(format!("interval must be a number: \"{}\"", s)))?;
        let secs = n
            .checked_mul(unit)
            .filter(|v| v.abs() <= MAX_SECS)
            .ok_or_else(|| Error::config(format!("interval out of range: \"{}\"", s)))?;
        Ok(Self { secs })
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Canonical form: the largest of w/d/h that divides the value exactly.
/// Months are printed as days since `1m` and `30d` are the same value.
impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.secs;
        if s != 0 && s % SECS_PER_WEEK == 0 {
            write!(f, "{}w", s / SECS_PER_WEEK)
        } else if s % SECS_PER_DAY == 0 {
            write!(f, "{}d", s / SECS_PER_DAY)
        } else if s % SECS_PER_HOUR == 0 {
            write!(f, "{}h", s / SECS_PER_HOUR)
        } else {
            write!(f, "{}s", s)
        }
    }
}

/// Human form of an elapsed time, e.g. `3d 04h12m`.
pub fn format_age(d: Duration) -> String {
    let secs = d.num_seconds();
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.abs();
    format!(
        "{}{}d {:02}h{:02}m",
        sign,
        secs / SECS_PER_DAY,
        (secs % SECS_PER_DAY) / SECS_PER_HOUR,
        (secs % SECS_PER_HOUR) / 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_suffix() {
        assert_eq!(Interval::parse("4h").unwrap(), Interval::hours(4));
        assert_eq!(Interval::parse("1d").unwrap(), Interval::days(1));
        assert_eq!(Interval::parse("2w").unwrap(), Interval::days(14));
        assert_eq!(Interval::parse("3m").unwrap(), Interval::days(90));
        assert_eq!(Interval::parse(" 0d ").unwrap(), Interval::ZERO);
        assert_eq!(Interval::parse("-1d").unwrap().as_secs(), -SECS_PER_DAY);
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "", "d", "1", "1x", "1.5d", "1d12h", "abc", "1 d", "99999999999999999w", "20000m",
        ] {
            let err = Interval::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfiguration(_)),
                "{bad:?} must be rejected as configuration error, got {err:?}"
            );
        }
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Interval::weeks(2).to_string(), "2w");
        assert_eq!(Interval::months(1).to_string(), "30d");
        assert_eq!(Interval::hours(36).to_string(), "36h");
        assert_eq!(Interval::ZERO.to_string(), "0d");
    }

    #[test]
    fn age_is_human_readable() {
        assert_eq!(format_age(Duration::hours(76) + Duration::minutes(12)), "3d 04h12m");
        assert_eq!(format_age(Duration::zero()), "0d 00h00m");
        assert_eq!(format_age(Duration::minutes(-90)), "-0d 01h30m");
    }

    #[test]
    fn ordering_follows_length() {
        assert!(Interval::weeks(1) < Interval::months(1));
        assert!(Interval::hours(23) < Interval::days(1));
        assert_eq!(Interval::days(7).as_duration(), Duration::weeks(1));
    }
}
