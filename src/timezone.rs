use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Display timezone: the machine-local clock or a named IANA zone. Alarm
/// matching always runs against the machine-local clock; this only shifts
/// what the faces and voice announcements show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockZone {
    Local,
    Named(Tz),
}

impl ClockZone {
    /// Accepts `"Local"` (any casing) or an IANA zone name.
    pub fn parse(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
            return Some(ClockZone::Local);
        }
        trimmed.parse::<Tz>().ok().map(ClockZone::Named)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ClockZone::Local)
    }

    /// Wall-clock time of `utc` in this zone.
    pub fn wall_time(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            ClockZone::Local => utc.with_timezone(&Local).naive_local(),
            ClockZone::Named(tz) => utc.with_timezone(tz).naive_local(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClockZone::Local => "Local",
            ClockZone::Named(tz) => tz.name(),
        }
    }
}

impl Default for ClockZone {
    fn default() -> Self {
        ClockZone::Local
    }
}

impl fmt::Display for ClockZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    #[test]
    fn parses_local_and_iana_names() {
        assert_eq!(ClockZone::parse("Local"), Some(ClockZone::Local));
        assert_eq!(ClockZone::parse("local"), Some(ClockZone::Local));
        assert_eq!(ClockZone::parse(""), Some(ClockZone::Local));
        assert_eq!(
            ClockZone::parse("America/New_York"),
            Some(ClockZone::Named(chrono_tz::America::New_York))
        );
        assert_eq!(ClockZone::parse("Not/A_Zone"), None);
    }

    #[test]
    fn projects_utc_into_named_zone() {
        let zone = ClockZone::parse("Asia/Tokyo").expect("valid zone");
        let utc = Utc.with_ymd_and_hms(2026, 1, 5, 3, 30, 0).single().expect("valid");
        let wall = zone.wall_time(utc);
        assert_eq!((wall.hour(), wall.minute()), (12, 30));
    }

    #[test]
    fn named_zone_reports_its_name() {
        let zone = ClockZone::parse("Europe/Berlin").expect("valid zone");
        assert_eq!(zone.name(), "Europe/Berlin");
        assert_eq!(ClockZone::Local.name(), "Local");
    }
}
