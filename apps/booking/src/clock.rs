//! Wall-clock times for slot arithmetic.
//!
//! Backend payloads carry times as `"HH:MM"` strings. They are parsed once at
//! the ingestion boundary into [`ClockTime`], which stores minutes since
//! midnight and wraps every shift at the day boundary.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minutes in a calendar day. All shifts are taken modulo this value.
pub const MINUTES_PER_DAY: i32 = 1440;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day: {0:?}")]
pub struct ClockParseError(pub String);

/// A time of day (24h) with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    /// Build from a minute count, wrapping into `0..1440`.
    pub fn from_minutes(minutes: i32) -> Self {
        Self(minutes.rem_euclid(MINUTES_PER_DAY) as u16)
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0) / 60
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0) % 60
    }

    pub fn minutes_since_midnight(self) -> i32 {
        i32::from(self.0)
    }

    /// Shift by `delta` minutes (negative moves earlier), wrapping at midnight.
    pub fn shifted(self, delta: i32) -> Self {
        Self::from_minutes(self.minutes_since_midnight() + delta)
    }

    /// 12-hour display with AM/PM suffix, e.g. `6:45 PM`.
    pub fn to_12h(self) -> String {
        let hour = self.hour();
        let suffix = if hour >= 12 { "PM" } else { "AM" };
        let hour12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", hour12, self.minute(), suffix)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ClockParseError;

    /// Accepts `H:MM`, `HH:MM` and `HH:MM:SS` (seconds are dropped).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockParseError(s.to_string());
        let mut parts = s.trim().split(':');

        let hour = parts.next().and_then(parse_field).ok_or_else(err)?;
        let minute = parts
            .next()
            .filter(|m| m.len() == 2)
            .and_then(parse_field)
            .ok_or_else(err)?;

        if let Some(seconds) = parts.next() {
            let valid = seconds.len() == 2 && parse_field(seconds).is_some_and(|s| s < 60);
            if !valid {
                return Err(err());
            }
        }
        if parts.next().is_some() {
            return Err(err());
        }

        Self::new(hour, minute).ok_or_else(err)
    }
}

fn parse_field(field: &str) -> Option<u32> {
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// ── Tests ──
