//! Environment-driven client configuration.

use chrono::{FixedOffset, NaiveDate};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::dates;
use crate::establishment::subdomain_from_host;
use crate::slots::{LastSlotRule, SlotModel};

/// Establishment timezone when none is configured (Colombia, UTC-5).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;
/// Transport timeout for ordinary calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
/// Budget for a last-slot block check before failing open.
pub const DEFAULT_LAST_SLOT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_LAST_SLOT_SERVICES: &str = "Corte,Barba";
pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PRIMARY_DOMAIN: &str = "irrelevantcalendar.com";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub subdomain: String,
    pub utc_offset: FixedOffset,
    pub request_timeout: Duration,
    pub last_slot_timeout: Duration,
    pub last_slot_services: Vec<String>,
    pub cache_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_url = get("BOOKING_API_URL").ok_or(ConfigError::Missing("BOOKING_API_URL"))?;
        let api_base_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "BOOKING_API_URL",
            reason: e.to_string(),
        })?;

        let subdomain = match get("BOOKING_SUBDOMAIN") {
            Some(subdomain) => subdomain.to_lowercase(),
            None => {
                let host = get("BOOKING_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.into());
                let primary =
                    get("BOOKING_PRIMARY_DOMAIN").unwrap_or_else(|| DEFAULT_PRIMARY_DOMAIN.into());
                subdomain_from_host(&host, &primary)
            }
        };

        let offset_hours: i32 = parse_or(
            "BOOKING_UTC_OFFSET_HOURS",
            get("BOOKING_UTC_OFFSET_HOURS"),
            DEFAULT_UTC_OFFSET_HOURS,
        )?;
        let utc_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Invalid {
                name: "BOOKING_UTC_OFFSET_HOURS",
                reason: format!("{} is out of range", offset_hours),
            })?;

        let http_secs: u64 = parse_or(
            "BOOKING_HTTP_TIMEOUT_SECS",
            get("BOOKING_HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        let last_slot_ms: u64 = parse_or(
            "BOOKING_LAST_SLOT_TIMEOUT_MS",
            get("BOOKING_LAST_SLOT_TIMEOUT_MS"),
            DEFAULT_LAST_SLOT_TIMEOUT_MS,
        )?;

        let last_slot_services: Vec<String> = get("BOOKING_LAST_SLOT_SERVICES")
            .unwrap_or_else(|| DEFAULT_LAST_SLOT_SERVICES.into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            api_base_url,
            subdomain,
            utc_offset,
            request_timeout: Duration::from_secs(http_secs),
            last_slot_timeout: Duration::from_millis(last_slot_ms),
            last_slot_services,
            cache_path: get("BOOKING_CACHE_PATH").map(PathBuf::from),
        })
    }

    /// Calendar date at the establishment right now.
    pub fn today(&self) -> NaiveDate {
        dates::establishment_today(self.utc_offset)
    }

    pub fn last_slot_rule(&self) -> LastSlotRule {
        LastSlotRule::with_services(self.last_slot_services.clone())
    }

    pub fn slot_model(&self) -> SlotModel {
        SlotModel::new(self.last_slot_rule())
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("{:?}: {}", raw, e),
        }),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::from_lookup(lookup(&[("BOOKING_API_URL", "http://api.test")])).unwrap();
        assert_eq!(cfg.subdomain, "prueba");
        assert_eq!(cfg.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(cfg.request_timeout, Duration::from_secs(15));
        assert_eq!(cfg.last_slot_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.last_slot_services, vec!["Corte", "Barba"]);
        assert_eq!(cfg.cache_path, None);
    }

    #[test]
    fn test_missing_url() {
        let err = ClientConfig::from_lookup(lookup(&[("BOOKING_API_URL", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOOKING_API_URL"));
    }

    #[test]
    fn test_subdomain_from_hostname() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("BOOKING_API_URL", "http://api.test"),
            ("BOOKING_HOSTNAME", "elite.irrelevantcalendar.com"),
        ]))
        .unwrap();
        assert_eq!(cfg.subdomain, "elite");
    }

    #[test]
    fn test_explicit_subdomain_wins() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("BOOKING_API_URL", "http://api.test"),
            ("BOOKING_SUBDOMAIN", "Centro"),
            ("BOOKING_HOSTNAME", "elite.irrelevantcalendar.com"),
        ]))
        .unwrap();
        assert_eq!(cfg.subdomain, "centro");
    }

    #[test]
    fn test_invalid_numbers() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("BOOKING_API_URL", "http://api.test"),
            ("BOOKING_LAST_SLOT_TIMEOUT_MS", "rápido"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BOOKING_LAST_SLOT_TIMEOUT_MS", .. }));

        let err = ClientConfig::from_lookup(lookup(&[
            ("BOOKING_API_URL", "http://api.test"),
            ("BOOKING_UTC_OFFSET_HOURS", "30"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BOOKING_UTC_OFFSET_HOURS", .. }));
    }

    #[test]
    fn test_custom_last_slot_services() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("BOOKING_API_URL", "http://api.test"),
            ("BOOKING_LAST_SLOT_SERVICES", " Corte , ,Cejas"),
        ]))
        .unwrap();
        assert_eq!(cfg.last_slot_rule().allowed_services, vec!["Corte", "Cejas"]);
    }
}
