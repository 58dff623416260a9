use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::ClockTime;
use crate::error::ApiError;

/// Date format used on the wire (`week_start`, `date`).
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

// ── Domain ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barber {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub price: i64,
    /// Whether the backend allows this service in the last slot of a day.
    /// Absent on backends that leave the rule to client configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_slot: Option<bool>,
}

/// A bookable range within a barber's working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: ClockTime,
    pub end: ClockTime,
    pub occupied: bool,
}

/// One day of a barber's availability. `free_intervals` keeps backend order,
/// which is chronological; its last element is the day's final slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub barber: String,
    pub free_intervals: Vec<TimeInterval>,
}

// ── API request types ──

#[derive(Debug, Serialize)]
pub struct SubdomainRequest<'a> {
    pub subdomain: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ScheduleRequest<'a> {
    pub barber: &'a str,
    pub week_start: String,
    pub subdomain: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LastSlotStatusRequest<'a> {
    pub barber: &'a str,
    pub date: String,
    pub subdomain: &'a str,
}

/// Structured body of the `appointment` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    /// Natural-language form of the same booking, kept for the transcript.
    pub prompt: String,
    pub barber: String,
    pub date: String,
    pub time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub client_name: String,
    pub phone: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub subdomain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelRequest {
    pub prompt: String,
    pub subdomain: String,
}

// ── API response types ──

#[derive(Debug, Deserialize)]
pub struct BarbersResponse {
    #[serde(default)]
    pub barbers: Option<Vec<Barber>>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub schedule: BTreeMap<String, RawDay>,
}

#[derive(Debug, Deserialize)]
pub struct RawDay {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub barber: Option<String>,
    #[serde(default)]
    pub free_intervals: Vec<RawInterval>,
}

#[derive(Debug, Deserialize)]
pub struct RawInterval {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub occupied: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServicesResponse {
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Deserialize)]
pub struct LastSlotStatusResponse {
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppointmentResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub establishment_name: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default, rename = "emailSent")]
    pub email_sent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EstablishmentInfo {
    #[serde(default)]
    pub establishment_name: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

// ── Ingestion ──

impl RawInterval {
    /// The backend marks unavailability either with `occupied: true` or with
    /// `status: "occupied"`.
    pub fn is_occupied(&self) -> bool {
        self.occupied.unwrap_or(false)
            || self
                .status
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case("occupied"))
    }

    pub fn normalize(&self) -> Result<TimeInterval, ApiError> {
        let start: ClockTime = self
            .start
            .parse()
            .map_err(|e| ApiError::Decode(format!("interval start: {}", e)))?;
        let end: ClockTime = self
            .end
            .parse()
            .map_err(|e| ApiError::Decode(format!("interval end: {}", e)))?;
        if start >= end {
            return Err(ApiError::Decode(format!(
                "interval {}-{} does not end after it starts",
                start, end
            )));
        }
        Ok(TimeInterval {
            start,
            end,
            occupied: self.is_occupied(),
        })
    }
}

impl ScheduleResponse {
    /// Normalize into days sorted by date. Days that omit `barber` are
    /// attributed to the barber the week was requested for.
    pub fn into_days(self, barber: &str) -> Result<Vec<DaySchedule>, ApiError> {
        let mut days = Vec::with_capacity(self.schedule.len());

        for (key, raw) in self.schedule {
            let date_str = raw.date.as_deref().unwrap_or(&key);
            let date = NaiveDate::parse_from_str(date_str, WIRE_DATE_FORMAT)
                .map_err(|_| ApiError::Decode(format!("invalid schedule date {:?}", date_str)))?;

            let free_intervals = raw
                .free_intervals
                .iter()
                .map(RawInterval::normalize)
                .collect::<Result<Vec<_>, _>>()?;

            let barber = raw
                .barber
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| barber.to_string());

            days.push(DaySchedule {
                date,
                barber,
                free_intervals,
            });
        }

        days.sort_by_key(|day| day.date);
        Ok(days)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(start: &str, end: &str) -> RawInterval {
        RawInterval {
            start: start.to_string(),
            end: end.to_string(),
            occupied: None,
            status: None,
        }
    }

    #[test]
    fn test_occupied_flag() {
        let mut interval = raw("09:00", "10:00");
        assert!(!interval.is_occupied());
        interval.occupied = Some(true);
        assert!(interval.is_occupied());
    }

    #[test]
    fn test_occupied_status_string() {
        let mut interval = raw("09:00", "10:00");
        interval.status = Some("Occupied".into());
        assert!(interval.normalize().unwrap().occupied);
    }

    #[test]
    fn test_free_status_string() {
        let mut interval = raw("09:00", "10:00");
        interval.status = Some("free".into());
        assert!(!interval.normalize().unwrap().occupied);
    }

    #[test]
    fn test_normalize_rejects_inverted() {
        assert!(raw("10:00", "09:00").normalize().is_err());
        assert!(raw("10:00", "10:00").normalize().is_err());
    }

    #[test]
    fn test_normalize_rejects_bad_time() {
        assert!(raw("nine", "10:00").normalize().is_err());
    }

    #[test]
    fn test_schedule_into_days_sorted_and_attributed() {
        let json = serde_json::json!({
            "schedule": {
                "Tuesday": {
                    "date": "2026-10-20",
                    "free_intervals": [{"start": "09:00", "end": "10:00"}]
                },
                "2026-10-19": {
                    "barber": "Juan",
                    "free_intervals": [
                        {"start": "09:00", "end": "10:00", "occupied": true},
                        {"start": "10:00", "end": "11:00", "status": "occupied"},
                        {"start": "11:00", "end": "12:00"}
                    ]
                }
            }
        });
        let response: ScheduleResponse = serde_json::from_value(json).unwrap();
        let days = response.into_days("Diego").unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date.to_string(), "2026-10-19");
        assert_eq!(days[0].barber, "Juan");
        assert_eq!(days[0].free_intervals.len(), 3);
        assert!(days[0].free_intervals[0].occupied);
        assert!(days[0].free_intervals[1].occupied);
        assert!(!days[0].free_intervals[2].occupied);
        assert_eq!(days[1].barber, "Diego");
    }

    #[test]
    fn test_schedule_invalid_date() {
        let json = serde_json::json!({"schedule": {"Monday": {"free_intervals": []}}});
        let response: ScheduleResponse = serde_json::from_value(json).unwrap();
        assert!(response.into_days("Diego").is_err());
    }

    #[test]
    fn test_appointment_request_camel_case() {
        let request = AppointmentRequest {
            prompt: "p".into(),
            barber: "Diego".into(),
            date: "2026-10-19".into(),
            time: "18:45".into(),
            end_time: "19:45".into(),
            duration_minutes: 45,
            client_name: "Ana".into(),
            phone: "3001234567".into(),
            service: "Corte".into(),
            email: None,
            subdomain: "prueba".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["clientName"], "Ana");
        assert_eq!(value["endTime"], "19:45");
        assert_eq!(value["durationMinutes"], 45);
        assert!(value.get("email").is_none());
    }
}
