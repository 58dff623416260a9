//! In-memory `BookingApi` for unit tests.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::BookingApi;
use crate::error::ApiError;
use crate::models::*;

pub struct StubApi {
    pub barbers: Result<Vec<Barber>, ApiError>,
    pub schedule: Result<Vec<DaySchedule>, ApiError>,
    /// Answer every week fetch with seven open days from the requested
    /// Monday instead of `schedule`.
    pub weekly: bool,
    /// Extra latency for the fetch of one specific week.
    pub slow_week: Option<(NaiveDate, Duration)>,
    pub services: Result<Vec<Service>, ApiError>,
    pub blocked: Result<bool, ApiError>,
    pub last_slot_delay: Duration,
    pub appointment: Result<AppointmentResponse, ApiError>,
    pub cancellation: Result<CancelResponse, ApiError>,
    pub info: Result<EstablishmentInfo, ApiError>,
    pub calls: Mutex<Vec<String>>,
    pub booked: Mutex<Vec<AppointmentRequest>>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self {
            barbers: Ok(vec![make_barber("Diego"), make_barber("Juan")]),
            schedule: Ok(Vec::new()),
            weekly: false,
            slow_week: None,
            services: Ok(vec![
                make_service("Corte"),
                make_service("Barba"),
                make_service("Corte y Barba"),
            ]),
            blocked: Ok(false),
            last_slot_delay: Duration::ZERO,
            appointment: Ok(AppointmentResponse {
                response: "Cita agendada".into(),
                ..Default::default()
            }),
            cancellation: Ok(CancelResponse {
                response: "Cita cancelada".into(),
            }),
            info: Ok(EstablishmentInfo::default()),
            calls: Mutex::new(Vec::new()),
            booked: Mutex::new(Vec::new()),
        }
    }
}

impl StubApi {
    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == endpoint).count()
    }

    fn record(&self, endpoint: &str) {
        self.calls.lock().unwrap().push(endpoint.to_string());
    }
}

pub fn make_barber(name: &str) -> Barber {
    Barber { name: name.into() }
}

pub fn make_service(name: &str) -> Service {
    Service {
        name: name.into(),
        price: 25000,
        last_slot: None,
    }
}

/// Hourly free intervals from `first_hour` until `last_hour`.
pub fn make_day(date: NaiveDate, first_hour: u32, last_hour: u32) -> DaySchedule {
    let free_intervals = (first_hour..last_hour)
        .filter_map(|h| {
            Some(TimeInterval {
                start: crate::clock::ClockTime::new(h, 0)?,
                end: crate::clock::ClockTime::new(h + 1, 0)?,
                occupied: false,
            })
        })
        .collect();
    DaySchedule {
        date,
        barber: "Diego".into(),
        free_intervals,
    }
}

/// Seven consecutive open days from `start`.
pub fn make_week(start: NaiveDate) -> Vec<DaySchedule> {
    (0..7)
        .filter_map(|i| start.checked_add_days(Days::new(i)))
        .map(|d| make_day(d, 9, 20))
        .collect()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, WIRE_DATE_FORMAT).unwrap()
}

#[async_trait]
impl BookingApi for StubApi {
    async fn barbers(&self, _subdomain: &str) -> Result<Vec<Barber>, ApiError> {
        self.record("barbers");
        self.barbers.clone()
    }

    async fn week_schedule(
        &self,
        _barber: &str,
        week_start: NaiveDate,
        _subdomain: &str,
    ) -> Result<Vec<DaySchedule>, ApiError> {
        self.record("barber_schedule");
        if let Some((slow, delay)) = self.slow_week {
            if slow == week_start {
                tokio::time::sleep(delay).await;
            }
        }
        if self.weekly {
            return Ok(make_week(week_start));
        }
        self.schedule.clone()
    }

    async fn services(&self, _subdomain: &str) -> Result<Vec<Service>, ApiError> {
        self.record("services");
        self.services.clone()
    }

    async fn last_slot_status(
        &self,
        _barber: &str,
        _date: NaiveDate,
        _subdomain: &str,
    ) -> Result<bool, ApiError> {
        self.record("last_slot_status");
        if !self.last_slot_delay.is_zero() {
            tokio::time::sleep(self.last_slot_delay).await;
        }
        self.blocked.clone()
    }

    async fn book(&self, request: &AppointmentRequest) -> Result<AppointmentResponse, ApiError> {
        self.record("appointment");
        self.booked.lock().unwrap().push(request.clone());
        self.appointment.clone()
    }

    async fn cancel(&self, _request: &CancelRequest) -> Result<CancelResponse, ApiError> {
        self.record("cancel");
        self.cancellation.clone()
    }

    async fn establishment_info(&self, _subdomain: &str) -> Result<EstablishmentInfo, ApiError> {
        self.record("establishment-info");
        self.info.clone()
    }
}
