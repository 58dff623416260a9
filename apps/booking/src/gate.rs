//! Dynamic block check for the last slot of a day.
//!
//! A day's last slot can be held after the weekly payload was generated, so
//! before it becomes selectable the backend is asked whether it is blocked.
//! Checks are cached per (barber, date) for the lifetime of one loaded week;
//! concurrent callers for the same pair share a single request.

use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use crate::api::BookingApi;
use crate::models::DaySchedule;
use crate::slots::BlockStatus;

type CheckMap = DashMap<(String, NaiveDate), Arc<OnceCell<bool>>>;

pub struct LastSlotGate {
    api: Arc<dyn BookingApi>,
    subdomain: String,
    timeout: Duration,
    checks: CheckMap,
}

impl LastSlotGate {
    pub fn new(api: Arc<dyn BookingApi>, subdomain: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api,
            subdomain: subdomain.into(),
            timeout,
            checks: DashMap::new(),
        }
    }

    /// Resolve whether the last slot of `barber` on `date` is blocked.
    ///
    /// Never fails: a transport error, a backend error or the timeout
    /// elapsing all resolve to "not blocked".
    pub async fn check(&self, barber: &str, date: NaiveDate) -> bool {
        if barber.trim().is_empty() {
            tracing::warn!("last_slot_status: skipped check without barber for {}", date);
            return false;
        }

        let cell = self.cell(barber, date);
        *cell.get_or_init(|| self.fetch(barber, date)).await
    }

    fn cell(&self, barber: &str, date: NaiveDate) -> Arc<OnceCell<bool>> {
        let entry = self
            .checks
            .entry((barber.to_string(), date))
            .or_insert_with(|| Arc::new(OnceCell::new()));
        Arc::clone(entry.value())
    }

    async fn fetch(&self, barber: &str, date: NaiveDate) -> bool {
        let call = self.api.last_slot_status(barber, date, &self.subdomain);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(blocked)) => {
                tracing::debug!("last_slot_status: {} {} blocked={}", barber, date, blocked);
                blocked
            }
            Ok(Err(e)) => {
                tracing::warn!("last_slot_status: {} {} failed open: {}", barber, date, e);
                false
            }
            Err(_) => {
                tracing::warn!(
                    "last_slot_status: {} {} timed out after {:?}, failing open",
                    barber,
                    date,
                    self.timeout
                );
                false
            }
        }
    }

    pub fn status(&self, barber: &str, date: NaiveDate) -> BlockStatus {
        match self.checks.get(&(barber.to_string(), date)) {
            None => BlockStatus::NotChecked,
            Some(cell) => match cell.get() {
                None => BlockStatus::Loading,
                Some(&blocked) => BlockStatus::Resolved { blocked },
            },
        }
    }

    /// Only a free last slot triggers a check.
    pub fn needs_check(day: &DaySchedule) -> bool {
        day.free_intervals.last().is_some_and(|last| !last.occupied)
    }

    /// Start a check for every visible day without waiting. Each checked day
    /// reports `Loading` as soon as this returns. Dropping the set aborts
    /// whatever is still running.
    pub fn spawn_checks(self: &Arc<Self>, days: &[DaySchedule]) -> JoinSet<bool> {
        let mut set = JoinSet::new();
        for day in days.iter().filter(|d| Self::needs_check(d)) {
            if day.barber.trim().is_empty() {
                continue;
            }
            // Registered up front so the day reads as loading immediately
            self.cell(&day.barber, day.date);
            let gate = Arc::clone(self);
            let barber = day.barber.clone();
            let date = day.date;
            set.spawn(async move { gate.check(&barber, date).await });
        }
        set
    }

    /// Forget all results. Called whenever a new week replaces the view.
    pub fn reset(&self) {
        self.checks.clear();
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::{date, make_day, StubApi};

    fn make_gate(api: StubApi, timeout: Duration) -> (Arc<StubApi>, Arc<LastSlotGate>) {
        let api = Arc::new(api);
        let gate = Arc::new(LastSlotGate::new(api.clone(), "prueba", timeout));
        (api, gate)
    }

    #[tokio::test]
    async fn test_resolves_backend_value() {
        let (_, gate) = make_gate(
            StubApi {
                blocked: Ok(true),
                ..Default::default()
            },
            Duration::from_secs(1),
        );
        let day = date("2026-10-19");
        assert_eq!(gate.status("Diego", day), BlockStatus::NotChecked);
        assert!(gate.check("Diego", day).await);
        assert_eq!(gate.status("Diego", day), BlockStatus::Resolved { blocked: true });
    }

    #[tokio::test]
    async fn test_error_fails_open() {
        let (_, gate) = make_gate(
            StubApi {
                blocked: Err(ApiError::Transport("refused".into())),
                ..Default::default()
            },
            Duration::from_secs(1),
        );
        let day = date("2026-10-19");
        assert!(!gate.check("Diego", day).await);
        assert_eq!(gate.status("Diego", day), BlockStatus::Resolved { blocked: false });
    }

    #[tokio::test]
    async fn test_timeout_fails_open() {
        let (_, gate) = make_gate(
            StubApi {
                blocked: Ok(true),
                last_slot_delay: Duration::from_secs(10),
                ..Default::default()
            },
            Duration::from_millis(100),
        );
        assert!(!gate.check("Diego", date("2026-10-19")).await);
    }

    #[tokio::test]
    async fn test_duplicate_checks_share_request() {
        let (api, gate) = make_gate(StubApi::default(), Duration::from_secs(1));
        let day = date("2026-10-20");
        let (a, b) = tokio::join!(gate.check("Diego", day), gate.check("Diego", day));
        assert!(!a && !b);
        gate.check("Diego", day).await;
        assert_eq!(api.calls_to("last_slot_status"), 1);
    }

    #[tokio::test]
    async fn test_reset_forgets_results() {
        let (api, gate) = make_gate(StubApi::default(), Duration::from_secs(1));
        let day = date("2026-10-20");
        gate.check("Diego", day).await;
        gate.reset();
        assert_eq!(gate.status("Diego", day), BlockStatus::NotChecked);
        gate.check("Diego", day).await;
        assert_eq!(api.calls_to("last_slot_status"), 2);
    }

    #[tokio::test]
    async fn test_empty_barber_never_calls() {
        let (api, gate) = make_gate(StubApi::default(), Duration::from_secs(1));
        assert!(!gate.check("  ", date("2026-10-20")).await);
        assert_eq!(api.calls_to("last_slot_status"), 0);
    }

    #[tokio::test]
    async fn test_spawn_checks_skips_occupied_and_empty() {
        let (api, gate) = make_gate(StubApi::default(), Duration::from_secs(1));
        let free = make_day(date("2026-10-19"), 9, 20);
        let mut occupied = make_day(date("2026-10-20"), 9, 20);
        if let Some(last) = occupied.free_intervals.last_mut() {
            last.occupied = true;
        }
        let empty = make_day(date("2026-10-21"), 9, 9);

        let mut set = gate.spawn_checks(&[free.clone(), occupied.clone(), empty]);
        assert_eq!(set.len(), 1);
        while set.join_next().await.is_some() {}

        assert_eq!(api.calls_to("last_slot_status"), 1);
        assert_eq!(
            gate.status("Diego", free.date),
            BlockStatus::Resolved { blocked: false }
        );
        assert_eq!(gate.status("Diego", occupied.date), BlockStatus::NotChecked);
    }

    #[tokio::test]
    async fn test_spawned_checks_report_loading_until_resolved() {
        let (_, gate) = make_gate(
            StubApi {
                last_slot_delay: Duration::from_millis(300),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        let day = make_day(date("2026-10-19"), 9, 20);

        let mut set = gate.spawn_checks(std::slice::from_ref(&day));
        assert_eq!(gate.status("Diego", day.date), BlockStatus::Loading);

        while set.join_next().await.is_some() {}
        assert_eq!(
            gate.status("Diego", day.date),
            BlockStatus::Resolved { blocked: false }
        );
    }
}
