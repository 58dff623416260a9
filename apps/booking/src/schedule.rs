//! Barber selection and week-by-week browsing of availability.

use chrono::{Days, NaiveDate};

use crate::dates;
use crate::error::ApiError;
use crate::models::{Barber, DaySchedule, TimeInterval};
use crate::slots::{is_slot_selectable, BlockStatus, BookableSlot, SlotModel, SlotView};

pub const MSG_BARBERS_FAILED: &str =
    "No pudimos cargar la lista de barberos. Por favor, intenta de nuevo.";
pub const MSG_SCHEDULE_FAILED: &str = "No pudimos cargar el horario. Por favor, intenta de nuevo.";
pub const MSG_NO_AVAILABLE_DAYS: &str = "No hay días disponibles en esta semana.";

/// Days strictly before `today` are hidden. Today stays visible even if some
/// of its intervals already elapsed.
pub fn filter_visible_days(days: Vec<DaySchedule>, today: NaiveDate) -> Vec<DaySchedule> {
    days.into_iter().filter(|day| day.date >= today).collect()
}

// ── Browser ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserState {
    NoBarberSelected,
    BarberChosen {
        barber: String,
    },
    Loading {
        barber: String,
        week_start: NaiveDate,
    },
    Ready {
        barber: String,
        week_start: NaiveDate,
        days: Vec<DaySchedule>,
    },
    /// The fetch succeeded but every returned day is in the past (or the
    /// week is empty). Not an error.
    NoAvailableDays {
        barber: String,
        week_start: NaiveDate,
    },
    Error {
        barber: String,
        week_start: NaiveDate,
        message: String,
    },
    /// The view was dismissed; late responses are ignored.
    Closed,
}

/// A week fetch the caller must perform and hand back to [`ScheduleBrowser::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRequest {
    pub seq: u64,
    pub barber: String,
    pub week_start: NaiveDate,
}

/// Handoff from a slot tap to the selection form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSeed {
    pub barber: String,
    pub date: NaiveDate,
    pub interval: TimeInterval,
    pub slot: BookableSlot,
}

pub struct ScheduleBrowser {
    model: SlotModel,
    today: NaiveDate,
    barber: Option<String>,
    week_start: NaiveDate,
    state: BrowserState,
    /// Sequence number of the latest issued request. Responses carrying any
    /// other number are stale.
    latest_seq: u64,
}

impl ScheduleBrowser {
    pub fn new(model: SlotModel, today: NaiveDate) -> Self {
        Self {
            model,
            today,
            barber: None,
            week_start: dates::week_start_for(today),
            state: BrowserState::NoBarberSelected,
            latest_seq: 0,
        }
    }

    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    pub fn model(&self) -> &SlotModel {
        &self.model
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn barber(&self) -> Option<&str> {
        self.barber.as_deref()
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn week_label(&self) -> String {
        dates::week_range_label(self.week_start)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, BrowserState::Loading { .. })
    }

    /// Choose a barber. The anchor returns to the current week and any
    /// in-flight fetch for the previous barber becomes stale.
    pub fn select_barber(&mut self, barber: impl Into<String>) {
        let barber = barber.into();
        self.latest_seq += 1;
        self.week_start = dates::week_start_for(self.today);
        self.barber = Some(barber.clone());
        self.state = BrowserState::BarberChosen { barber };
    }

    /// Enter `Loading` for the anchored week. `None` without a barber or
    /// after the view was closed.
    pub fn request_week(&mut self) -> Option<WeekRequest> {
        if self.state == BrowserState::Closed {
            return None;
        }
        let barber = self.barber.clone()?;
        self.latest_seq += 1;
        self.state = BrowserState::Loading {
            barber: barber.clone(),
            week_start: self.week_start,
        };
        Some(WeekRequest {
            seq: self.latest_seq,
            barber,
            week_start: self.week_start,
        })
    }

    pub fn previous_week(&mut self) -> Option<WeekRequest> {
        self.navigate(|start| start.checked_sub_days(Days::new(7)))
    }

    pub fn next_week(&mut self) -> Option<WeekRequest> {
        self.navigate(|start| start.checked_add_days(Days::new(7)))
    }

    /// Back to the Monday of the current calendar week.
    pub fn current_week(&mut self) -> Option<WeekRequest> {
        let today = dates::week_start_for(self.today);
        self.navigate(|_| Some(today))
    }

    /// User-initiated retry after a failed fetch.
    pub fn retry(&mut self) -> Option<WeekRequest> {
        match self.state {
            BrowserState::Error { .. } => self.request_week(),
            _ => None,
        }
    }

    fn navigate(&mut self, step: impl FnOnce(NaiveDate) -> Option<NaiveDate>) -> Option<WeekRequest> {
        if self.barber.is_none() || self.state == BrowserState::Closed {
            return None;
        }
        self.week_start = step(self.week_start)?;
        self.request_week()
    }

    /// Apply a fetch result. Returns `false` when the response was discarded
    /// because a newer request superseded it or the view was closed.
    pub fn apply(&mut self, request: &WeekRequest, result: Result<Vec<DaySchedule>, ApiError>) -> bool {
        if request.seq != self.latest_seq || self.state == BrowserState::Closed {
            tracing::debug!(
                "barber_schedule: discarded stale response for {} week {} (seq {} != {})",
                request.barber,
                request.week_start,
                request.seq,
                self.latest_seq
            );
            return false;
        }

        let barber = request.barber.clone();
        let week_start = request.week_start;
        self.state = match result {
            Ok(days) => {
                let days = filter_visible_days(days, self.today);
                if days.is_empty() {
                    BrowserState::NoAvailableDays { barber, week_start }
                } else {
                    BrowserState::Ready {
                        barber,
                        week_start,
                        days,
                    }
                }
            }
            Err(e) => {
                tracing::error!("barber_schedule: {} week {}: {}", barber, week_start, e);
                BrowserState::Error {
                    barber,
                    week_start,
                    message: MSG_SCHEDULE_FAILED.to_string(),
                }
            }
        };
        true
    }

    /// Visible days of the loaded week. Empty unless `Ready`.
    pub fn days(&self) -> &[DaySchedule] {
        match &self.state {
            BrowserState::Ready { days, .. } => days,
            _ => &[],
        }
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.days().iter().find(|day| day.date == date)
    }

    pub fn day_slots(&self, date: NaiveDate, status: BlockStatus) -> Vec<SlotView> {
        self.day(date)
            .map(|day| self.model.day_slots(day, status))
            .unwrap_or_default()
    }

    /// Turn a tap on slot `index` of `date` into a form seed. Taps on
    /// unselectable slots yield `None`.
    pub fn tap_slot(&self, date: NaiveDate, index: usize, status: BlockStatus) -> Option<SlotSeed> {
        let day = self.day(date)?;
        let interval = day.free_intervals.get(index)?;
        if !is_slot_selectable(interval, &day.free_intervals, status) {
            return None;
        }
        Some(SlotSeed {
            barber: day.barber.clone(),
            date: day.date,
            interval: *interval,
            slot: self.model.bookable(interval, &day.free_intervals),
        })
    }

    /// Dismiss the view. In-flight responses no longer mutate state.
    pub fn close(&mut self) {
        self.latest_seq += 1;
        self.state = BrowserState::Closed;
    }

    /// Start over from barber selection, e.g. after a booking.
    pub fn reopen(&mut self, today: NaiveDate) {
        self.latest_seq += 1;
        self.today = today;
        self.barber = None;
        self.week_start = dates::week_start_for(today);
        self.state = BrowserState::NoBarberSelected;
    }
}

// ── Barber directory ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryState {
    Loading,
    Ready(Vec<Barber>),
    Failed(String),
}

/// The barber list shown before a schedule, with a client-side search.
pub struct BarberDirectory {
    state: DirectoryState,
    search: String,
}

impl Default for BarberDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl BarberDirectory {
    pub fn new() -> Self {
        Self {
            state: DirectoryState::Loading,
            search: String::new(),
        }
    }

    pub fn state(&self) -> &DirectoryState {
        &self.state
    }

    pub fn begin(&mut self) {
        self.state = DirectoryState::Loading;
    }

    pub fn apply(&mut self, result: Result<Vec<Barber>, ApiError>) {
        self.state = match result {
            Ok(barbers) if barbers.is_empty() => {
                DirectoryState::Failed(crate::api::MSG_NO_BARBERS.to_string())
            }
            Ok(barbers) => DirectoryState::Ready(barbers),
            Err(ApiError::Rejected(message)) => DirectoryState::Failed(message),
            Err(e) => {
                tracing::error!("barbers: {}", e);
                DirectoryState::Failed(MSG_BARBERS_FAILED.to_string())
            }
        };
    }

    /// Re-enter `Loading` after a failure. Returns whether a fetch is due.
    pub fn retry(&mut self) -> bool {
        if matches!(self.state, DirectoryState::Failed(_)) {
            self.begin();
            true
        } else {
            false
        }
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.trim().to_lowercase();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Barbers whose name contains the search text, case-insensitively.
    pub fn filtered(&self) -> Vec<&Barber> {
        match &self.state {
            DirectoryState::Ready(barbers) => barbers
                .iter()
                .filter(|b| self.search.is_empty() || b.name.to_lowercase().contains(&self.search))
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::LastSlotRule;
    use crate::testing::{date, make_barber, make_day};

    fn make_browser() -> ScheduleBrowser {
        let model = SlotModel::new(LastSlotRule::with_services(vec!["Corte".into()]));
        ScheduleBrowser::new(model, date("2026-10-21"))
    }

    fn week(start: &str) -> Vec<DaySchedule> {
        let start = date(start);
        (0..7)
            .map(|i| make_day(start + Days::new(i), 9, 20))
            .collect()
    }

    #[test]
    fn test_filter_keeps_today() {
        let days = filter_visible_days(week("2026-10-19"), date("2026-10-21"));
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, date("2026-10-21"));
    }

    #[test]
    fn test_no_fetch_without_barber() {
        let mut browser = make_browser();
        assert_eq!(browser.request_week(), None);
        assert_eq!(browser.next_week(), None);
        assert_eq!(browser.state(), &BrowserState::NoBarberSelected);
    }

    #[test]
    fn test_barber_then_load_ready() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        let req = browser.current_week().unwrap();
        assert_eq!(req.week_start, date("2026-10-19"));
        assert!(browser.is_loading());

        assert!(browser.apply(&req, Ok(week("2026-10-19"))));
        assert_eq!(browser.days().len(), 5);
        assert_eq!(browser.week_label(), "19 Oct - 25 Oct");
    }

    #[test]
    fn test_past_week_is_not_error() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        let req = browser.previous_week().unwrap();
        assert_eq!(req.week_start, date("2026-10-12"));
        browser.apply(&req, Ok(week("2026-10-12")));
        assert!(matches!(browser.state(), BrowserState::NoAvailableDays { .. }));
    }

    #[test]
    fn test_error_then_retry() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        assert_eq!(browser.retry(), None);

        let req = browser.current_week().unwrap();
        browser.apply(&req, Err(ApiError::Timeout));
        match browser.state() {
            BrowserState::Error { message, barber, .. } => {
                assert_eq!(message, MSG_SCHEDULE_FAILED);
                assert_eq!(barber, "Diego");
            }
            other => panic!("unexpected state {:?}", other),
        }

        let retry = browser.retry().unwrap();
        assert_eq!(retry.week_start, req.week_start);
        assert!(retry.seq > req.seq);
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        let slow = browser.current_week().unwrap();
        let fast = browser.next_week().unwrap();

        assert!(browser.apply(&fast, Ok(week("2026-10-26"))));
        assert!(!browser.apply(&slow, Ok(week("2026-10-19"))));

        assert_eq!(browser.week_start(), date("2026-10-26"));
        assert_eq!(browser.days()[0].date, date("2026-10-26"));
    }

    #[test]
    fn test_barber_change_invalidates_fetch() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        let req = browser.current_week().unwrap();
        browser.select_barber("Juan");
        assert!(!browser.apply(&req, Ok(week("2026-10-19"))));
        assert_eq!(
            browser.state(),
            &BrowserState::BarberChosen {
                barber: "Juan".into()
            }
        );
    }

    #[test]
    fn test_closed_ignores_late_response() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        let req = browser.current_week().unwrap();
        browser.close();
        assert!(!browser.apply(&req, Ok(week("2026-10-19"))));
        assert_eq!(browser.state(), &BrowserState::Closed);
        assert_eq!(browser.next_week(), None);
    }

    #[test]
    fn test_tap_last_slot_respects_status() {
        let mut browser = make_browser();
        browser.select_barber("Diego");
        let req = browser.current_week().unwrap();
        browser.apply(&req, Ok(week("2026-10-19")));

        let today = date("2026-10-21");
        assert_eq!(browser.tap_slot(today, 10, BlockStatus::Loading), None);
        assert_eq!(browser.tap_slot(today, 10, BlockStatus::Resolved { blocked: true }), None);

        let seed = browser
            .tap_slot(today, 10, BlockStatus::Resolved { blocked: false })
            .unwrap();
        assert!(seed.slot.is_last_of_day());
        assert_eq!(seed.slot.start().to_string(), "18:45");

        let regular = browser.tap_slot(today, 0, BlockStatus::Loading).unwrap();
        assert_eq!(regular.slot.duration_minutes(), 60);
        assert_eq!(browser.tap_slot(today, 42, BlockStatus::NotChecked), None);
        assert_eq!(browser.tap_slot(date("2026-10-19"), 0, BlockStatus::NotChecked), None);
    }

    // ── Directory ──

    #[test]
    fn test_directory_search() {
        let mut dir = BarberDirectory::new();
        dir.apply(Ok(vec![make_barber("Diego"), make_barber("Juan"), make_barber("Diana")]));
        dir.set_search("  DI ");
        assert_eq!(dir.search(), "di");
        let names: Vec<&str> = dir.filtered().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Diego", "Diana"]);
        dir.set_search("");
        assert_eq!(dir.filtered().len(), 3);
    }

    #[test]
    fn test_directory_failure_and_retry() {
        let mut dir = BarberDirectory::new();
        assert!(!dir.retry());
        dir.apply(Err(ApiError::Transport("refused".into())));
        assert_eq!(dir.state(), &DirectoryState::Failed(MSG_BARBERS_FAILED.into()));
        assert!(dir.retry());
        assert_eq!(dir.state(), &DirectoryState::Loading);
    }

    #[test]
    fn test_directory_empty_list() {
        let mut dir = BarberDirectory::new();
        dir.apply(Ok(Vec::new()));
        assert_eq!(
            dir.state(),
            &DirectoryState::Failed(crate::api::MSG_NO_BARBERS.into())
        );
    }
}
