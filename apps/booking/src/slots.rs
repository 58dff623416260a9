//! Slot rules applied to one day of availability.
//!
//! The last interval of a working day is special: it is moved 15 minutes
//! earlier, lasts 45 minutes instead of 60, only admits a restricted set of
//! quick services, and may be blocked dynamically after the weekly payload
//! was produced (see [`crate::gate`]).

use crate::clock::ClockTime;
use crate::models::{DaySchedule, Service, TimeInterval};

/// Duration of an ordinary slot.
pub const REGULAR_SLOT_MINUTES: u32 = 60;
/// How far the last slot of the day is pulled back.
pub const LAST_SLOT_SHIFT_MINUTES: i32 = 15;
/// Duration of the shortened last slot.
pub const LAST_SLOT_MINUTES: u32 = 45;

// ── Service restriction ──

/// Which services a slot admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRestriction {
    Any,
    /// Configured names, compared case-insensitively. A per-service
    /// `last_slot` flag from the backend overrides the name list.
    Only(Vec<String>),
}

impl ServiceRestriction {
    pub fn is_restricted(&self) -> bool {
        matches!(self, ServiceRestriction::Only(_))
    }

    pub fn permits(&self, service: &Service) -> bool {
        match self {
            ServiceRestriction::Any => true,
            ServiceRestriction::Only(names) => match service.last_slot {
                Some(allowed) => allowed,
                None => {
                    let name = service.name.trim().to_lowercase();
                    names.iter().any(|n| n.trim().to_lowercase() == name)
                }
            },
        }
    }

    /// Keep only the permitted services, preserving backend order.
    pub fn apply(&self, services: Vec<Service>) -> Vec<Service> {
        services.into_iter().filter(|s| self.permits(s)).collect()
    }
}

// ── Last slot rule ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSlotRule {
    pub shift_minutes: i32,
    pub duration_minutes: u32,
    pub allowed_services: Vec<String>,
}

impl LastSlotRule {
    pub fn with_services(allowed_services: Vec<String>) -> Self {
        Self {
            shift_minutes: LAST_SLOT_SHIFT_MINUTES,
            duration_minutes: LAST_SLOT_MINUTES,
            allowed_services,
        }
    }
}

// ── Slot types ──

/// The rule-applied form of a last-of-day interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustedSlot {
    pub start: ClockTime,
    pub end: ClockTime,
    pub duration_minutes: u32,
    pub allowed_services: ServiceRestriction,
}

/// What the user actually books when tapping an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookableSlot {
    Regular(TimeInterval),
    LastOfDay(AdjustedSlot),
}

static UNRESTRICTED: ServiceRestriction = ServiceRestriction::Any;

impl BookableSlot {
    pub fn start(&self) -> ClockTime {
        match self {
            BookableSlot::Regular(interval) => interval.start,
            BookableSlot::LastOfDay(adjusted) => adjusted.start,
        }
    }

    pub fn end(&self) -> ClockTime {
        match self {
            BookableSlot::Regular(interval) => interval.end,
            BookableSlot::LastOfDay(adjusted) => adjusted.end,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        match self {
            BookableSlot::Regular(_) => REGULAR_SLOT_MINUTES,
            BookableSlot::LastOfDay(adjusted) => adjusted.duration_minutes,
        }
    }

    pub fn allowed_services(&self) -> &ServiceRestriction {
        match self {
            BookableSlot::Regular(_) => &UNRESTRICTED,
            BookableSlot::LastOfDay(adjusted) => &adjusted.allowed_services,
        }
    }

    pub fn is_last_of_day(&self) -> bool {
        matches!(self, BookableSlot::LastOfDay(_))
    }
}

/// Dynamic block state of a day's last slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStatus {
    #[default]
    NotChecked,
    Loading,
    Resolved { blocked: bool },
}

/// One render-ready slot of a day column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub index: usize,
    pub interval: TimeInterval,
    pub slot: BookableSlot,
    pub selectable: bool,
}

// ── Rules ──

pub fn is_occupied(interval: &TimeInterval) -> bool {
    interval.occupied
}

/// True iff `interval` is the final element of `day` by position. Another
/// interval with identical times elsewhere in the day does not qualify.
pub fn is_last_of_day(interval: &TimeInterval, day: &[TimeInterval]) -> bool {
    day.last().is_some_and(|last| std::ptr::eq(last, interval))
}

/// Occupied slots are never selectable. The last slot additionally needs a
/// resolved, unblocked status: it stays closed while the check is pending.
pub fn is_slot_selectable(interval: &TimeInterval, day: &[TimeInterval], status: BlockStatus) -> bool {
    if is_occupied(interval) {
        return false;
    }
    if !is_last_of_day(interval, day) {
        return true;
    }
    match status {
        BlockStatus::Resolved { blocked } => !blocked,
        BlockStatus::NotChecked | BlockStatus::Loading => false,
    }
}

/// Applies the last-slot rule to intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotModel {
    rule: LastSlotRule,
}

impl SlotModel {
    pub fn new(rule: LastSlotRule) -> Self {
        Self { rule }
    }

    /// Shift both ends back and attach the restricted service set. Callers
    /// apply this to the last interval of a day only.
    pub fn adjust(&self, interval: &TimeInterval) -> AdjustedSlot {
        AdjustedSlot {
            start: interval.start.shifted(-self.rule.shift_minutes),
            end: interval.end.shifted(-self.rule.shift_minutes),
            duration_minutes: self.rule.duration_minutes,
            allowed_services: ServiceRestriction::Only(self.rule.allowed_services.clone()),
        }
    }

    pub fn bookable(&self, interval: &TimeInterval, day: &[TimeInterval]) -> BookableSlot {
        if is_last_of_day(interval, day) {
            BookableSlot::LastOfDay(self.adjust(interval))
        } else {
            BookableSlot::Regular(*interval)
        }
    }

    /// All slots of a day, in backend order. `status` is the day's last-slot
    /// block status and only affects that slot.
    pub fn day_slots(&self, day: &DaySchedule, status: BlockStatus) -> Vec<SlotView> {
        let intervals = &day.free_intervals;
        intervals
            .iter()
            .enumerate()
            .map(|(index, interval)| SlotView {
                index,
                interval: *interval,
                slot: self.bookable(interval, intervals),
                selectable: is_slot_selectable(interval, intervals, status),
            })
            .collect()
    }
}

// ── Tests ──
