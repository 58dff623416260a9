//! Slot selection and booking flow for a barbershop booking client.
//!
//! The backend owns availability and persistence; this crate turns its weekly
//! payloads into selectable slots (with the last-slot-of-day rules), validates
//! the client's details and composes the booking sent back to it.

pub mod api;
pub mod clock;
pub mod config;
pub mod dates;
pub mod error;
pub mod establishment;
pub mod form;
pub mod gate;
pub mod intent;
pub mod models;
pub mod schedule;
pub mod session;
pub mod slots;

#[cfg(test)]
mod testing;

pub use api::{BookingApi, HttpBookingApi};
pub use clock::ClockTime;
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use establishment::{EstablishmentContext, EstablishmentHandle, EstablishmentProvider};
pub use form::{BookingSelection, SelectionForm, SubmitError};
pub use gate::LastSlotGate;
pub use intent::{BookingConfirmation, BookingIntent, BookingIntentComposer};
pub use schedule::{BarberDirectory, BrowserState, ScheduleBrowser};
pub use session::{BookingSession, SessionError, SessionSettings};
pub use slots::{BlockStatus, BookableSlot, SlotModel};
