//! Client details for a chosen slot.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

use crate::error::ApiError;
use crate::models::Service;
use crate::schedule::SlotSeed;
use crate::slots::BookableSlot;

/// Required phone length (Colombian mobile numbers).
pub const PHONE_DIGITS: usize = 10;

pub const MSG_NAME_REQUIRED: &str = "Ingresa tu nombre";
pub const MSG_PHONE_INVALID: &str = "Ingresa un número de teléfono válido de 10 dígitos";
pub const MSG_SERVICE_REQUIRED: &str = "Selecciona un servicio";
pub const MSG_EMAIL_INVALID: &str = "Ingresa un correo válido";
pub const MSG_NO_SERVICES: &str = "No hay servicios disponibles para este horario";

/// Keeps digits only. Applied on every keystroke.
pub fn sanitize_phone(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Exactly ten ASCII digits.
pub fn validate_phone(phone: &str) -> bool {
    phone.len() == PHONE_DIGITS && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Loose structural check: `local@domain.tld`.
pub fn validate_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

// ── Form state ──

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServiceList {
    #[default]
    Loading,
    Loaded(Vec<Service>),
    /// The fetch failed; the form stays open with no services to choose.
    Unavailable(String),
}

/// Per-field validation flags. All fields are checked together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub client_name: bool,
    pub phone: bool,
    pub service: bool,
    pub email: bool,
}

impl FieldErrors {
    pub fn any(&self) -> bool {
        self.client_name || self.phone || self.service || self.email
    }

    pub fn messages(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.client_name {
            out.push(MSG_NAME_REQUIRED);
        }
        if self.phone {
            out.push(MSG_PHONE_INVALID);
        }
        if self.service {
            out.push(MSG_SERVICE_REQUIRED);
        }
        if self.email {
            out.push(MSG_EMAIL_INVALID);
        }
        out
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("no slot selected")]
    NotOpen,
    #[error("services are still loading")]
    ServicesLoading,
    #[error("invalid fields: {0}")]
    Invalid(FieldErrors),
}

/// Token tying a services fetch to the form opening that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicesTicket {
    generation: u64,
}

/// A finalized selection, consumed once by the intent composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSelection {
    pub barber: String,
    pub date: NaiveDate,
    pub slot: BookableSlot,
    pub client_name: String,
    pub phone: String,
    pub service: String,
    pub email: Option<String>,
}

#[derive(Default)]
pub struct SelectionForm {
    seed: Option<SlotSeed>,
    generation: u64,
    services: ServiceList,
    client_name: String,
    phone: String,
    service: Option<String>,
    email: String,
    errors: FieldErrors,
}

impl SelectionForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open for a new slot. Every field and flag is reset; the returned
    /// ticket must accompany the services fetched for this opening.
    pub fn open(&mut self, seed: SlotSeed) -> ServicesTicket {
        let generation = self.generation + 1;
        *self = Self {
            seed: Some(seed),
            generation,
            ..Self::default()
        };
        ServicesTicket { generation }
    }

    pub fn is_open(&self) -> bool {
        self.seed.is_some()
    }

    pub fn seed(&self) -> Option<&SlotSeed> {
        self.seed.as_ref()
    }

    /// Apply a services fetch. Results for an earlier opening, or arriving
    /// after the form closed, are dropped.
    pub fn apply_services(&mut self, ticket: &ServicesTicket, result: Result<Vec<Service>, ApiError>) -> bool {
        let Some(seed) = &self.seed else {
            tracing::debug!("services: form closed, response dropped");
            return false;
        };
        if ticket.generation != self.generation {
            tracing::debug!("services: stale response dropped");
            return false;
        }
        self.services = match result {
            Ok(services) => {
                let services = seed.slot.allowed_services().apply(services);
                if services.is_empty() {
                    tracing::info!("services: none allowed for {} {}", seed.date, seed.slot.start());
                }
                ServiceList::Loaded(services)
            }
            Err(e) => {
                tracing::error!("services: {}", e);
                ServiceList::Unavailable(e.user_message())
            }
        };
        true
    }

    pub fn services(&self) -> &ServiceList {
        &self.services
    }

    /// Services the user may choose. Empty while loading or on failure.
    pub fn available_services(&self) -> &[Service] {
        match &self.services {
            ServiceList::Loaded(services) => services,
            _ => &[],
        }
    }

    pub fn has_no_services(&self) -> bool {
        match &self.services {
            ServiceList::Loaded(services) => services.is_empty(),
            ServiceList::Unavailable(_) => true,
            ServiceList::Loading => false,
        }
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn errors(&self) -> FieldErrors {
        self.errors
    }

    pub fn set_client_name(&mut self, value: &str) {
        self.client_name = value.to_string();
        self.errors.client_name = false;
    }

    /// Non-digits are dropped as they are typed.
    pub fn set_phone(&mut self, value: &str) {
        self.phone = sanitize_phone(value);
        self.errors.phone = false;
    }

    pub fn set_service(&mut self, name: &str) {
        self.service = Some(name.to_string()).filter(|s| !s.trim().is_empty());
        self.errors.service = false;
    }

    pub fn set_email(&mut self, value: &str) {
        self.email = value.trim().to_string();
        self.errors.email = false;
    }

    fn field_errors(&self) -> FieldErrors {
        let service_ok = self
            .service
            .as_deref()
            .is_some_and(|chosen| self.available_services().iter().any(|s| s.name == chosen));
        FieldErrors {
            client_name: self.client_name.trim().is_empty(),
            phone: !validate_phone(&self.phone),
            service: !service_ok,
            email: !self.email.is_empty() && !validate_email(&self.email),
        }
    }

    /// Submission is disabled while services load or any field is invalid.
    pub fn can_submit(&self) -> bool {
        self.is_open() && !matches!(self.services, ServiceList::Loading) && !self.field_errors().any()
    }

    /// Validate every field at once. On success the form closes and its
    /// selection is handed out exactly once.
    pub fn submit(&mut self) -> Result<BookingSelection, SubmitError> {
        if !self.is_open() {
            return Err(SubmitError::NotOpen);
        }
        if matches!(self.services, ServiceList::Loading) {
            return Err(SubmitError::ServicesLoading);
        }

        let errors = self.field_errors();
        self.errors = errors;
        if errors.any() {
            return Err(SubmitError::Invalid(errors));
        }

        let seed = self.seed.take().ok_or(SubmitError::NotOpen)?;
        let selection = BookingSelection {
            barber: seed.barber,
            date: seed.date,
            slot: seed.slot,
            client_name: self.client_name.trim().to_string(),
            phone: self.phone.clone(),
            service: self.service.take().unwrap_or_default(),
            email: Some(self.email.clone()).filter(|e| !e.is_empty()),
        };
        self.close();
        Ok(selection)
    }

    /// Dismiss. A services response still in flight is dropped.
    pub fn close(&mut self) {
        let generation = self.generation;
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}

// ── Tests ──
