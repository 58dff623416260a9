//! Turning a validated selection into what the backend and the transcript see.

use crate::dates::format_long_date;
use crate::form::BookingSelection;
use crate::models::{AppointmentRequest, AppointmentResponse, CancelRequest, WIRE_DATE_FORMAT};

pub const BOOKING_CONFIRMED: &str = "Agendamiento Confirmado";
pub const CANCELLATION_CONFIRMED: &str = "Cancelación Confirmada";
pub const EMAIL_SENT: &str = "✅ Confirmación enviada por email";
pub const EMAIL_NOT_SENT: &str = "⚠️ No se pudo enviar el email";

/// Structured body plus the sentence shown in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingIntent {
    pub request: AppointmentRequest,
    pub summary: String,
}

/// Stateless: the same selection always composes to the same intent.
#[derive(Debug, Clone)]
pub struct BookingIntentComposer {
    subdomain: String,
}

impl BookingIntentComposer {
    pub fn new(subdomain: impl Into<String>) -> Self {
        Self {
            subdomain: subdomain.into(),
        }
    }

    pub fn compose(&self, selection: &BookingSelection) -> BookingIntent {
        let summary = summary_sentence(selection);
        let request = AppointmentRequest {
            prompt: summary.clone(),
            barber: selection.barber.clone(),
            date: selection.date.format(WIRE_DATE_FORMAT).to_string(),
            time: selection.slot.start().to_string(),
            end_time: selection.slot.end().to_string(),
            duration_minutes: selection.slot.duration_minutes(),
            client_name: selection.client_name.clone(),
            phone: selection.phone.clone(),
            service: selection.service.clone(),
            email: selection.email.clone(),
            subdomain: self.subdomain.clone(),
        };
        BookingIntent { request, summary }
    }

    /// `None` for a blank prompt: nothing to send.
    pub fn compose_cancellation(&self, prompt: &str) -> Option<CancelRequest> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        Some(CancelRequest {
            prompt: prompt.to_string(),
            subdomain: self.subdomain.clone(),
        })
    }
}

fn summary_sentence(selection: &BookingSelection) -> String {
    let email = selection
        .email
        .as_deref()
        .map(|e| format!(", mi correo es {}", e))
        .unwrap_or_default();
    format!(
        "Quiero agendar una cita con {} para el {} a las {}. Mi nombre es {}, mi teléfono es {}{} y quiero un servicio de {}.",
        selection.barber,
        format_long_date(selection.date),
        selection.slot.start().to_12h(),
        selection.client_name,
        selection.phone,
        email,
        selection.service
    )
}

/// Outcome shown after the backend accepted a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmation {
    /// Backend's own reply text.
    pub reply: String,
    pub confirmation: String,
}

impl BookingConfirmation {
    pub fn from_response(response: &AppointmentResponse, email_given: bool) -> Self {
        let mut confirmation = BOOKING_CONFIRMED.to_string();
        if email_given {
            match response.email_sent {
                Some(true) => {
                    confirmation.push('\n');
                    confirmation.push_str(EMAIL_SENT);
                }
                Some(false) => {
                    confirmation.push('\n');
                    confirmation.push_str(EMAIL_NOT_SENT);
                }
                None => {}
            }
        }
        Self {
            reply: response.response.clone(),
            confirmation,
        }
    }
}

/// Colombian pesos without decimals: `$25.000`.
pub fn format_cop(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}${}", sign, grouped)
}

// ── Tests ──
