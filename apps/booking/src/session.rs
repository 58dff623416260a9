//! The booking flow: barber directory, schedule, form, composer, transport.
//!
//! Components never touch each other's state; the session hands a slot seed
//! from the browser to the form and a finalized selection from the form to
//! the composer.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::api::BookingApi;
use crate::config::ClientConfig;
use crate::dates;
use crate::error::ApiError;
use crate::establishment::{EstablishmentCache, EstablishmentHandle, EstablishmentProvider};
use crate::form::{SelectionForm, SubmitError};
use crate::gate::LastSlotGate;
use crate::intent::{BookingConfirmation, BookingIntent, BookingIntentComposer, CANCELLATION_CONFIRMED};
use crate::models::DaySchedule;
use crate::schedule::{BarberDirectory, ScheduleBrowser, WeekRequest};
use crate::slots::{BlockStatus, SlotModel, SlotView};

pub const MSG_SLOT_UNAVAILABLE: &str = "Este horario ya no está disponible. Por favor, elige otro.";
pub const MSG_FORM_NOT_OPEN: &str = "Primero selecciona un horario.";
pub const MSG_SERVICES_LOADING: &str = "Espera un momento, estamos cargando los servicios.";
pub const MSG_EMPTY_CANCELLATION: &str =
    "Escribe tu nombre y la fecha de la cita que deseas cancelar.";
pub const MSG_NOTHING_TO_RETRY: &str = "No hay ninguna cita pendiente por enviar.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("slot is not selectable")]
    SlotUnavailable,
    #[error(transparent)]
    Form(#[from] SubmitError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("empty cancellation request")]
    EmptyCancellation,
    #[error("no failed booking to retry")]
    NothingToRetry,
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::SlotUnavailable => MSG_SLOT_UNAVAILABLE.to_string(),
            SessionError::Form(SubmitError::NotOpen) => MSG_FORM_NOT_OPEN.to_string(),
            SessionError::Form(SubmitError::ServicesLoading) => MSG_SERVICES_LOADING.to_string(),
            SessionError::Form(SubmitError::Invalid(errors)) => errors.messages().join("\n"),
            SessionError::Api(e) => e.user_message(),
            SessionError::EmptyCancellation => MSG_EMPTY_CANCELLATION.to_string(),
            SessionError::NothingToRetry => MSG_NOTHING_TO_RETRY.to_string(),
        }
    }
}

/// What the user sees after a successful booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub summary: String,
    pub confirmation: BookingConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReceipt {
    pub reply: String,
    pub confirmation: &'static str,
}

/// One column of the week grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub date: NaiveDate,
    pub label: &'static str,
    pub is_today: bool,
    pub is_weekend: bool,
    pub block_status: BlockStatus,
    pub slots: Vec<SlotView>,
}

pub struct SessionSettings {
    pub slot_model: SlotModel,
    pub last_slot_timeout: Duration,
    pub today: NaiveDate,
}

impl SessionSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            slot_model: config.slot_model(),
            last_slot_timeout: config.last_slot_timeout,
            today: config.today(),
        }
    }
}

pub struct BookingSession {
    api: Arc<dyn BookingApi>,
    establishment: EstablishmentProvider,
    subdomain: String,
    directory: BarberDirectory,
    browser: ScheduleBrowser,
    gate: Arc<LastSlotGate>,
    form: SelectionForm,
    composer: BookingIntentComposer,
    /// A composed booking whose submission failed, kept for a retry.
    pending: Option<BookingIntent>,
    weeks_tx: mpsc::UnboundedSender<WeekLoaded>,
    weeks_rx: mpsc::UnboundedReceiver<WeekLoaded>,
    checks: JoinSet<bool>,
}

/// A finished week fetch, tagged with the request that issued it.
struct WeekLoaded {
    request: WeekRequest,
    result: Result<Vec<DaySchedule>, ApiError>,
}

impl BookingSession {
    pub fn new(api: Arc<dyn BookingApi>, establishment: EstablishmentProvider, settings: SessionSettings) -> Self {
        let subdomain = establishment.current().subdomain.clone();
        let gate = Arc::new(LastSlotGate::new(
            Arc::clone(&api),
            subdomain.clone(),
            settings.last_slot_timeout,
        ));
        let (weeks_tx, weeks_rx) = mpsc::unbounded_channel();
        Self {
            api,
            establishment,
            composer: BookingIntentComposer::new(subdomain.clone()),
            subdomain,
            directory: BarberDirectory::new(),
            browser: ScheduleBrowser::new(settings.slot_model, settings.today),
            gate,
            form: SelectionForm::new(),
            pending: None,
            weeks_tx,
            weeks_rx,
            checks: JoinSet::new(),
        }
    }

    /// Wire a session from configuration and resolve the establishment.
    pub async fn from_config(config: &ClientConfig, api: Arc<dyn BookingApi>) -> Self {
        let cache = config.cache_path.clone().map(EstablishmentCache::new);
        let establishment = EstablishmentProvider::new(config.subdomain.clone(), cache);
        establishment.initialize(api.as_ref()).await;
        Self::new(api, establishment, SessionSettings::from_config(config))
    }

    pub fn establishment(&self) -> EstablishmentHandle {
        self.establishment.handle()
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    // ── Barbers ──

    pub fn directory(&self) -> &BarberDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut BarberDirectory {
        &mut self.directory
    }

    pub async fn load_barbers(&mut self) {
        self.directory.begin();
        let result = self.api.barbers(&self.subdomain).await;
        self.directory.apply(result);
    }

    /// Returns whether a fetch was issued.
    pub async fn retry_barbers(&mut self) -> bool {
        if !self.directory.retry() {
            return false;
        }
        self.load_barbers().await;
        true
    }

    // ── Schedule ──

    pub fn browser(&self) -> &ScheduleBrowser {
        &self.browser
    }

    /// Pick a barber and start loading the current week. Returns whether a
    /// fetch was issued; the week arrives through [`Self::wait_for_week`].
    pub fn choose_barber(&mut self, barber: &str) -> bool {
        self.form.close();
        self.pending = None;
        self.browser.select_barber(barber);
        let request = self.browser.current_week();
        self.issue_week(request)
    }

    pub fn previous_week(&mut self) -> bool {
        let request = self.browser.previous_week();
        self.issue_week(request)
    }

    pub fn next_week(&mut self) -> bool {
        let request = self.browser.next_week();
        self.issue_week(request)
    }

    pub fn current_week(&mut self) -> bool {
        let request = self.browser.current_week();
        self.issue_week(request)
    }

    pub fn retry_week(&mut self) -> bool {
        let request = self.browser.retry();
        self.issue_week(request)
    }

    /// Fetch in the background. Earlier fetches stay in flight and are
    /// discarded by sequence number when they land.
    fn issue_week(&mut self, request: Option<WeekRequest>) -> bool {
        let Some(request) = request else {
            return false;
        };
        self.stop_block_checks();

        let api = Arc::clone(&self.api);
        let subdomain = self.subdomain.clone();
        let tx = self.weeks_tx.clone();
        tokio::spawn(async move {
            let result = api
                .week_schedule(&request.barber, request.week_start, &subdomain)
                .await;
            if tx.send(WeekLoaded { request, result }).is_err() {
                tracing::debug!("barber_schedule: session dropped before the week arrived");
            }
        });
        true
    }

    /// Wait until the latest requested week is applied. Superseded responses
    /// are dropped on the way. Last-slot checks keep running after this
    /// returns, so the week is viewable while they are still loading.
    pub async fn wait_for_week(&mut self) {
        while self.browser.is_loading() {
            let Some(loaded) = self.weeks_rx.recv().await else {
                break;
            };
            self.apply_week(loaded);
        }
    }

    /// Apply any week fetches that already finished, without waiting.
    pub fn poll_weeks(&mut self) {
        while let Ok(loaded) = self.weeks_rx.try_recv() {
            self.apply_week(loaded);
        }
    }

    fn apply_week(&mut self, loaded: WeekLoaded) {
        if !self.browser.apply(&loaded.request, loaded.result) {
            return;
        }
        self.gate.reset();
        self.checks = self.gate.spawn_checks(self.browser.days());
    }

    /// Wait for the last-slot checks of the applied week to resolve.
    pub async fn wait_for_block_checks(&mut self) {
        while let Some(joined) = self.checks.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    tracing::error!("last_slot_status: check task failed: {}", e);
                }
            }
        }
    }

    /// Block results from a previous week never carry over.
    fn stop_block_checks(&mut self) {
        // Dropping the set aborts its tasks
        self.checks = JoinSet::new();
        self.gate.reset();
    }

    pub fn block_status(&self, date: NaiveDate) -> BlockStatus {
        match self.browser.day(date) {
            Some(day) => self.gate.status(&day.barber, day.date),
            None => BlockStatus::NotChecked,
        }
    }

    pub fn day_slots(&self, date: NaiveDate) -> Vec<SlotView> {
        self.browser.day_slots(date, self.block_status(date))
    }

    /// Render-ready columns for every visible day of the loaded week.
    pub fn week_view(&self) -> Vec<DayView> {
        let today = self.browser.today();
        self.browser
            .days()
            .iter()
            .map(|day| {
                let block_status = self.block_status(day.date);
                DayView {
                    date: day.date,
                    label: dates::day_label(day.date),
                    is_today: day.date == today,
                    is_weekend: dates::is_weekend(day.date),
                    block_status,
                    slots: self.browser.model().day_slots(day, block_status),
                }
            })
            .collect()
    }

    /// Dismiss the schedule. In-flight fetches and a failed booking waiting
    /// for retry are abandoned.
    pub fn close_schedule(&mut self) {
        self.form.close();
        self.pending = None;
        self.browser.close();
        self.stop_block_checks();
    }

    /// Start a fresh browse from barber selection.
    pub fn reopen_schedule(&mut self, today: NaiveDate) {
        self.form.close();
        self.pending = None;
        self.browser.reopen(today);
        self.stop_block_checks();
    }

    // ── Form ──

    pub fn form(&self) -> &SelectionForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SelectionForm {
        &mut self.form
    }

    /// Open the form for slot `index` of `date` and load its services.
    pub async fn select_slot(&mut self, date: NaiveDate, index: usize) -> Result<(), SessionError> {
        self.pending = None;
        let seed = self
            .browser
            .tap_slot(date, index, self.block_status(date))
            .ok_or(SessionError::SlotUnavailable)?;
        tracing::info!(
            "slot selected: {} {} {} (last={})",
            seed.barber,
            seed.date,
            seed.slot.start(),
            seed.slot.is_last_of_day()
        );
        let ticket = self.form.open(seed);
        let result = self.api.services(&self.subdomain).await;
        self.form.apply_services(&ticket, result);
        Ok(())
    }

    pub fn close_form(&mut self) {
        self.form.close();
    }

    // ── Submission ──

    /// Validate, compose and send. Validation failures never reach the
    /// network and leave the form open with its fields flagged.
    pub async fn submit_booking(&mut self) -> Result<BookingReceipt, SessionError> {
        let selection = self.form.submit()?;
        let intent = self.composer.compose(&selection);
        self.send(intent).await
    }

    /// Resend the last booking whose submission failed.
    pub async fn retry_booking(&mut self) -> Result<BookingReceipt, SessionError> {
        let intent = self.pending.take().ok_or(SessionError::NothingToRetry)?;
        self.send(intent).await
    }

    pub fn has_pending_booking(&self) -> bool {
        self.pending.is_some()
    }

    async fn send(&mut self, intent: BookingIntent) -> Result<BookingReceipt, SessionError> {
        let result = self.api.book(&intent.request).await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("appointment: {}", e);
                self.pending = Some(intent);
                return Err(e.into());
            }
        };

        self.pending = None;
        self.establishment
            .apply_branding(response.establishment_name.clone(), response.logo_url.clone())
            .await;

        let confirmation = BookingConfirmation::from_response(&response, intent.request.email.is_some());
        Ok(BookingReceipt {
            summary: intent.summary,
            confirmation,
        })
    }

    pub async fn cancel(&mut self, prompt: &str) -> Result<CancellationReceipt, SessionError> {
        let request = self
            .composer
            .compose_cancellation(prompt)
            .ok_or(SessionError::EmptyCancellation)?;
        let response = self.api.cancel(&request).await.inspect_err(|e| {
            tracing::error!("cancel: {}", e);
        })?;
        Ok(CancellationReceipt {
            reply: response.response,
            confirmation: CANCELLATION_CONFIRMED,
        })
    }
}

// ── Tests ──
