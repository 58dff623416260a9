use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::error::ApiError;
use crate::models::*;

/// Text used when the backend answers `barbers` without a list.
pub const MSG_NO_BARBERS: &str = "No se encontraron barberos en este establecimiento";

/// Remote booking backend. Every call is scoped by the tenant subdomain.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn barbers(&self, subdomain: &str) -> Result<Vec<Barber>, ApiError>;

    async fn week_schedule(
        &self,
        barber: &str,
        week_start: NaiveDate,
        subdomain: &str,
    ) -> Result<Vec<DaySchedule>, ApiError>;

    async fn services(&self, subdomain: &str) -> Result<Vec<Service>, ApiError>;

    /// Whether the last slot of `barber`'s `date` is dynamically blocked.
    async fn last_slot_status(
        &self,
        barber: &str,
        date: NaiveDate,
        subdomain: &str,
    ) -> Result<bool, ApiError>;

    async fn book(&self, request: &AppointmentRequest) -> Result<AppointmentResponse, ApiError>;

    async fn cancel(&self, request: &CancelRequest) -> Result<CancelResponse, ApiError>;

    async fn establishment_info(&self, subdomain: &str) -> Result<EstablishmentInfo, ApiError>;
}

// ── HTTP implementation ──

/// `BookingApi` over JSON/HTTP.
#[derive(Clone)]
pub struct HttpBookingApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBookingApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from_transport)?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("{}: request failed: {}", path, e);
                ApiError::from_transport(e)
            })?;
        read_response(path, resp).await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Decode a response, treating non-2xx and error-carrying 2xx bodies alike.
async fn read_response<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let text = resp.text().await.map_err(ApiError::from_transport)?;
    let value: Option<serde_json::Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        tracing::error!("{}: backend returned {} - {}", path, status, text);
        let field = |name: &str| {
            value
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        return Err(ApiError::Status {
            status: status.as_u16(),
            error: field("error"),
            message: field("message"),
        });
    }

    let value = value.ok_or_else(|| {
        tracing::error!("{}: body is not JSON: {}", path, text);
        ApiError::Decode(format!("{}: body is not JSON", path))
    })?;

    if let Some(reason) = body_error(&value) {
        tracing::error!("{}: backend reported error: {}", path, reason);
        return Err(ApiError::Rejected(reason));
    }

    serde_json::from_value(value).map_err(|e| {
        tracing::error!("{}: unexpected payload: {}", path, e);
        ApiError::Decode(format!("{}: {}", path, e))
    })
}

/// The reason carried by an `error` field or a `status: "error"` marker.
fn body_error(value: &serde_json::Value) -> Option<String> {
    let describe = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match value.get("error") {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => {}
        Some(error) => {
            let reason = value.get("message").filter(|_| error.is_boolean()).unwrap_or(error);
            return Some(describe(reason));
        }
    }

    let status = value.get("status").and_then(|s| s.as_str());
    if status.is_some_and(|s| s.eq_ignore_ascii_case("error")) {
        let reason = value
            .get("message")
            .map(describe)
            .unwrap_or_else(|| "error".to_string());
        return Some(reason);
    }
    None
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn barbers(&self, subdomain: &str) -> Result<Vec<Barber>, ApiError> {
        let resp: BarbersResponse = self.post("barbers", &SubdomainRequest { subdomain }).await?;
        resp.barbers
            .ok_or_else(|| ApiError::Rejected(MSG_NO_BARBERS.to_string()))
    }

    async fn week_schedule(
        &self,
        barber: &str,
        week_start: NaiveDate,
        subdomain: &str,
    ) -> Result<Vec<DaySchedule>, ApiError> {
        let body = ScheduleRequest {
            barber,
            week_start: week_start.format(WIRE_DATE_FORMAT).to_string(),
            subdomain,
        };
        let resp: ScheduleResponse = self.post("barber_schedule", &body).await?;
        resp.into_days(barber).inspect_err(|e| {
            tracing::error!("barber_schedule: {}", e);
        })
    }

    async fn services(&self, subdomain: &str) -> Result<Vec<Service>, ApiError> {
        let resp: ServicesResponse = self.post("services", &SubdomainRequest { subdomain }).await?;
        Ok(resp.services)
    }

    async fn last_slot_status(
        &self,
        barber: &str,
        date: NaiveDate,
        subdomain: &str,
    ) -> Result<bool, ApiError> {
        let body = LastSlotStatusRequest {
            barber,
            date: date.format(WIRE_DATE_FORMAT).to_string(),
            subdomain,
        };
        let resp: LastSlotStatusResponse = self.post("last_slot_status", &body).await?;
        Ok(resp.blocked)
    }

    async fn book(&self, request: &AppointmentRequest) -> Result<AppointmentResponse, ApiError> {
        let resp: AppointmentResponse = self.post("appointment", request).await?;
        tracing::info!(
            "appointment: {} {} {} for {}",
            request.barber,
            request.date,
            request.time,
            request.client_name
        );
        Ok(resp)
    }

    async fn cancel(&self, request: &CancelRequest) -> Result<CancelResponse, ApiError> {
        let resp: CancelResponse = self.post("cancel", request).await?;
        tracing::info!("cancel: accepted for {}", request.subdomain);
        Ok(resp)
    }

    async fn establishment_info(&self, subdomain: &str) -> Result<EstablishmentInfo, ApiError> {
        let mut url = self.endpoint("establishment-info")?;
        url.query_pairs_mut().append_pair("subdomain", subdomain);
        let resp = self.http.get(url).send().await.map_err(|e| {
            tracing::warn!("establishment-info: request failed: {}", e);
            ApiError::from_transport(e)
        })?;
        read_response("establishment-info", resp).await
    }
}

// ── Tests ──
