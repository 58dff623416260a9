//! Tenant identity and branding.
//!
//! One [`EstablishmentProvider`] owns the context and is its only writer.
//! Readers hold an [`EstablishmentHandle`] and always see a whole context:
//! updates replace the shared `Arc` in one step.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::BookingApi;

pub const DEFAULT_NAME: &str = "Misther Barber";
pub const DEFAULT_LOGO_URL: &str = "https://storage.googleapis.com/cluvi/newbarber-logo.png";

pub const LOCAL_SUBDOMAIN: &str = "prueba";
pub const PRIMARY_SUBDOMAIN: &str = "principal";
pub const UNKNOWN_SUBDOMAIN: &str = "desconocido";

/// Tenant discriminator for a hostname.
pub fn subdomain_from_host(host: &str, primary_domain: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    let primary = primary_domain.trim().to_lowercase();

    if host == "localhost" || host == "127.0.0.1" {
        return LOCAL_SUBDOMAIN.to_string();
    }
    if host == primary || host.strip_prefix("www.") == Some(primary.as_str()) {
        return PRIMARY_SUBDOMAIN.to_string();
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 && !labels[0].is_empty() {
        return labels[0].to_string();
    }
    UNKNOWN_SUBDOMAIN.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishmentContext {
    pub name: String,
    pub logo_url: String,
    pub subdomain: String,
}

impl EstablishmentContext {
    pub fn fallback(subdomain: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            logo_url: DEFAULT_LOGO_URL.to_string(),
            subdomain: subdomain.into(),
        }
    }
}

// ── Cache ──

/// JSON file holding the last known context.
#[derive(Debug, Clone)]
pub struct EstablishmentCache {
    path: PathBuf,
}

impl EstablishmentCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The cached context for `subdomain`. A cache written for another
    /// tenant, or unreadable, is removed.
    pub async fn load(&self, subdomain: &str) -> Option<EstablishmentContext> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("establishment cache: read {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_slice::<EstablishmentContext>(&raw) {
            Ok(ctx) if ctx.subdomain == subdomain => Some(ctx),
            Ok(ctx) => {
                tracing::info!(
                    "establishment cache: subdomain changed ({} -> {}), discarding",
                    ctx.subdomain,
                    subdomain
                );
                self.clear().await;
                None
            }
            Err(e) => {
                tracing::warn!("establishment cache: corrupt {:?}: {}", self.path, e);
                self.clear().await;
                None
            }
        }
    }

    pub async fn store(&self, ctx: &EstablishmentContext) {
        let json = match serde_json::to_vec_pretty(ctx) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("establishment cache: serialize: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, json).await {
            tracing::warn!("establishment cache: write {:?}: {}", self.path, e);
        }
    }

    async fn clear(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("establishment cache: remove {:?}: {}", self.path, e);
            }
        }
    }
}

// ── Provider / handle ──

/// Read-only view of the current context.
#[derive(Debug, Clone)]
pub struct EstablishmentHandle {
    rx: watch::Receiver<Arc<EstablishmentContext>>,
}

impl EstablishmentHandle {
    pub fn current(&self) -> Arc<EstablishmentContext> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn subdomain(&self) -> String {
        self.rx.borrow().subdomain.clone()
    }

    /// Wait for the next replacement. `false` once the provider is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

pub struct EstablishmentProvider {
    tx: watch::Sender<Arc<EstablishmentContext>>,
    cache: Option<EstablishmentCache>,
}

impl EstablishmentProvider {
    pub fn new(subdomain: impl Into<String>, cache: Option<EstablishmentCache>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(EstablishmentContext::fallback(subdomain)));
        Self { tx, cache }
    }

    pub fn handle(&self) -> EstablishmentHandle {
        EstablishmentHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> Arc<EstablishmentContext> {
        Arc::clone(&self.tx.borrow())
    }

    pub async fn replace(&self, ctx: EstablishmentContext) {
        if let Some(cache) = &self.cache {
            cache.store(&ctx).await;
        }
        self.tx.send_replace(Arc::new(ctx));
    }

    /// Load from cache when it matches the tenant, otherwise ask the backend.
    /// Any failure keeps the default branding.
    pub async fn initialize(&self, api: &dyn BookingApi) {
        let subdomain = self.current().subdomain.clone();

        if let Some(cache) = &self.cache {
            if let Some(ctx) = cache.load(&subdomain).await {
                tracing::info!("establishment: using cached context for {}", subdomain);
                self.tx.send_replace(Arc::new(ctx));
                return;
            }
        }

        match api.establishment_info(&subdomain).await {
            Ok(info) => {
                let fallback = EstablishmentContext::fallback(subdomain.as_str());
                let ctx = EstablishmentContext {
                    name: non_empty(info.establishment_name).unwrap_or(fallback.name),
                    logo_url: non_empty(info.logo_url).unwrap_or(fallback.logo_url),
                    subdomain,
                };
                tracing::info!("establishment: {} ({})", ctx.name, ctx.subdomain);
                self.replace(ctx).await;
            }
            Err(e) => {
                tracing::warn!("establishment-info: {}, keeping default branding", e);
            }
        }
    }

    /// Branding returned alongside a booking. A missing logo keeps the
    /// current one.
    pub async fn apply_branding(&self, name: Option<String>, logo_url: Option<String>) {
        let Some(name) = non_empty(name) else {
            return;
        };
        let current = self.current();
        let logo_url = non_empty(logo_url).unwrap_or_else(|| current.logo_url.clone());
        if current.name == name && current.logo_url == logo_url {
            return;
        }
        self.replace(EstablishmentContext {
            name,
            logo_url,
            subdomain: current.subdomain.clone(),
        })
        .await;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::EstablishmentInfo;
    use crate::testing::StubApi;

    fn temp_cache(name: &str) -> EstablishmentCache {
        let path = std::env::temp_dir().join(format!(
            "barber-booking-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        EstablishmentCache::new(path)
    }

    #[test]
    fn test_subdomain_rules() {
        let primary = "irrelevantcalendar.com";
        assert_eq!(subdomain_from_host("localhost", primary), "prueba");
        assert_eq!(subdomain_from_host("127.0.0.1:8080", primary), "prueba");
        assert_eq!(subdomain_from_host("irrelevantcalendar.com", primary), "principal");
        assert_eq!(subdomain_from_host("www.irrelevantcalendar.com", primary), "principal");
        assert_eq!(subdomain_from_host("Elite.IrrelevantCalendar.com", primary), "elite");
        assert_eq!(subdomain_from_host("otrodominio.co", primary), "desconocido");
    }

    #[tokio::test]
    async fn test_initialize_fetches_info() {
        let api = StubApi {
            info: Ok(EstablishmentInfo {
                establishment_name: Some("Elite Barber".into()),
                logo_url: None,
            }),
            ..Default::default()
        };
        let provider = EstablishmentProvider::new("elite", None);
        let mut handle = provider.handle();
        provider.initialize(&api).await;

        assert!(handle.changed().await);
        let ctx = handle.current();
        assert_eq!(ctx.name, "Elite Barber");
        assert_eq!(ctx.logo_url, DEFAULT_LOGO_URL);
        assert_eq!(ctx.subdomain, "elite");
    }

    #[tokio::test]
    async fn test_initialize_failure_keeps_default() {
        let api = StubApi {
            info: Err(ApiError::Timeout),
            ..Default::default()
        };
        let provider = EstablishmentProvider::new("elite", None);
        provider.initialize(&api).await;
        assert_eq!(*provider.current(), EstablishmentContext::fallback("elite"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let cache = temp_cache("hit");
        cache
            .store(&EstablishmentContext {
                name: "Cacheado".into(),
                logo_url: "https://x/logo.png".into(),
                subdomain: "elite".into(),
            })
            .await;

        let api = StubApi::default();
        let provider = EstablishmentProvider::new("elite", Some(cache));
        provider.initialize(&api).await;

        assert_eq!(provider.current().name, "Cacheado");
        assert_eq!(api.calls_to("establishment-info"), 0);
    }

    #[tokio::test]
    async fn test_cache_for_other_tenant_discarded() {
        let cache = temp_cache("other");
        cache
            .store(&EstablishmentContext::fallback("viejo"))
            .await;

        assert_eq!(cache.load("elite").await, None);
        assert_eq!(cache.load("viejo").await, None);
    }

    #[tokio::test]
    async fn test_branding_from_booking() {
        let provider = EstablishmentProvider::new("elite", None);
        let handle = provider.handle();

        provider.apply_branding(None, Some("https://x/l.png".into())).await;
        assert_eq!(handle.current().name, DEFAULT_NAME);

        provider.apply_branding(Some("Elite".into()), None).await;
        let ctx = handle.current();
        assert_eq!(ctx.name, "Elite");
        assert_eq!(ctx.logo_url, DEFAULT_LOGO_URL);
        assert_eq!(handle.subdomain(), "elite");
    }
}
