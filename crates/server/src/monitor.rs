//! SEFAZ status monitoring.
//!
//! A single background task probes the status endpoint on a fixed interval
//! and records **transitions only** into the `service_status` table: the
//! history never contains two consecutive rows with the same `online` value
//! from this monitor's view. The last known state starts as unknown (`None`)
//! rather than an optimistic online default, so the first probe always
//! records a row.

use crate::client::{HttpClient, UpstreamResponse};
use crate::config::AppConfig;
use crate::entity::service_status;
use crate::error::RequestError;
use crate::store::Store;
use bytes::Bytes;
use hyper::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::Duration;
use utoipa::ToSchema;

/// Result of one probe. Probes never fail: any transport or payload problem
/// resolves to `online = false` with a diagnostic detail.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ProbeOutcome {
    pub online: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub detail: String,
}

pub struct StatusMonitor {
    store: Store,
    client: HttpClient,
    config: Arc<AppConfig>,
    /// Last known state; `None` until the first probe. Held across
    /// detect-and-persist so racing probes cannot both record a transition.
    last_online: Mutex<Option<bool>>,
    /// Manually toggled substitute state for non-production environments.
    simulated_online: AtomicBool,
    running: Mutex<Option<Arc<AtomicBool>>>,
}

fn payload_signals_online(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .map(|v| {
            v.get("online").and_then(Value::as_bool).unwrap_or(false)
                || v.get("status").and_then(Value::as_str) == Some("online")
        })
        .unwrap_or(false)
}

impl StatusMonitor {
    pub fn new(store: Store, client: HttpClient, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            client,
            config,
            last_online: Mutex::new(None),
            simulated_online: AtomicBool::new(true),
            running: Mutex::new(None),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.config.sefaz.check_interval_secs)
    }

    /// One probe of the status source, without transition detection.
    async fn probe(&self) -> ProbeOutcome {
        let timestamp = OffsetDateTime::now_utc();

        if self.config.simulated_probing() {
            let online = self.simulated_online.load(Ordering::SeqCst);
            return ProbeOutcome {
                online,
                timestamp,
                detail: self.simulated_detail(online),
            };
        }

        match self
            .client
            .request(Method::GET, &self.config.sefaz.status_url, None, None)
            .await
        {
            Ok(response) => {
                let body_text = String::from_utf8_lossy(&response.body).into_owned();
                let online =
                    response.status == StatusCode::OK && payload_signals_online(&response.body);
                let detail = if response.status == StatusCode::OK {
                    body_text
                } else {
                    format!("HTTP {}: {body_text}", response.status)
                };
                ProbeOutcome {
                    online,
                    timestamp,
                    detail,
                }
            }
            Err(err) => ProbeOutcome {
                online: false,
                timestamp,
                detail: format!("probe failed: {err}"),
            },
        }
    }

    /// Probe once and run the outcome through transition detection.
    #[tracing::instrument(skip(self))]
    pub async fn check_now(&self) -> ProbeOutcome {
        let outcome = self.probe().await;
        self.record_outcome(outcome.online, &outcome.detail).await;
        outcome
    }

    /// Compare against the last known state; persist only when it changed
    /// (or no prior state exists). A persistence failure is logged and the
    /// in-memory state still advances so the monitor stays live.
    async fn record_outcome(&self, online: bool, detail: &str) {
        let mut last = self.last_online.lock().await;
        if *last == Some(online) {
            return;
        }
        tracing::info!(
            name = "monitor.status.transition",
            online,
            previous = ?*last,
            "SEFAZ status transition observed"
        );
        if let Err(err) = self
            .store
            .record_transition(online, Some(detail.to_string()))
            .await
        {
            tracing::warn!(
                name = "monitor.transition.persist_failed",
                error = %err,
                online,
                "failed to persist status transition"
            );
        }
        *last = Some(online);
    }

    /// Start the recurring probe loop: one immediate check, then one per
    /// interval. Calling while already running replaces the old task rather
    /// than duplicating it.
    pub async fn start_monitoring(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if let Some(flag) = running.take() {
            flag.store(false, Ordering::SeqCst);
        }
        let flag = Arc::new(AtomicBool::new(true));
        *running = Some(flag.clone());
        drop(running);

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(
                name = "monitor.started",
                interval_secs = monitor.config.sefaz.check_interval_secs,
                "status monitoring started"
            );
            while flag.load(Ordering::SeqCst) {
                monitor.check_now().await;
                tokio::time::sleep(monitor.check_interval()).await;
            }
            tracing::info!(name = "monitor.stopped", "status monitoring stopped");
        });
    }

    /// Disarm the timer. Safe to call when not running; an in-flight probe
    /// is not interrupted.
    pub async fn stop_monitoring(&self) {
        let mut running = self.running.lock().await;
        if let Some(flag) = running.take() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Most recent transitions, newest first. Fails soft: store errors come
    /// back as an empty list so the monitor stays usable while persistence
    /// is degraded.
    pub async fn history(&self, limit: u64) -> Vec<service_status::Model> {
        match self.store.status_history(limit).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(
                    name = "monitor.history.read_failed",
                    error = %err,
                    "status history read failed, returning empty history"
                );
                Vec::new()
            }
        }
    }

    /// Most recent recorded status; seeds one via a fresh probe when the
    /// history is empty or unreadable.
    pub async fn current_status(&self) -> ProbeOutcome {
        match self.store.latest_status().await {
            Ok(Some(row)) => ProbeOutcome {
                online: row.online,
                timestamp: row.recorded_at,
                detail: row.detail.unwrap_or_default(),
            },
            Ok(None) => self.check_now().await,
            Err(err) => {
                tracing::warn!(
                    name = "monitor.current_status.read_failed",
                    error = %err,
                    "latest status read failed, falling back to a fresh probe"
                );
                self.check_now().await
            }
        }
    }

    fn simulated_detail(&self, online: bool) -> String {
        json!({
            "simulated": true,
            "message": if online {
                "service operating normally"
            } else {
                "service unavailable"
            },
        })
        .to_string()
    }

    /// Current simulated status without touching the transition log.
    pub fn simulated_outcome(&self) -> ProbeOutcome {
        let online = self.simulated_online.load(Ordering::SeqCst);
        ProbeOutcome {
            online,
            timestamp: OffsetDateTime::now_utc(),
            detail: self.simulated_detail(online),
        }
    }

    /// Flip the simulated state, routing the new value through the same
    /// transition-detection path as real probes.
    pub async fn toggle_simulated(&self) -> bool {
        let online = !self.simulated_online.fetch_xor(true, Ordering::SeqCst);
        let detail = self.simulated_detail(online);
        self.record_outcome(online, &detail).await;
        online
    }

    /// Outbound call multiplexer for the lookup service. Applies the shared
    /// timeout/retry policy; a failure of the status endpoint also feeds the
    /// transition detector. Non-success HTTP statuses are failures here.
    #[tracing::instrument(skip(self, body))]
    pub async fn request(
        &self,
        endpoint: &str,
        body: Option<Bytes>,
        method: Method,
    ) -> Result<UpstreamResponse, RequestError> {
        let url = self.config.sefaz.endpoint_url(endpoint);
        let bearer = if url == self.config.sefaz.query_url {
            self.config.sefaz.api_token.as_deref()
        } else {
            None
        };

        let result = match self.client.request(method, &url, body, bearer).await {
            Ok(response) if !response.status.is_success() => Err(RequestError::Http {
                status: response.status,
                context: String::from_utf8_lossy(&response.body).into_owned(),
            }),
            other => other,
        };

        if let Err(err) = &result
            && url == self.config.sefaz.status_url
        {
            self.record_outcome(false, &format!("status endpoint request failed: {err}"))
                .await;
        }

        result
    }
}
