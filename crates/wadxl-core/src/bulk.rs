//! Periodic batch fan-out.
//!
//! [`BatchBulkHelper`] drives a [`BatchSource`] on a fixed cadence and hands
//! every non-empty batch to the registered [`BatchClient`]s. Streaming is
//! started when the first client registers and finished once the last client
//! declines further batches.
//!
//! Hosts that expose the stream to outside subscribers register a
//! [`BulkEndpoint`] per sensor: a wire name plus a `key = value` selector,
//! and the header describing each sample row.

use crate::data::SampleBatch;
use crate::error::{WadxlError, WadxlResult};
use crate::host::{BatchClient, BatchSource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default batch cadence.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Named subscription point for a batch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEndpoint {
    /// Wire name subscribers ask for, e.g. `adxl345/dump_adxl345`
    pub wire_name: String,
    /// Selector field in the subscription request
    pub key: String,
    /// Selector value identifying this source
    pub value: String,
    /// Column names of each delivered sample
    pub header: Vec<String>,
}

impl BulkEndpoint {
    /// Whether a subscription for `wire_name` with `key = value` selects
    /// this endpoint.
    pub fn matches(&self, wire_name: &str, key: &str, value: &str) -> bool {
        self.wire_name == wire_name && self.key == key && self.value == value
    }
}

#[derive(Default)]
struct Lifecycle {
    started: bool,
    timer: Option<JoinHandle<()>>,
}

struct BulkInner {
    source: Arc<dyn BatchSource>,
    interval: Duration,
    clients: Mutex<Vec<Arc<dyn BatchClient>>>,
    endpoints: Mutex<Vec<BulkEndpoint>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

/// Timer-driven batch reader with client registration.
#[derive(Clone)]
pub struct BatchBulkHelper {
    inner: Arc<BulkInner>,
}

impl BatchBulkHelper {
    /// Create a stopped helper around `source`.
    pub fn new(source: Arc<dyn BatchSource>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(BulkInner {
                source,
                interval,
                clients: Mutex::new(Vec::new()),
                endpoints: Mutex::new(Vec::new()),
                lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Batch cadence.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Publish this stream under `wire_name`, selected by `key = value`.
    ///
    /// A second registration with the same wire name and selector is a
    /// configuration error.
    pub fn add_mux_endpoint(
        &self,
        wire_name: &str,
        key: &str,
        value: &str,
        header: &[&str],
    ) -> WadxlResult<()> {
        let mut endpoints = self.inner.endpoints.lock();
        if endpoints.iter().any(|e| e.matches(wire_name, key, value)) {
            return Err(WadxlError::Config(format!(
                "Endpoint {} already registered for {}={}",
                wire_name, key, value
            )));
        }
        endpoints.push(BulkEndpoint {
            wire_name: wire_name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
        });
        tracing::debug!(wire_name, key, value, "Registered bulk endpoint");
        Ok(())
    }

    /// Look up a registered endpoint.
    pub fn endpoint(&self, wire_name: &str, key: &str, value: &str) -> Option<BulkEndpoint> {
        self.inner
            .endpoints
            .lock()
            .iter()
            .find(|e| e.matches(wire_name, key, value))
            .cloned()
    }

    /// Register `client` through a published endpoint and return the header
    /// of the rows it will receive.
    pub async fn subscribe(
        &self,
        wire_name: &str,
        key: &str,
        value: &str,
        client: Arc<dyn BatchClient>,
    ) -> WadxlResult<Vec<String>> {
        let endpoint = self.endpoint(wire_name, key, value).ok_or_else(|| {
            WadxlError::Usage(format!("Unknown endpoint {} for {}={}", wire_name, key, value))
        })?;
        self.add_client(client).await?;
        Ok(endpoint.header)
    }

    /// Register a client, starting the source if it is not running.
    ///
    /// If the source fails to start, every pending client is dropped and the
    /// error is returned; the helper stays stopped.
    pub async fn add_client(&self, client: Arc<dyn BatchClient>) -> WadxlResult<()> {
        self.inner.clients.lock().push(client);
        self.inner.start().await
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().len()
    }

    /// Whether the source is currently streaming.
    pub async fn is_started(&self) -> bool {
        self.inner.lifecycle.lock().await.started
    }

    /// Drop all clients and stop the source immediately.
    pub async fn shutdown(&self) -> WadxlResult<()> {
        self.inner.clients.lock().clear();
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if let Some(timer) = lifecycle.timer.take() {
            timer.abort();
        }
        if !std::mem::replace(&mut lifecycle.started, false) {
            return Ok(());
        }
        self.inner.source.finish_measurements().await
    }
}

impl BulkInner {
    async fn start(self: &Arc<Self>) -> WadxlResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.started {
            return Ok(());
        }
        if let Err(e) = self.source.start_measurements().await {
            tracing::error!(error = %e, "Batch source failed to start");
            self.clients.lock().clear();
            return Err(e);
        }
        lifecycle.started = true;

        let inner = Arc::clone(self);
        lifecycle.timer = Some(tokio::spawn(inner.run_timer()));
        Ok(())
    }

    async fn run_timer(self: Arc<Self>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(batch) = self.source.process_batch() else {
                continue;
            };
            if self.fan_out(&batch) > 0 {
                continue;
            }
            if self.stop_if_idle().await {
                break;
            }
        }
    }

    /// Deliver a batch, dropping clients that decline it. Returns how many
    /// clients remain.
    fn fan_out(&self, batch: &SampleBatch) -> usize {
        let mut clients = self.clients.lock();
        clients.retain(|client| client.handle_batch(batch));
        clients.len()
    }

    async fn stop_if_idle(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if !self.clients.lock().is_empty() {
            // A client registered while the last one was leaving
            return false;
        }
        lifecycle.started = false;
        lifecycle.timer = None;
        if let Err(e) = self.source.finish_measurements().await {
            tracing::error!(error = %e, "Batch source failed to stop");
        }
        true
    }
}
