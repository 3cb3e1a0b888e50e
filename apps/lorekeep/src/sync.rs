//! # Remote Sync
//!
//! An [`OperationSink`] that POSTs each operation batch as JSON:
//!
//! ```json
//! {
//!   "label": "add child",
//!   "operations": [
//!     {"type": "create", "target_id": "note-2", "entity": {...}},
//!     {"type": "update", "target_id": "note-1", "data": {...}}
//!   ]
//! }
//! ```
//!
//! Delivery runs on spawned tokio tasks. Failures are logged at debug level
//! and dropped; the local registry is authoritative.

use crate::config::SyncConfig;
use lorekeep_core::{GraphObject, LoreError, ObjectId, Operation, OperationSink};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::debug;

/// One operation as it appears on the wire.
#[derive(Debug, Serialize)]
pub struct WireOperation<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub target_id: &'a ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<&'a GraphObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a GraphObject>,
}

impl<'a> From<&'a Operation> for WireOperation<'a> {
    fn from(op: &'a Operation) -> Self {
        let (entity, data) = match op {
            Operation::Create { entity } => (Some(entity), None),
            Operation::Update { data, .. } => (None, Some(data)),
            Operation::Remove { .. } => (None, None),
        };
        Self {
            kind: op.kind(),
            target_id: op.target(),
            entity,
            data,
        }
    }
}

/// A labelled batch, one per logical edit.
#[derive(Debug, Serialize)]
pub struct WireBatch<'a> {
    pub label: &'a str,
    pub operations: Vec<WireOperation<'a>>,
}

impl<'a> WireBatch<'a> {
    pub fn new(label: &'a str, operations: &'a [Operation]) -> Self {
        Self {
            label,
            operations: operations.iter().map(WireOperation::from).collect(),
        }
    }
}

/// Fire-and-forget HTTP sink.
#[derive(Debug)]
pub struct HttpSink {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    runtime: Handle,
    pending: Mutex<JoinSet<()>>,
}

impl HttpSink {
    /// Build a sink for `endpoint`, spawning deliveries on `runtime`.
    pub fn new(
        endpoint: impl Into<String>,
        config: &SyncConfig,
        runtime: Handle,
    ) -> Result<Self, LoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LoreError::Sync(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: config.api_key.clone(),
            runtime,
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// Build from config on the current runtime; `None` when sync is disabled.
    pub fn from_config(config: &SyncConfig) -> Result<Option<Self>, LoreError> {
        let Some(endpoint) = &config.endpoint else {
            return Ok(None);
        };
        let runtime = Handle::try_current()
            .map_err(|e| LoreError::Sync(format!("No async runtime for sync: {}", e)))?;
        Self::new(endpoint.clone(), config, runtime).map(Some)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Deliveries spawned and not yet reaped. Finished ones are reaped on the
    /// next dispatch.
    pub fn queued(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Wait up to `budget` for in-flight deliveries. Returns how many were
    /// still pending when the budget ran out.
    pub async fn drain(&self, budget: Duration) -> usize {
        let mut pending = match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return 0,
        };
        let finished = tokio::time::timeout(budget, async {
            while pending.join_next().await.is_some() {}
        })
        .await;
        if finished.is_err() {
            debug!(abandoned = pending.len(), "sync drain timed out");
        }
        pending.len()
    }
}

impl OperationSink for HttpSink {
    fn dispatch(&self, label: &str, operations: &[Operation]) -> Result<(), LoreError> {
        let body = serde_json::to_value(WireBatch::new(label, operations))
            .map_err(|e| LoreError::Serialization(e.to_string()))?;

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let label = label.to_string();
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| LoreError::Sync("sync queue poisoned".to_string()))?;
        while pending.try_join_next().is_some() {}
        pending.spawn_on(
            async move {
                match request.send().await.and_then(|r| r.error_for_status()) {
                    Ok(response) => debug!(%label, status = %response.status(), "batch delivered"),
                    Err(e) => debug!(%label, error = %e, "batch discarded"),
                }
            },
            &self.runtime,
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
