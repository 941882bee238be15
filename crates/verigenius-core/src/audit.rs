use crate::store::AuditSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

/// One append-only audit record per inbound validation call, including calls
/// rejected before any store access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Raw request payload. A malformed body is preserved as a JSON string.
    pub request_body: Value,
    pub response_body: Value,
    pub status_code: u16,
    pub is_success: bool,
    pub client_ip: String,
}

impl AuditEntry {
    pub fn new(
        request_body: Value,
        response_body: Value,
        status_code: u16,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            request_body,
            response_body,
            status_code,
            is_success: status_code == 200,
            client_ip: client_ip.into(),
        }
    }
}

/// Best-effort writer in front of the audit sink.
///
/// `record` never fails upward: one append attempt, and on failure a
/// diagnostic on the operator log channel. The response returned to the
/// caller has already been decided by the time this runs, and a sink failure
/// cannot change it.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn backend(&self) -> &'static str {
        self.sink.backend()
    }

    pub async fn record(&self, entry: AuditEntry) {
        let status_code = entry.status_code;
        if let Err(err) = self.sink.append(entry).await {
            error!(%err, status_code, "audit append failed; response unaffected");
        }
    }
}
