//! Connectivity check: one document write proves credentials and database access.

use crate::error::GatewayError;
use crate::gateway::{CloudGateway, FieldMap, FieldValue};
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

pub const CHECK_MESSAGE: &str = "Test OK";

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionReport {
    pub id: String,
    /// Wall time of the write, token exchange included
    pub latency: Duration,
}

/// Write `{timestamp, message}` to `collection` and report the new document id
pub async fn check_connection<G: CloudGateway + ?Sized>(
    gateway: &G,
    collection: &str,
) -> Result<ConnectionReport, GatewayError> {
    let mut fields = FieldMap::new();
    fields.insert("timestamp".to_string(), FieldValue::Timestamp(Utc::now()));
    fields.insert("message".to_string(), CHECK_MESSAGE.into());

    tracing::info!(collection = %collection, "Writing connection test document");
    let start = Instant::now();
    let id = gateway.add_document(collection, fields).await?;
    let latency = start.elapsed();
    tracing::info!(collection = %collection, id = %id, latency_ms = latency.as_millis() as u64, "Connection test document written");

    Ok(ConnectionReport { id, latency })
}

/// One-line explanation of a failed check
pub fn describe_failure(error: &GatewayError) -> String {
    if error.is_permission_denied() {
        format!("permission denied, check the service account's Firestore roles ({})", error)
    } else if error.is_timeout() {
        format!("timed out, Firestore did not answer in time ({})", error)
    } else {
        error.to_string()
    }
}
