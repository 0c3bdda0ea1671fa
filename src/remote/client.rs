//! Remote client trait and HTTP implementation.
//!
//! The [`RemoteClient`] trait abstracts the telemetry endpoint that
//! accepts named-tracker batch position updates, allowing the uploader to
//! work against any backend (and tests to record dispatched chunks). The
//! [`HttpTrackerClient`] implementation posts JSON batches via `reqwest`.
//!
//! The trait method returns a boxed future so the client can live behind
//! `Arc<dyn RemoteClient>` and be moved across the per-chunk tasks.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::RemoteError;
use crate::position::Position;

/// Transport-level timeout for the reference HTTP client.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One device position within a batch update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePositionUpdate {
    /// Device the position belongs to.
    pub device_id: String,

    /// `[longitude, latitude]` pair, in that order.
    pub position: [f64; 2],

    /// When the sample was taken.
    pub sample_time: DateTime<Utc>,
}

impl From<&Position> for DevicePositionUpdate {
    fn from(p: &Position) -> Self {
        Self {
            device_id: p.device_id.clone(),
            position: [p.location.longitude, p.location.latitude],
            sample_time: p.timestamp,
        }
    }
}

/// A named-tracker batch position update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateRequest {
    /// Destination tracker.
    pub tracker_name: String,

    /// The positions in this chunk.
    pub updates: Vec<DevicePositionUpdate>,
}

/// A per-item error reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Device whose update was rejected.
    pub device_id: String,

    /// Sample time of the rejected update.
    pub sample_time: DateTime<Utc>,

    /// Service-provided description.
    pub message: String,
}

/// Response to a batch update; may report partial per-item errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdateResponse {
    /// Per-item errors; empty on full success.
    #[serde(default)]
    pub errors: Vec<BatchItemError>,
}

/// The remote telemetry endpoint collaborator.
pub trait RemoteClient: Send + Sync {
    /// Send one chunk of position updates.
    ///
    /// A transport error or any entry in the response's error list means
    /// that chunk failed; other chunks are unaffected.
    fn batch_update_device_position(
        &self,
        request: BatchUpdateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BatchUpdateResponse, RemoteError>> + Send + '_>>;
}

/// HTTP client posting batch updates as JSON.
///
/// Posts to `{endpoint}/trackers/{tracker_name}/positions`. Uses a
/// reusable `reqwest::Client` with connection pooling and a transport
/// timeout.
pub struct HttpTrackerClient {
    /// Validated base endpoint, without a trailing slash.
    endpoint: String,

    /// Reusable HTTP client.
    http: reqwest::Client,
}

impl HttpTrackerClient {
    /// Create a client for the given base endpoint.
    ///
    /// Fails synchronously with [`RemoteError::InvalidEndpoint`] if the
    /// endpoint is not an absolute http(s) URL.
    pub fn new(endpoint: &str) -> Result<Self, RemoteError> {
        let parsed = reqwest::Url::parse(endpoint)
            .map_err(|e| RemoteError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RemoteError::InvalidEndpoint(format!(
                "{endpoint}: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn send(&self, request: BatchUpdateRequest) -> Result<BatchUpdateResponse, RemoteError> {
        let url = format!(
            "{}/trackers/{}/positions",
            self.endpoint, request.tracker_name
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Http(format!("{url} returned {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        tracing::debug!(
            url = %url,
            updates = request.updates.len(),
            "Batch update posted"
        );

        // An empty body means full success
        if bytes.is_empty() {
            return Ok(BatchUpdateResponse::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Json(e.to_string()))
    }
}

impl RemoteClient for HttpTrackerClient {
    fn batch_update_device_position(
        &self,
        request: BatchUpdateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BatchUpdateResponse, RemoteError>> + Send + '_>> {
        Box::pin(self.send(request))
    }
}
