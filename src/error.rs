//! Crate-level error type for tracking sessions.
//!
//! Propagation policy:
//!
//! - Configuration and permission errors are returned synchronously from
//!   the operation that raised them and are fatal to that operation.
//! - Steady-state ingestion/delivery errors are non-fatal: they are logged,
//!   published on the event bus as [`SaveFailureEvent`]s, and the session
//!   keeps running.
//!
//! [`SaveFailureEvent`]: crate::events::SaveFailureEvent

use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

/// Errors raised by the tracking pipeline.
///
/// `Clone` so failure events carrying the error can fan out over a
/// broadcast channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// Location authorization is restricted or denied. Fatal: the session
    /// is stopped.
    #[error("Location permissions are restricted or denied")]
    MissingPermissions,

    /// A durable-store insert/read/clear failed. Non-fatal; the affected
    /// samples are considered lost.
    #[error("Local store operation failed: {0}")]
    LocalStoreFailure(String),

    /// No device identifier in session state. Non-fatal; the samples are
    /// dropped rather than persisted under a null key.
    #[error("Device identifier missing from session state")]
    MissingDeviceIdentifier,

    /// A chunk of positions could not be delivered to the remote sender.
    /// Non-fatal, scoped to that chunk, never retried by this crate.
    #[error("Remote delivery failed: {0}")]
    RemoteDeliveryFailure(String),

    /// Configuration-time failure (bad endpoint, no sink configured).
    /// Surfaced synchronously to the caller.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `start_tracking` was called while a session is already active.
    #[error("A tracking session is already active")]
    SessionAlreadyActive,
}

impl From<StoreError> for TrackingError {
    fn from(e: StoreError) -> Self {
        TrackingError::LocalStoreFailure(e.to_string())
    }
}

impl From<RemoteError> for TrackingError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::InvalidEndpoint(msg) => TrackingError::InvalidConfiguration(msg),
            other => TrackingError::RemoteDeliveryFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint_maps_to_configuration_error() {
        let error: TrackingError = RemoteError::InvalidEndpoint("not a url".to_string()).into();
        assert!(matches!(error, TrackingError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_transport_error_maps_to_delivery_failure() {
        let error: TrackingError = RemoteError::Http("connection refused".to_string()).into();
        assert!(matches!(error, TrackingError::RemoteDeliveryFailure(_)));
    }
}
