//! Event bus for failure egress and sign-out ingress.
//!
//! The pipeline never throws from inside the ingestion path; steady-state
//! failures are published as [`SaveFailureEvent`]s for external consumers.
//! In the other direction, an application can notify the bus that the user
//! signed out, which force-stops any active tracking session.
//!
//! Built on `tokio::sync::broadcast`; publishing with no subscribers is
//! not an error.

use tokio::sync::broadcast;

use crate::error::TrackingError;
use crate::position::Coordinates;

/// Buffered events per subscriber before older ones are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// A failed attempt to persist or deliver positions.
///
/// Carries the offending locations so consumers can re-queue or report
/// them; this crate itself never retries.
#[derive(Debug, Clone)]
pub struct SaveFailureEvent {
    /// What went wrong.
    pub error: TrackingError,

    /// The locations affected by the failure.
    pub locations: Vec<Coordinates>,
}

/// Shared event bus wiring the pipeline to the surrounding application.
#[derive(Debug, Clone)]
pub struct TrackingEventBus {
    failures: broadcast::Sender<SaveFailureEvent>,
    sign_outs: broadcast::Sender<()>,
}

impl TrackingEventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (failures, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (sign_outs, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            failures,
            sign_outs,
        }
    }

    /// Publish a location-save failure.
    ///
    /// Logged at warn level; dropped silently if nobody is subscribed.
    pub fn publish_save_failure(&self, error: TrackingError, locations: Vec<Coordinates>) {
        tracing::warn!(
            error = %error,
            location_count = locations.len(),
            "Location save failure"
        );
        let _ = self.failures.send(SaveFailureEvent { error, locations });
    }

    /// Subscribe to location-save failures.
    pub fn subscribe_save_failures(&self) -> broadcast::Receiver<SaveFailureEvent> {
        self.failures.subscribe()
    }

    /// Notify the bus that the user signed out.
    ///
    /// An active tracking session subscribed to this topic stops itself.
    pub fn notify_signed_out(&self) {
        let _ = self.sign_outs.send(());
    }

    /// Subscribe to sign-out notifications.
    pub fn subscribe_sign_outs(&self) -> broadcast::Receiver<()> {
        self.sign_outs.subscribe()
    }
}

impl Default for TrackingEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = TrackingEventBus::new();
        bus.publish_save_failure(TrackingError::MissingDeviceIdentifier, vec![]);
        bus.notify_signed_out();
    }

    #[tokio::test]
    async fn test_subscriber_receives_failure() {
        let bus = TrackingEventBus::new();
        let mut rx = bus.subscribe_save_failures();

        bus.publish_save_failure(
            TrackingError::MissingDeviceIdentifier,
            vec![Coordinates::new(1.0, 2.0)],
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.error, TrackingError::MissingDeviceIdentifier);
        assert_eq!(event.locations.len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_notification() {
        let bus = TrackingEventBus::new();
        let mut rx = bus.subscribe_sign_outs();

        bus.notify_signed_out();

        assert!(rx.recv().await.is_ok());
    }
}
