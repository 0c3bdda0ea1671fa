//! Location provider collaborator.
//!
//! The underlying sensing stack is externally owned and push-based, so it
//! is modeled as a trait plus a broadcast channel: implementations deliver
//! [`ProviderEvent`]s (sample batches, authorization changes and runtime
//! failures) to whoever subscribed, and the session controller consumes
//! them on its ingest loop. The callback context therefore never executes pipeline
//! work - publishing to the channel is all a provider does.

use tokio::sync::broadcast;

use crate::options::AccuracyClass;
use crate::position::RawSample;

/// Authorization state reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    Undetermined,
    /// Location access granted (always or when-in-use).
    Authorized,
    /// Location access restricted or denied; tracking cannot run.
    RestrictedOrDenied,
}

/// Which authorization level to request from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMode {
    /// Request background ("always") authorization.
    Always,
    /// Request foreground ("when in use") authorization.
    WhenInUse,
}

/// Provider-facing knobs taken from the session options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderSettings {
    /// Requested positioning accuracy.
    pub desired_accuracy: AccuracyClass,

    /// Minimum movement in meters before a sample is reported.
    pub distance_filter_m: f64,
}

/// A runtime failure reported by the provider.
///
/// Most failures are transient (no fix yet, interrupted hardware) and the
/// session keeps running. A failure that means location access was revoked
/// sets `access_denied` and ends the session.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    /// Provider-supplied description.
    pub message: String,

    /// Whether the failure means location access is denied.
    pub access_denied: bool,
}

/// Events pushed by a location provider.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A batch of raw positional samples.
    Samples(Vec<RawSample>),

    /// The authorization state changed.
    AuthorizationChanged(AuthorizationStatus),

    /// The provider failed to produce updates.
    Failure(ProviderFailure),
}

/// The ambient location-sensing collaborator.
///
/// Implemented per target platform; this crate only drives the lifecycle
/// and consumes the event stream.
pub trait LocationProvider: Send + Sync {
    /// Current authorization state.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user for location access. The answer arrives later as an
    /// [`ProviderEvent::AuthorizationChanged`] event.
    fn request_authorization(&self, mode: AuthorizationMode);

    /// Start continuous location updates.
    fn start_updating(&self);

    /// Stop continuous location updates.
    fn stop_updating(&self);

    /// Start the low-power significant-change mode.
    fn start_significant_change_monitoring(&self);

    /// Stop the low-power significant-change mode.
    fn stop_significant_change_monitoring(&self);

    /// Apply accuracy / distance-filter settings to the live provider.
    fn configure(&self, settings: ProviderSettings);

    /// Subscribe to sample and authorization events.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
