//! Tracking session options.
//!
//! [`TrackingOptions`] is fixed once a session starts; `reconfigure` on the
//! controller replaces it wholesale and pushes the provider-facing settings
//! to the live provider. The defaults match a "track until told to stop,
//! deliver on stop" session: no early batching, far-future deadline,
//! offline samples kept.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::batching::BatchingPolicy;
use crate::position::Position;

/// Callback receiving flushed positions instead of the remote sender.
pub type LocalDelegate = Arc<dyn Fn(Vec<Position>) + Send + Sync>;

/// Requested positioning accuracy, mapped by the provider to whatever its
/// platform supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccuracyClass {
    /// Highest accuracy the hardware offers.
    #[default]
    Best,
    /// Within roughly ten meters.
    NearestTenMeters,
    /// Within roughly a hundred meters.
    HundredMeters,
    /// Within roughly a kilometer.
    Kilometer,
    /// Within roughly three kilometers; lowest power draw.
    ThreeKilometers,
}

impl fmt::Display for AccuracyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::NearestTenMeters => write!(f, "10m"),
            Self::HundredMeters => write!(f, "100m"),
            Self::Kilometer => write!(f, "1km"),
            Self::ThreeKilometers => write!(f, "3km"),
        }
    }
}

/// Configuration for a tracking session.
#[derive(Clone)]
pub struct TrackingOptions {
    /// Named remote destination positions are recorded under.
    pub tracker_name: String,

    /// Requested positioning accuracy.
    pub desired_accuracy: AccuracyClass,

    /// Minimum movement in meters before the provider reports a sample.
    pub distance_filter_m: f64,

    /// When buffered positions are flushed early.
    pub batching_policy: BatchingPolicy,

    /// Drop (rather than buffer) samples received while offline.
    pub disregard_updates_when_offline: bool,

    /// Also enable the provider's low-power significant-change mode so the
    /// app is woken for large movements.
    pub wake_for_significant_changes: bool,

    /// Request "always" authorization instead of "when in use".
    pub request_always_authorization: bool,

    /// Hard session deadline: the first batch received at or past this
    /// instant triggers a final flush and stop.
    pub track_until: DateTime<Utc>,

    /// Deliver flushed positions to this callback instead of the remote
    /// sender. Selected once at configuration time.
    pub local_delegate: Option<LocalDelegate>,
}

impl TrackingOptions {
    /// Options for the given tracker with all defaults.
    pub fn new(tracker_name: impl Into<String>) -> Self {
        Self {
            tracker_name: tracker_name.into(),
            ..Self::default()
        }
    }
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            tracker_name: String::new(),
            desired_accuracy: AccuracyClass::default(),
            distance_filter_m: 0.0,
            batching_policy: BatchingPolicy::None,
            disregard_updates_when_offline: false,
            wake_for_significant_changes: false,
            request_always_authorization: false,
            // Effectively "no deadline"
            track_until: Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0).unwrap(),
            local_delegate: None,
        }
    }
}

impl fmt::Debug for TrackingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingOptions")
            .field("tracker_name", &self.tracker_name)
            .field("desired_accuracy", &self.desired_accuracy)
            .field("distance_filter_m", &self.distance_filter_m)
            .field("batching_policy", &self.batching_policy)
            .field(
                "disregard_updates_when_offline",
                &self.disregard_updates_when_offline,
            )
            .field(
                "wake_for_significant_changes",
                &self.wake_for_significant_changes,
            )
            .field(
                "request_always_authorization",
                &self.request_always_authorization,
            )
            .field("track_until", &self.track_until)
            .field("local_delegate", &self.local_delegate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TrackingOptions::new("fleet");

        assert_eq!(options.tracker_name, "fleet");
        assert_eq!(options.batching_policy, BatchingPolicy::None);
        assert!(!options.disregard_updates_when_offline);
        assert!(!options.wake_for_significant_changes);
        assert!(options.local_delegate.is_none());
        // Deadline is far enough out to never fire in practice
        assert!(options.track_until > Utc::now());
    }

    #[test]
    fn test_debug_does_not_panic_with_delegate() {
        let mut options = TrackingOptions::new("fleet");
        options.local_delegate = Some(Arc::new(|_positions| {}));

        let rendered = format!("{options:?}");
        assert!(rendered.contains("local_delegate: true"));
    }
}
