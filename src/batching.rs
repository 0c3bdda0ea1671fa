//! Batching policy evaluation - when does a flush fire?
//!
//! The evaluator is a pure function comparing the last-delivered snapshot
//! against the just-received one:
//!
//! - [`BatchingPolicy::None`] never fires; delivery waits for the hard
//!   session deadline or an explicit stop.
//! - [`BatchingPolicy::DistanceMeters`] fires once the great-circle
//!   distance between the two locations reaches the threshold.
//! - [`BatchingPolicy::SecondsElapsed`] fires once enough wall-clock time
//!   has passed between the two timestamps.
//!
//! A policy cannot fire until a baseline exists: missing operands on the
//! `old` side always yield `false`.

use chrono::{DateTime, Utc};

use crate::position::Coordinates;

/// Mean earth radius in meters (spherical approximation).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Controls how often buffered positions are flushed to their sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchingPolicy {
    /// Never flush early; rely on the session deadline / stop.
    None,

    /// Flush once the device has travelled at least this many meters.
    DistanceMeters(f64),

    /// Flush once at least this many seconds have elapsed since the
    /// last flush.
    SecondsElapsed(i64),
}

/// A transient (time, location) snapshot used for threshold comparison.
///
/// Either side may be absent: the `old` snapshot is built from persisted
/// session state, which is empty until the first update establishes a
/// baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationSnapshot {
    /// When this snapshot was taken.
    pub timestamp: Option<DateTime<Utc>>,

    /// Where the device was.
    pub location: Option<Coordinates>,
}

impl LocationSnapshot {
    /// Create a snapshot with both operands present.
    pub fn new(timestamp: DateTime<Utc>, location: Coordinates) -> Self {
        Self {
            timestamp: Some(timestamp),
            location: Some(location),
        }
    }
}

/// Decide whether the batching threshold has been reached.
///
/// Pure function of its inputs; boundary values (exactly the configured
/// distance or elapsed time) fire.
pub fn should_flush(
    old: &LocationSnapshot,
    new: &LocationSnapshot,
    policy: &BatchingPolicy,
) -> bool {
    match policy {
        BatchingPolicy::None => false,
        BatchingPolicy::DistanceMeters(threshold) => match (old.location, new.location) {
            (Some(from), Some(to)) => haversine_distance_m(&from, &to) >= *threshold,
            _ => false,
        },
        BatchingPolicy::SecondsElapsed(threshold) => match (old.timestamp, new.timestamp) {
            (Some(from), Some(to)) => (to - from).num_seconds() >= *threshold,
            _ => false,
        },
    }
}

/// Great-circle distance between two coordinates in meters.
///
/// Haversine formula over a spherical earth; accurate to ~0.5% which is
/// ample for batching thresholds.
pub fn haversine_distance_m(from: &Coordinates, to: &Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot_at(seconds_ago: i64, location: Coordinates) -> LocationSnapshot {
        LocationSnapshot::new(Utc::now() - Duration::seconds(seconds_ago), location)
    }

    #[test]
    fn test_haversine_one_degree_at_equator() {
        let from = Coordinates::new(0.0, 0.0);
        let to = Coordinates::new(0.0, 1.0);

        let distance = haversine_distance_m(&from, &to);

        // One degree of longitude at the equator is ~111.19 km
        assert!((distance - 111_195.0).abs() < 100.0, "got {distance}");
    }

    #[test]
    fn test_haversine_zero_distance() {
        let point = Coordinates::new(43.6, 1.4);
        assert_eq!(haversine_distance_m(&point, &point), 0.0);
    }

    #[test]
    fn test_policy_none_never_fires() {
        let old = snapshot_at(3600, Coordinates::new(0.0, 0.0));
        let new = snapshot_at(0, Coordinates::new(50.0, 50.0));

        assert!(!should_flush(&old, &new, &BatchingPolicy::None));
    }

    #[test]
    fn test_distance_policy_fires_at_threshold() {
        let from = Coordinates::new(0.0, 0.0);
        let to = Coordinates::new(0.0, 1.0);
        let exact = haversine_distance_m(&from, &to);

        let old = snapshot_at(10, from);
        let new = snapshot_at(0, to);

        // Boundary: exactly the threshold fires
        assert!(should_flush(
            &old,
            &new,
            &BatchingPolicy::DistanceMeters(exact)
        ));
        assert!(should_flush(
            &old,
            &new,
            &BatchingPolicy::DistanceMeters(exact - 1.0)
        ));
        assert!(!should_flush(
            &old,
            &new,
            &BatchingPolicy::DistanceMeters(exact + 1.0)
        ));
    }

    #[test]
    fn test_distance_policy_111m_scenario() {
        // ~111m of longitude movement at the equator against a 100m threshold
        let old = snapshot_at(10, Coordinates::new(0.0, 0.0));
        let new = snapshot_at(0, Coordinates::new(0.0, 0.001));

        assert!(should_flush(&old, &new, &BatchingPolicy::DistanceMeters(100.0)));
    }

    #[test]
    fn test_elapsed_policy_fires_at_threshold() {
        let location = Coordinates::new(0.0, 0.0);
        let old = snapshot_at(10, location);
        let new = snapshot_at(0, location);

        assert!(should_flush(&old, &new, &BatchingPolicy::SecondsElapsed(10)));
        assert!(should_flush(&old, &new, &BatchingPolicy::SecondsElapsed(5)));
        assert!(!should_flush(&old, &new, &BatchingPolicy::SecondsElapsed(11)));
    }

    #[test]
    fn test_missing_baseline_never_fires() {
        let new = snapshot_at(0, Coordinates::new(0.0, 1.0));
        let empty = LocationSnapshot::default();

        assert!(!should_flush(&empty, &new, &BatchingPolicy::DistanceMeters(1.0)));
        assert!(!should_flush(&empty, &new, &BatchingPolicy::SecondsElapsed(0)));
        assert!(!should_flush(&empty, &new, &BatchingPolicy::None));
    }

    #[test]
    fn test_missing_new_operand_never_fires() {
        let old = snapshot_at(100, Coordinates::new(0.0, 0.0));
        let empty = LocationSnapshot::default();

        assert!(!should_flush(&old, &empty, &BatchingPolicy::DistanceMeters(1.0)));
        assert!(!should_flush(&old, &empty, &BatchingPolicy::SecondsElapsed(0)));
    }
}
