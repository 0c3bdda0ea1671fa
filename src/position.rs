//! Core value types for position tracking.
//!
//! This module defines the data that flows through the pipeline:
//!
//! - [`Coordinates`] - A latitude/longitude pair in degrees
//! - [`RawSample`] - What the location provider delivers
//! - [`Position`] - The unit of delivery: a sample bound to a session
//!
//! These are our own serde types, decoupled from any provider or transport
//! crate. A `Position` is derived once from a raw sample plus session state
//! and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
}

impl Coordinates {
    /// Create a new coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A raw positional sample as delivered by the location provider.
///
/// Carries no session context; the update handler binds it to a device
/// identifier and tracker name to produce a [`Position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,
}

impl RawSample {
    /// Create a new raw sample.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The sample's coordinates.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A tracked position - the unit of delivery.
///
/// Deterministically derived from a raw sample plus the active session's
/// device identifier and tracker name. Serializable so it can sit in the
/// durable local queue between flushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// When the sample batch containing this position was received.
    pub timestamp: DateTime<Utc>,

    /// Where the device was.
    pub location: Coordinates,

    /// The named remote destination this position belongs to.
    pub tracker: String,

    /// The device this position was recorded for.
    ///
    /// Never empty: a position is not fabricated without a device
    /// identifier (the sample is dropped and a failure published instead).
    pub device_id: String,
}

impl Position {
    /// Build a position from a raw sample and session context.
    pub fn from_sample(
        sample: &RawSample,
        timestamp: DateTime<Utc>,
        tracker: &str,
        device_id: &str,
    ) -> Self {
        Self {
            timestamp,
            location: sample.coordinates(),
            tracker: tracker.to_string(),
            device_id: device_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_sample() {
        let sample = RawSample::new(43.6, 1.4);
        let now = Utc::now();

        let position = Position::from_sample(&sample, now, "fleet", "device-1");

        assert_eq!(position.timestamp, now);
        assert_eq!(position.location, Coordinates::new(43.6, 1.4));
        assert_eq!(position.tracker, "fleet");
        assert_eq!(position.device_id, "device-1");
    }

    #[test]
    fn test_position_serde_round_trip() {
        let position = Position {
            timestamp: Utc::now(),
            location: Coordinates::new(-37.05, 142.81),
            tracker: "fleet".to_string(),
            device_id: "device-9".to_string(),
        };

        let json = serde_json::to_string(&position).unwrap();
        let decoded: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, position);
    }
}
