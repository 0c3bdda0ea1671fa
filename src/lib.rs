//! GeoTrack - device-location tracking with batched, offline-tolerant delivery.
//!
//! This library receives positional samples from an ambient location
//! provider, decides per a configurable batching policy whether to forward
//! them immediately or buffer them in a durable local queue, and delivers
//! buffered positions to a remote telemetry endpoint (or a local callback)
//! once a threshold is reached or tracking stops.
//!
//! # Architecture
//!
//! ```text
//! provider -> ingest loop -> update handler -> { policy, reachability }
//!                                           -> { local queue | uploader }
//!                                           -> { remote sender | delegate }
//!                                           -> event bus (failures only)
//! ```
//!
//! The sensing provider, reachability monitor, remote sender and persistence
//! are collaborator traits injected into the [`tracker::DeviceTracker`]; the
//! crate ships file-backed stores, an HTTP remote client, and trivial
//! implementations for the rest.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use geotrack::{
//!     BatchingPolicy, DeviceTracker, FileLocationQueue, FileSessionStore,
//!     HttpTrackerClient, TrackingEventBus, TrackingOptions,
//! };
//!
//! let mut options = TrackingOptions::new("delivery-fleet");
//! options.batching_policy = BatchingPolicy::DistanceMeters(100.0);
//!
//! let client = Arc::new(HttpTrackerClient::new("https://telemetry.example.com")?);
//! let events = TrackingEventBus::new();
//!
//! let tracker = Arc::new(DeviceTracker::new(
//!     options,
//!     platform_provider,             // your LocationProvider
//!     platform_reachability,         // your ReachabilityMonitor
//!     Arc::new(FileSessionStore::new("session.json")),
//!     Arc::new(FileLocationQueue::new("queue.json")),
//!     Some(client),
//!     events.clone(),
//! )?);
//!
//! tracker.start_tracking("device-42")?;
//! // ... later
//! tracker.stop_tracking();
//! ```
//!
//! # Components
//!
//! - [`batching`] - pure flush-threshold evaluation
//! - [`store`] - durable local queue and persisted session state
//! - [`provider`] - location provider collaborator trait
//! - [`reachability`] - connectivity collaborator trait
//! - [`remote`] - batch update wire format and HTTP client
//! - [`uploader`] - queue drain, chunked fan-out, delivery sinks
//! - [`handler`] - per-batch flush/buffer/drop decision
//! - [`tracker`] - session lifecycle and permission state machine
//! - [`events`] - failure egress and sign-out ingress

pub mod batching;
pub mod error;
pub mod events;
pub mod handler;
pub mod options;
pub mod position;
pub mod provider;
pub mod reachability;
pub mod remote;
pub mod store;
pub mod tracker;
pub mod uploader;

pub use batching::{should_flush, BatchingPolicy, LocationSnapshot};
pub use error::TrackingError;
pub use events::{SaveFailureEvent, TrackingEventBus};
pub use handler::{HandlerOutcome, LocationUpdateHandler};
pub use options::{AccuracyClass, LocalDelegate, TrackingOptions};
pub use position::{Coordinates, Position, RawSample};
pub use provider::{
    AuthorizationMode, AuthorizationStatus, LocationProvider, ProviderEvent, ProviderFailure,
    ProviderSettings,
};
pub use reachability::{ReachabilityMonitor, StaticReachability};
pub use remote::{
    BatchUpdateRequest, BatchUpdateResponse, HttpTrackerClient, RemoteClient, RemoteError,
};
pub use store::{
    FileLocationQueue, FileSessionStore, LocationQueue, MemoryLocationQueue, MemorySessionStore,
    SessionState, SessionStateStore, StoreError,
};
pub use tracker::DeviceTracker;
pub use uploader::{BatchUploader, LocalCallbackSink, PositionSink, RemoteSink, CHUNK_SIZE};

/// Version of the GeoTrack library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
