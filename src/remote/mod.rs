//! Remote telemetry sender collaborator.
//!
//! Defines the named-tracker batch update wire format, the [`RemoteClient`]
//! trait the uploader dispatches chunks through, and an HTTP reference
//! implementation.

mod client;
mod error;

pub use client::{
    BatchItemError, BatchUpdateRequest, BatchUpdateResponse, DevicePositionUpdate,
    HttpTrackerClient, RemoteClient,
};
pub use error::RemoteError;
