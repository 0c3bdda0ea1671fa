//! Batch uploader - drains the local queue and fans out delivery.
//!
//! A flush drains the durable local queue, appends the freshly received
//! positions, and hands the combined set to the configured
//! [`PositionSink`]:
//!
//! - [`LocalCallbackSink`] invokes the application delegate synchronously
//!   with the full set.
//! - [`RemoteSink`] partitions the set into chunks of [`CHUNK_SIZE`] and
//!   dispatches each chunk as an independent tokio task. Chunks are
//!   unordered, independently failable, and never retried: a transport
//!   failure or per-item service error publishes a delivery-failure event
//!   scoped to that chunk's positions only.
//!
//! The sink is selected once at configuration time; `flush` itself is
//! fire-and-forget beyond issuing the work.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::TrackingError;
use crate::events::TrackingEventBus;
use crate::options::LocalDelegate;
use crate::position::{Coordinates, Position};
use crate::remote::{BatchUpdateRequest, DevicePositionUpdate, RemoteClient};
use crate::store::LocationQueue;

/// Positions per remote delivery unit.
pub const CHUNK_SIZE: usize = 10;

/// Where flushed positions go.
pub trait PositionSink: Send + Sync {
    /// Deliver a non-empty set of positions.
    ///
    /// Must not block the caller on network completion; remote work is
    /// spawned.
    fn dispatch(&self, positions: Vec<Position>);
}

/// Sink invoking the application's delegate callback.
pub struct LocalCallbackSink {
    delegate: LocalDelegate,
}

impl LocalCallbackSink {
    /// Wrap a delegate callback.
    pub fn new(delegate: LocalDelegate) -> Self {
        Self { delegate }
    }
}

impl PositionSink for LocalCallbackSink {
    fn dispatch(&self, positions: Vec<Position>) {
        tracing::debug!(count = positions.len(), "Delivering positions to delegate");
        (self.delegate)(positions);
    }
}

/// Sink dispatching chunked batch updates to the remote sender.
pub struct RemoteSink {
    client: Arc<dyn RemoteClient>,
    tracker_name: String,
    events: TrackingEventBus,
}

impl RemoteSink {
    /// Create a sink for the given tracker.
    pub fn new(
        client: Arc<dyn RemoteClient>,
        tracker_name: impl Into<String>,
        events: TrackingEventBus,
    ) -> Self {
        Self {
            client,
            tracker_name: tracker_name.into(),
            events,
        }
    }
}

impl PositionSink for RemoteSink {
    fn dispatch(&self, positions: Vec<Position>) {
        let chunks = positions.len().div_ceil(CHUNK_SIZE);
        tracing::debug!(
            count = positions.len(),
            chunks,
            tracker = %self.tracker_name,
            "Dispatching positions to remote sender"
        );

        for chunk in positions.chunks(CHUNK_SIZE) {
            let chunk = chunk.to_vec();
            let client = Arc::clone(&self.client);
            let tracker_name = self.tracker_name.clone();
            let events = self.events.clone();
            tokio::spawn(async move {
                deliver_chunk(client, tracker_name, chunk, events).await;
            });
        }
    }
}

/// Deliver one chunk; publish a failure event on any error.
async fn deliver_chunk(
    client: Arc<dyn RemoteClient>,
    tracker_name: String,
    chunk: Vec<Position>,
    events: TrackingEventBus,
) {
    let request = BatchUpdateRequest {
        tracker_name,
        updates: chunk.iter().map(DevicePositionUpdate::from).collect(),
    };

    let failure = match client.batch_update_device_position(request).await {
        Ok(response) if response.errors.is_empty() => None,
        Ok(response) => Some(format!(
            "{} of {} updates rejected: {}",
            response.errors.len(),
            chunk.len(),
            response.errors[0].message
        )),
        Err(e) => Some(e.to_string()),
    };

    if let Some(message) = failure {
        let locations: Vec<Coordinates> = chunk.iter().map(|p| p.location).collect();
        events.publish_save_failure(TrackingError::RemoteDeliveryFailure(message), locations);
    }
}

/// Drains the durable local queue and feeds the sink.
pub struct BatchUploader {
    queue: Arc<dyn LocationQueue>,
    sink: Arc<dyn PositionSink>,
    events: TrackingEventBus,
}

impl BatchUploader {
    /// Create an uploader over the given queue and sink.
    pub fn new(
        queue: Arc<dyn LocationQueue>,
        sink: Arc<dyn PositionSink>,
        events: TrackingEventBus,
    ) -> Self {
        Self {
            queue,
            sink,
            events,
        }
    }

    /// Flush: drain the queue, append `new_positions`, dispatch the
    /// combined set if non-empty.
    ///
    /// Runs on a spawned task; the returned handle resolves once the work
    /// has been issued to the sink (not once remote chunks complete).
    pub fn flush(&self, new_positions: Vec<Position>) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let sink = Arc::clone(&self.sink);
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut all = drain_queue(queue.as_ref(), &events);
            all.extend(new_positions);
            if all.is_empty() {
                return;
            }
            sink.dispatch(all);
        })
    }
}

/// Read and clear the queue in one logical step.
///
/// The read and the clear are separate store calls, so two flushes racing
/// here can observe overlapping contents; delivery is best-effort and
/// duplicates are tolerated downstream. A failure on either call publishes
/// a store-failure event and yields nothing, leaving delivery to the new
/// positions only.
fn drain_queue(queue: &dyn LocationQueue, events: &TrackingEventBus) -> Vec<Position> {
    let stored = match queue.get_all() {
        Ok(stored) => stored,
        Err(e) => {
            events.publish_save_failure(TrackingError::LocalStoreFailure(e.to_string()), vec![]);
            return Vec::new();
        }
    };

    if let Err(e) = queue.remove_all() {
        let locations = stored.iter().map(|p| p.location).collect();
        events.publish_save_failure(TrackingError::LocalStoreFailure(e.to_string()), locations);
        return Vec::new();
    }

    stored
}
