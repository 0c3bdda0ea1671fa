//! Location update handler - the reactive core of the pipeline.
//!
//! Invoked once per batch of raw samples consumed from the provider
//! channel. For each batch it chooses one of:
//!
//! - **final flush** - the hard session deadline has passed: deliver
//!   everything, bypassing the policy, and tell the controller to stop;
//! - **immediate flush** - the batching threshold is reached: deliver via
//!   the configured sink (the remote path is gated on reachability);
//! - **local buffering** - persist the batch to the durable queue for a
//!   later flush (unless offline samples are configured to be dropped).
//!
//! Side effects never propagate back into ingestion: store and delivery
//! failures are published on the event bus and the session keeps running.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::batching::{should_flush, LocationSnapshot};
use crate::error::TrackingError;
use crate::events::TrackingEventBus;
use crate::options::TrackingOptions;
use crate::position::{Coordinates, Position, RawSample};
use crate::reachability::ReachabilityMonitor;
use crate::store::{LocationQueue, SessionState, SessionStateStore};
use crate::uploader::BatchUploader;

/// What the controller should do after a batch was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Keep ingesting.
    Continue,
    /// The hard deadline passed; a final flush was issued and the session
    /// must stop.
    DeadlineReached,
}

/// Per-batch decision logic over the injected collaborators.
pub struct LocationUpdateHandler {
    options: Arc<RwLock<TrackingOptions>>,
    session_store: Arc<dyn SessionStateStore>,
    queue: Arc<dyn LocationQueue>,
    uploader: Arc<BatchUploader>,
    reachability: Arc<dyn ReachabilityMonitor>,
    events: TrackingEventBus,
}

impl LocationUpdateHandler {
    /// Wire up a handler.
    pub fn new(
        options: Arc<RwLock<TrackingOptions>>,
        session_store: Arc<dyn SessionStateStore>,
        queue: Arc<dyn LocationQueue>,
        uploader: Arc<BatchUploader>,
        reachability: Arc<dyn ReachabilityMonitor>,
        events: TrackingEventBus,
    ) -> Self {
        Self {
            options,
            session_store,
            queue,
            uploader,
            reachability,
            events,
        }
    }

    /// Handle one batch of raw samples.
    pub fn handle_samples(&self, samples: Vec<RawSample>) -> HandlerOutcome {
        let (Some(first_sample), Some(last_sample)) = (samples.first(), samples.last()) else {
            return HandlerOutcome::Continue;
        };
        let first_location = first_sample.coordinates();
        let last_location = last_sample.coordinates();

        let now = Utc::now();
        let options = self.options.read().unwrap().clone();

        // A position is never fabricated without a device identifier
        let mut session = match self.session_store.get() {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::error!("No session state while handling samples; batch dropped");
                self.events.publish_save_failure(
                    TrackingError::MissingDeviceIdentifier,
                    sample_coordinates(&samples),
                );
                return HandlerOutcome::Continue;
            }
            Err(e) => {
                self.events
                    .publish_save_failure(e.into(), sample_coordinates(&samples));
                return HandlerOutcome::Continue;
            }
        };

        // Hard deadline: final delivery bypassing the policy, then stop
        if now >= options.track_until {
            tracing::info!(deadline = %options.track_until, "Session deadline reached");
            let positions = map_to_positions(&samples, now, &options, &session);
            self.deliver(positions, &options);
            return HandlerOutcome::DeadlineReached;
        }

        let old = LocationSnapshot {
            timestamp: session.last_flush_time,
            location: session.last_delivered_location,
        };
        let new = LocationSnapshot::new(now, last_location);

        if should_flush(&old, &new, &options.batching_policy) {
            let positions = map_to_positions(&samples, now, &options, &session);
            self.deliver(positions, &options);
            // Stamped regardless of which delivery sub-path ran, so the
            // policy window restarts even while offline
            session.last_flush_time = Some(now);
        } else if options.disregard_updates_when_offline && !self.reachability.is_connected() {
            tracing::debug!(dropped = samples.len(), "Offline; samples disregarded");
        } else {
            let positions = map_to_positions(&samples, now, &options, &session);
            self.buffer(positions);
        }

        // First update in a session establishes the comparison baseline
        if session.last_flush_time.is_none() {
            session.last_flush_time = Some(now);
        }
        session.last_delivered_location = Some(if session.last_delivered_location.is_none() {
            first_location
        } else {
            last_location
        });

        if let Err(e) = self.session_store.put(session) {
            self.events.publish_save_failure(e.into(), vec![]);
        }

        HandlerOutcome::Continue
    }

    /// Route a flush to the sink.
    ///
    /// A local delegate always receives the set; the remote path is gated
    /// on reachability - when offline the set is buffered instead (or
    /// dropped under `disregard_updates_when_offline`).
    fn deliver(&self, positions: Vec<Position>, options: &TrackingOptions) {
        if positions.is_empty() {
            return;
        }
        if options.local_delegate.is_some() || self.reachability.is_connected() {
            let _ = self.uploader.flush(positions);
        } else if options.disregard_updates_when_offline {
            tracing::debug!(dropped = positions.len(), "Offline; flush disregarded");
        } else {
            self.buffer(positions);
        }
    }

    /// Persist positions to the durable queue on a spawned task.
    fn buffer(&self, positions: Vec<Position>) {
        if positions.is_empty() {
            return;
        }
        let queue = Arc::clone(&self.queue);
        let events = self.events.clone();
        tokio::spawn(async move {
            let locations: Vec<Coordinates> = positions.iter().map(|p| p.location).collect();
            if let Err(e) = queue.insert(positions) {
                events.publish_save_failure(TrackingError::LocalStoreFailure(e.to_string()), locations);
            }
        });
    }
}

fn sample_coordinates(samples: &[RawSample]) -> Vec<Coordinates> {
    samples.iter().map(RawSample::coordinates).collect()
}

fn map_to_positions(
    samples: &[RawSample],
    now: DateTime<Utc>,
    options: &TrackingOptions,
    session: &SessionState,
) -> Vec<Position> {
    samples
        .iter()
        .map(|s| Position::from_sample(s, now, &options.tracker_name, &session.device_id))
        .collect()
}
