//! Integration tests for the device tracking pipeline.
//!
//! These tests verify the complete flows through a wired-up
//! [`DeviceTracker`]:
//!
//! - Provider samples -> update handler -> buffering -> threshold flush
//! - Offline buffering -> reconnection -> stop-time delivery
//! - Chunked remote delivery with independent per-chunk failures
//! - Session lifecycle: permissions, sign-out, deadline
//!
//! Run with: `cargo test --test device_tracking_integration`

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use geotrack::{
    AuthorizationMode, AuthorizationStatus, BatchUpdateRequest, BatchUpdateResponse,
    BatchingPolicy, DeviceTracker, LocationProvider, MemoryLocationQueue, MemorySessionStore,
    ProviderEvent, ProviderSettings, RawSample, RemoteClient, RemoteError, SessionStateStore,
    StaticReachability, TrackingError, TrackingEventBus, TrackingOptions,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Scripted location provider pushing events over a broadcast channel.
struct ScriptedProvider {
    status: Mutex<AuthorizationStatus>,
    tx: broadcast::Sender<ProviderEvent>,
}

impl ScriptedProvider {
    fn authorized() -> Arc<Self> {
        let (tx, _) = broadcast::channel(64);
        Arc::new(Self {
            status: Mutex::new(AuthorizationStatus::Authorized),
            tx,
        })
    }

    fn send_samples(&self, samples: Vec<RawSample>) {
        let _ = self.tx.send(ProviderEvent::Samples(samples));
    }
}

impl LocationProvider for ScriptedProvider {
    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap()
    }

    fn request_authorization(&self, _mode: AuthorizationMode) {}

    fn start_updating(&self) {}

    fn stop_updating(&self) {}

    fn start_significant_change_monitoring(&self) {}

    fn stop_significant_change_monitoring(&self) {}

    fn configure(&self, _settings: ProviderSettings) {}

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.tx.subscribe()
    }
}

/// Remote client recording requests; optionally fails matching chunks.
struct RecordingRemote {
    requests: Mutex<Vec<BatchUpdateRequest>>,
    fail_when: Box<dyn Fn(&BatchUpdateRequest) -> bool + Send + Sync>,
}

impl RecordingRemote {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail_when: Box::new(|_| false),
        })
    }

    fn failing_when(
        fail_when: impl Fn(&BatchUpdateRequest) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail_when: Box::new(fail_when),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn total_updates(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.updates.len())
            .sum()
    }
}

impl RemoteClient for RecordingRemote {
    fn batch_update_device_position(
        &self,
        request: BatchUpdateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BatchUpdateResponse, RemoteError>> + Send + '_>> {
        let fail = (self.fail_when)(&request);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move {
            if fail {
                Err(RemoteError::Http("connection reset".to_string()))
            } else {
                Ok(BatchUpdateResponse::default())
            }
        })
    }
}

struct Pipeline {
    tracker: Arc<DeviceTracker>,
    provider: Arc<ScriptedProvider>,
    remote: Arc<RecordingRemote>,
    reachability: Arc<StaticReachability>,
    session_store: Arc<MemorySessionStore>,
    queue: Arc<MemoryLocationQueue>,
    events: TrackingEventBus,
}

/// Wire a full remote-backed pipeline over in-memory stores.
fn build_pipeline(options: TrackingOptions, remote: Arc<RecordingRemote>) -> Pipeline {
    let provider = ScriptedProvider::authorized();
    let reachability = Arc::new(StaticReachability::new(true));
    let session_store = Arc::new(MemorySessionStore::new());
    let queue = Arc::new(MemoryLocationQueue::new());
    let events = TrackingEventBus::new();

    let tracker = Arc::new(
        DeviceTracker::new(
            options,
            provider.clone(),
            reachability.clone(),
            session_store.clone(),
            queue.clone(),
            Some(remote.clone()),
            events.clone(),
        )
        .unwrap(),
    );

    Pipeline {
        tracker,
        provider,
        remote,
        reachability,
        session_store,
        queue,
        events,
    }
}

/// Poll until `check` passes or a generous timeout expires.
async fn wait_for(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Threshold-driven delivery
// ============================================================================

#[tokio::test]
async fn distance_threshold_flushes_buffered_and_new_positions() {
    let mut options = TrackingOptions::new("fleet");
    options.batching_policy = BatchingPolicy::DistanceMeters(100.0);

    let p = build_pipeline(options, RecordingRemote::succeeding());
    p.tracker.start_tracking("device-42").unwrap();

    // First batch establishes the baseline and buffers locally
    p.provider.send_samples(vec![RawSample::new(0.0, 0.0)]);
    wait_for(|| p.queue.len() == 1).await;
    assert_eq!(p.remote.request_count(), 0);

    // ~111m east: the threshold fires and everything goes out together
    p.provider.send_samples(vec![RawSample::new(0.0, 0.001)]);
    wait_for(|| p.remote.request_count() == 1).await;

    let requests = p.remote.requests.lock().unwrap();
    assert_eq!(requests[0].tracker_name, "fleet");
    assert_eq!(requests[0].updates.len(), 2, "buffered + fresh");
    assert!(requests[0]
        .updates
        .iter()
        .all(|u| u.device_id == "device-42"));
    drop(requests);

    wait_for(|| p.queue.is_empty()).await;

    let session = p.session_store.get().unwrap().unwrap();
    assert!(session.last_flush_time.is_some());

    p.tracker.stop_tracking();
}

// ============================================================================
// Offline behavior
// ============================================================================

#[tokio::test]
async fn offline_samples_buffer_and_deliver_on_stop() {
    let p = build_pipeline(TrackingOptions::new("fleet"), RecordingRemote::succeeding());
    p.tracker.start_tracking("device-42").unwrap();
    p.reachability.set_connected(false);

    p.provider.send_samples(vec![RawSample::new(1.0, 1.0)]);
    p.provider.send_samples(vec![RawSample::new(2.0, 2.0)]);
    wait_for(|| p.queue.len() == 2).await;
    assert_eq!(p.remote.request_count(), 0);

    // Connectivity returns; stop drains the queue to the remote sender
    p.reachability.set_connected(true);
    p.tracker.stop_tracking();

    wait_for(|| p.remote.request_count() == 1).await;
    assert_eq!(p.remote.total_updates(), 2);
    assert_eq!(p.session_store.get().unwrap(), None);
}

#[tokio::test]
async fn offline_with_disregard_drops_without_error() {
    let mut options = TrackingOptions::new("fleet");
    options.disregard_updates_when_offline = true;

    let p = build_pipeline(options, RecordingRemote::succeeding());
    let mut failures = p.events.subscribe_save_failures();
    p.tracker.start_tracking("device-42").unwrap();
    p.reachability.set_connected(false);

    p.provider.send_samples(vec![RawSample::new(1.0, 1.0)]);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(p.queue.is_empty(), "neither persisted nor delivered");
    assert_eq!(p.remote.request_count(), 0);
    assert!(matches!(
        failures.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    p.tracker.stop_tracking();
}

// ============================================================================
// Chunked remote delivery
// ============================================================================

#[tokio::test]
async fn stop_delivers_large_backlog_in_independent_chunks() {
    let p = build_pipeline(TrackingOptions::new("fleet"), RecordingRemote::succeeding());
    p.tracker.start_tracking("device-42").unwrap();

    // 25 positions buffered under the default (never-flush) policy
    for batch in 0..5 {
        let samples = (0..5)
            .map(|i| RawSample::new((batch * 5 + i) as f64, 0.0))
            .collect();
        p.provider.send_samples(samples);
    }
    wait_for(|| p.queue.len() == 25).await;

    p.tracker.stop_tracking();
    wait_for(|| p.remote.request_count() == 3).await;

    let mut sizes: Vec<usize> = p
        .remote
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.updates.len())
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![5, 10, 10]);
    assert_eq!(p.remote.total_updates(), 25);
}

#[tokio::test]
async fn failed_chunk_reports_only_its_own_positions() {
    // Fail the chunk whose first latitude is 10 (the second of three)
    let remote = RecordingRemote::failing_when(|request| {
        (request.updates[0].position[1] - 10.0).abs() < f64::EPSILON
    });
    let p = build_pipeline(TrackingOptions::new("fleet"), remote);
    let mut failures = p.events.subscribe_save_failures();
    p.tracker.start_tracking("device-42").unwrap();

    for batch in 0..5 {
        let samples = (0..5)
            .map(|i| RawSample::new((batch * 5 + i) as f64, 0.0))
            .collect();
        p.provider.send_samples(samples);
    }
    wait_for(|| p.queue.len() == 25).await;

    p.tracker.stop_tracking();
    wait_for(|| p.remote.request_count() == 3).await;

    let event = tokio::time::timeout(Duration::from_secs(5), failures.recv())
        .await
        .expect("expected one failure event")
        .unwrap();
    assert!(matches!(
        event.error,
        TrackingError::RemoteDeliveryFailure(_)
    ));
    assert_eq!(event.locations.len(), 10);

    // The other two chunks reported no failure
    assert!(matches!(
        failures.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn sign_out_force_stops_tracking() {
    let p = build_pipeline(TrackingOptions::new("fleet"), RecordingRemote::succeeding());
    p.tracker.start_tracking("device-42").unwrap();

    p.provider.send_samples(vec![RawSample::new(1.0, 1.0)]);
    wait_for(|| p.queue.len() == 1).await;

    p.events.notify_signed_out();
    wait_for(|| !p.tracker.is_active()).await;

    // The stop flush pushed the buffered position out
    wait_for(|| p.remote.request_count() == 1).await;
    assert_eq!(p.session_store.get().unwrap(), None);
}

#[tokio::test]
async fn deadline_triggers_final_flush_then_stop() {
    let mut options = TrackingOptions::new("fleet");
    options.track_until = chrono::Utc::now() + chrono::Duration::milliseconds(200);

    let p = build_pipeline(options, RecordingRemote::succeeding());
    p.tracker.start_tracking("device-42").unwrap();

    // Before the deadline: buffers
    p.provider.send_samples(vec![RawSample::new(1.0, 1.0)]);
    wait_for(|| p.queue.len() == 1).await;

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Past the deadline: final delivery of buffered + new, then stop
    p.provider.send_samples(vec![RawSample::new(2.0, 2.0)]);
    wait_for(|| !p.tracker.is_active()).await;
    wait_for(|| p.remote.total_updates() == 2).await;
    assert_eq!(p.session_store.get().unwrap(), None);

    // Ingestion has stopped: further samples go nowhere
    p.provider.send_samples(vec![RawSample::new(3.0, 3.0)]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(p.queue.is_empty());
    assert_eq!(p.remote.total_updates(), 2);
}
