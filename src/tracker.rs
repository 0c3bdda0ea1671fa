//! Tracking session controller.
//!
//! [`DeviceTracker`] owns the session lifecycle: it wires the provider,
//! reachability monitor, stores, uploader and handler together, runs the
//! permission state machine, and consumes provider events on a single
//! ingest loop so the provider's callback context never executes pipeline
//! work.
//!
//! # Lifecycle
//!
//! - `start_tracking(device_id)` - creates fresh session state, starts the
//!   reachability monitor, spawns the ingest loop and resolves the current
//!   authorization state.
//! - `stop_tracking()` - final flush of buffered positions, stops the
//!   provider and monitor, clears session state. Idempotent; never cancels
//!   chunk uploads already dispatched.
//! - `reconfigure(options)` - pushes new accuracy / distance-filter
//!   settings to the live provider without restarting the session.
//!
//! # Permission state machine
//!
//! `Undetermined -> {Authorized, RestrictedOrDenied}`, re-evaluated on
//! every authorization-change event, not only at start. `Authorized`
//! starts continuous updates (plus significant-change monitoring when
//! configured); `RestrictedOrDenied` stops the session with
//! [`TrackingError::MissingPermissions`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, Notify};

use crate::error::TrackingError;
use crate::events::TrackingEventBus;
use crate::handler::{HandlerOutcome, LocationUpdateHandler};
use crate::options::TrackingOptions;
use crate::provider::{
    AuthorizationMode, AuthorizationStatus, LocationProvider, ProviderEvent, ProviderSettings,
};
use crate::reachability::ReachabilityMonitor;
use crate::remote::RemoteClient;
use crate::store::{LocationQueue, SessionState, SessionStateStore};
use crate::uploader::{BatchUploader, LocalCallbackSink, PositionSink, RemoteSink};

/// Owns a device-tracking session end to end.
pub struct DeviceTracker {
    options: Arc<RwLock<TrackingOptions>>,
    provider: Arc<dyn LocationProvider>,
    reachability: Arc<dyn ReachabilityMonitor>,
    session_store: Arc<dyn SessionStateStore>,
    uploader: Arc<BatchUploader>,
    handler: LocationUpdateHandler,
    events: TrackingEventBus,
    active: AtomicBool,
    stop_notify: Notify,
}

impl DeviceTracker {
    /// Wire up a tracker.
    ///
    /// The delivery sink is selected here, once: a configured local
    /// delegate wins, otherwise the remote client is used. Configuring
    /// neither is a configuration error, surfaced synchronously.
    pub fn new(
        options: TrackingOptions,
        provider: Arc<dyn LocationProvider>,
        reachability: Arc<dyn ReachabilityMonitor>,
        session_store: Arc<dyn SessionStateStore>,
        queue: Arc<dyn LocationQueue>,
        remote: Option<Arc<dyn RemoteClient>>,
        events: TrackingEventBus,
    ) -> Result<Self, TrackingError> {
        let sink: Arc<dyn PositionSink> = if let Some(delegate) = options.local_delegate.clone() {
            Arc::new(LocalCallbackSink::new(delegate))
        } else if let Some(client) = remote {
            Arc::new(RemoteSink::new(
                client,
                options.tracker_name.clone(),
                events.clone(),
            ))
        } else {
            return Err(TrackingError::InvalidConfiguration(
                "neither a local delegate nor a remote client is configured".to_string(),
            ));
        };

        provider.configure(ProviderSettings {
            desired_accuracy: options.desired_accuracy,
            distance_filter_m: options.distance_filter_m,
        });

        let options = Arc::new(RwLock::new(options));
        let uploader = Arc::new(BatchUploader::new(
            Arc::clone(&queue),
            sink,
            events.clone(),
        ));
        let handler = LocationUpdateHandler::new(
            Arc::clone(&options),
            Arc::clone(&session_store),
            queue,
            Arc::clone(&uploader),
            Arc::clone(&reachability),
            events.clone(),
        );

        Ok(Self {
            options,
            provider,
            reachability,
            session_store,
            uploader,
            handler,
            events,
            active: AtomicBool::new(false),
            stop_notify: Notify::new(),
        })
    }

    /// Start tracking the given device.
    ///
    /// Clears any stale session state, starts the reachability monitor,
    /// subscribes to provider and sign-out events, and runs the permission
    /// state machine. Fails if a session is already active, if session
    /// state cannot be persisted, or if authorization is denied.
    pub fn start_tracking(self: &Arc<Self>, device_id: &str) -> Result<(), TrackingError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TrackingError::SessionAlreadyActive);
        }

        tracing::info!(
            device_id,
            tracker = %self.options.read().unwrap().tracker_name,
            "Starting tracking session"
        );

        self.reachability.start();

        let persisted = self
            .session_store
            .clear()
            .and_then(|()| self.session_store.put(SessionState::new(device_id)));
        if let Err(e) = persisted {
            self.active.store(false, Ordering::SeqCst);
            self.reachability.cancel();
            return Err(e.into());
        }

        self.spawn_ingest_loop();

        self.apply_authorization(self.provider.authorization_status())
    }

    /// Stop the session.
    ///
    /// Performs one final flush of buffered positions (already-dispatched
    /// chunk uploads keep running), stops the provider modes and the
    /// reachability monitor, and clears session state. Safe to call twice.
    pub fn stop_tracking(&self) {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        tracing::info!("Stopping tracking session");

        let _ = self.uploader.flush(Vec::new());
        self.provider.stop_updating();
        self.provider.stop_significant_change_monitoring();
        self.reachability.cancel();
        if let Err(e) = self.session_store.clear() {
            self.events.publish_save_failure(e.into(), vec![]);
        }
        self.stop_notify.notify_waiters();
    }

    /// Push new settings to the live provider and replace the options used
    /// by subsequent flush decisions.
    ///
    /// Does not restart the session. The delivery sink was selected at
    /// construction; replacing the local delegate requires a new tracker.
    pub fn reconfigure(&self, options: TrackingOptions) {
        self.provider.configure(ProviderSettings {
            desired_accuracy: options.desired_accuracy,
            distance_filter_m: options.distance_filter_m,
        });
        tracing::info!(tracker = %options.tracker_name, "Tracking options reconfigured");
        *self.options.write().unwrap() = options;
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// One step of the permission state machine.
    fn apply_authorization(&self, status: AuthorizationStatus) -> Result<(), TrackingError> {
        match status {
            AuthorizationStatus::Authorized => {
                tracing::info!("Location authorized; starting updates");
                self.provider.start_updating();
                if self.options.read().unwrap().wake_for_significant_changes {
                    self.provider.start_significant_change_monitoring();
                }
                Ok(())
            }
            AuthorizationStatus::Undetermined => {
                let mode = if self.options.read().unwrap().request_always_authorization {
                    AuthorizationMode::Always
                } else {
                    AuthorizationMode::WhenInUse
                };
                tracing::info!(?mode, "Requesting location authorization");
                self.provider.request_authorization(mode);
                Ok(())
            }
            AuthorizationStatus::RestrictedOrDenied => {
                tracing::warn!("Location authorization restricted or denied");
                self.stop_tracking();
                Err(TrackingError::MissingPermissions)
            }
        }
    }

    /// Consume provider events and sign-out notices until the session ends.
    fn spawn_ingest_loop(self: &Arc<Self>) {
        let tracker = Arc::clone(self);
        let mut provider_rx = self.provider.subscribe();
        let mut sign_out_rx = self.events.subscribe_sign_outs();

        tokio::spawn(async move {
            tracing::debug!("Ingest loop started");
            loop {
                if !tracker.is_active() {
                    break;
                }
                tokio::select! {
                    event = provider_rx.recv() => match event {
                        Ok(ProviderEvent::Samples(samples)) => {
                            if !tracker.is_active() {
                                break;
                            }
                            match tracker.handler.handle_samples(samples) {
                                HandlerOutcome::Continue => {}
                                HandlerOutcome::DeadlineReached => {
                                    tracker.stop_tracking();
                                    break;
                                }
                            }
                        }
                        Ok(ProviderEvent::AuthorizationChanged(status)) => {
                            if let Err(e) = tracker.apply_authorization(status) {
                                tracing::error!(error = %e, "Session stopped on authorization change");
                                tracker.events.publish_save_failure(e, vec![]);
                                break;
                            }
                        }
                        Ok(ProviderEvent::Failure(failure)) => {
                            if failure.access_denied {
                                tracing::warn!(
                                    error = %failure.message,
                                    "Provider reported access denied; stopping tracking"
                                );
                                tracker.stop_tracking();
                                tracker
                                    .events
                                    .publish_save_failure(TrackingError::MissingPermissions, vec![]);
                                break;
                            }
                            tracing::error!(error = %failure.message, "Provider failure");
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Provider events dropped; ingest loop lagging");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Provider event channel closed");
                            break;
                        }
                    },
                    notice = sign_out_rx.recv() => {
                        if notice.is_ok() {
                            tracing::info!("Sign-out received; stopping tracking");
                            tracker.stop_tracking();
                            break;
                        }
                    }
                    _ = tracker.stop_notify.notified() => break,
                }
            }
            tracing::debug!("Ingest loop stopped");
        });
    }
}
