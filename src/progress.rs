//! Progress hub — the push-channel registry for export jobs
//!
//! A process-wide (but explicitly constructed and injected, never global)
//! registry of open push channels keyed by manuscript id. The hub owns the
//! send side of each registration; the transport layer (the SSE route) owns
//! the receive side and writes events to the network. Broadcasting to all
//! registrations of a job is the only fan-out point in the subsystem.
//!
//! Delivery is best-effort: a closed sink is silently unregistered, a full
//! sink drops that one event, and nothing is buffered or replayed. Events
//! for a single job reach each sink in publish order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::ProgressConfig;
use crate::types::{ManuscriptId, ProgressEvent};

type RegistrationMap = Arc<tokio::sync::Mutex<HashMap<String, mpsc::Sender<ProgressEvent>>>>;

/// Registry of open progress push-channels
///
/// Cloneable (all state is Arc-wrapped); construct once at process start and
/// inject wherever progress is published or observed.
#[derive(Clone)]
pub struct ProgressHub {
    registrations: RegistrationMap,
    next_registration: Arc<AtomicU64>,
    heartbeat_interval: Duration,
    teardown_grace: Duration,
    channel_capacity: usize,
}

impl ProgressHub {
    /// Create a hub with the given push-channel settings
    pub fn new(config: &ProgressConfig) -> Self {
        Self {
            registrations: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            next_registration: Arc::new(AtomicU64::new(1)),
            heartbeat_interval: config.heartbeat_interval,
            teardown_grace: config.teardown_grace,
            channel_capacity: config.channel_capacity.max(1),
        }
    }

    /// Open a push channel for a manuscript's export.
    ///
    /// Returns the registration id and the receive side of the channel. A
    /// `connection` event is queued immediately, and a heartbeat task keeps
    /// the channel alive until the registration is removed.
    pub async fn register(
        &self,
        manuscript_id: &ManuscriptId,
    ) -> (String, mpsc::Receiver<ProgressEvent>) {
        let seq = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let registration_id = format!("{}_{}", manuscript_id, seq);

        let (tx, rx) = mpsc::channel(self.channel_capacity);

        // The channel is empty at this point, so the connection event
        // always fits.
        tx.try_send(ProgressEvent::Connection {
            manuscript_id: manuscript_id.clone(),
            connection_id: registration_id.clone(),
            timestamp: chrono::Utc::now(),
        })
        .ok();

        {
            let mut registrations = self.registrations.lock().await;
            registrations.insert(registration_id.clone(), tx);
        }

        tracing::debug!(
            manuscript_id = %manuscript_id,
            registration_id = %registration_id,
            "progress channel registered"
        );

        self.spawn_heartbeat(registration_id.clone());

        (registration_id, rx)
    }

    /// Publish an event to every registration of the manuscript.
    ///
    /// Closed sinks are pruned; a terminal event schedules teardown of the
    /// job's remaining registrations after the grace delay so the final
    /// event can be observed before the channels disappear.
    pub async fn broadcast(&self, manuscript_id: &ManuscriptId, event: ProgressEvent) {
        let prefix = format!("{}_", manuscript_id);
        let mut dead = Vec::new();

        {
            let registrations = self.registrations.lock().await;
            for (id, tx) in registrations.iter().filter(|(id, _)| id.starts_with(&prefix)) {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id.clone()),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        // Slow consumer; best-effort delivery drops the event
                        tracing::debug!(
                            registration_id = %id,
                            "progress channel full, dropping event"
                        );
                    }
                }
            }
        }

        if !dead.is_empty() {
            let mut registrations = self.registrations.lock().await;
            for id in dead {
                registrations.remove(&id);
                tracing::debug!(registration_id = %id, "pruned closed progress channel");
            }
        }

        if event.is_terminal() {
            self.schedule_teardown(prefix);
        }
    }

    /// Remove a registration explicitly (peer disconnected)
    pub async fn unregister(&self, registration_id: &str) {
        let mut registrations = self.registrations.lock().await;
        if registrations.remove(registration_id).is_some() {
            tracing::debug!(registration_id = %registration_id, "progress channel unregistered");
        }
    }

    /// Guard that unregisters `registration_id` when dropped. Tie it to the
    /// lifetime of the transport stream so a peer disconnect frees the
    /// channel immediately instead of waiting for write-failure pruning.
    pub fn drop_guard(&self, registration_id: &str) -> RegistrationGuard {
        RegistrationGuard {
            registrations: self.registrations.clone(),
            registration_id: registration_id.to_string(),
        }
    }

    /// Number of open registrations for a manuscript
    pub async fn connection_count(&self, manuscript_id: &ManuscriptId) -> usize {
        let prefix = format!("{}_", manuscript_id);
        let registrations = self.registrations.lock().await;
        registrations
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .count()
    }

    /// Spawn the per-registration heartbeat task. It stops when the
    /// registration disappears or the receiver is dropped.
    fn spawn_heartbeat(&self, registration_id: String) {
        let registrations = self.registrations.clone();
        let interval = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so heartbeats start
            // one interval after registration.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let mut registrations = registrations.lock().await;
                let Some(tx) = registrations.get(&registration_id) else {
                    break;
                };

                match tx.try_send(ProgressEvent::Heartbeat {
                    timestamp: chrono::Utc::now(),
                }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        registrations.remove(&registration_id);
                        tracing::debug!(
                            registration_id = %registration_id,
                            "heartbeat failed, unregistering channel"
                        );
                        break;
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                }
            }
        });
    }

    /// Tear down all of a job's registrations after the grace delay
    fn schedule_teardown(&self, prefix: String) {
        let registrations = self.registrations.clone();
        let grace = self.teardown_grace;

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let mut registrations = registrations.lock().await;
            let stale: Vec<String> = registrations
                .keys()
                .filter(|id| id.starts_with(&prefix))
                .cloned()
                .collect();
            for id in stale {
                registrations.remove(&id);
                tracing::debug!(registration_id = %id, "progress channel torn down");
            }
        });
    }
}

/// Unregisters its progress channel on drop.
///
/// Unregistration needs the registry lock, so Drop hands the removal to a
/// spawned task; outside a runtime the registration is left to broadcast-time
/// pruning instead.
pub struct RegistrationGuard {
    registrations: RegistrationMap,
    registration_id: String,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        let registrations = self.registrations.clone();
        let registration_id = std::mem::take(&mut self.registration_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if registrations.lock().await.remove(&registration_id).is_some() {
                    tracing::debug!(
                        registration_id = %registration_id,
                        "progress channel unregistered on stream drop"
                    );
                }
            });
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProgressEvent;

    fn fast_config() -> ProgressConfig {
        ProgressConfig {
            heartbeat_interval: Duration::from_millis(50),
            teardown_grace: Duration::from_millis(50),
            channel_capacity: 16,
        }
    }

    fn progress_event(manuscript_id: &ManuscriptId, progress: u8) -> ProgressEvent {
        ProgressEvent::Progress {
            manuscript_id: manuscript_id.clone(),
            progress,
            status: format!("step {progress}"),
            total_files: None,
            downloaded_files: None,
            current_file: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn registration_receives_connection_event_first() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (registration_id, mut rx) = hub.register(&id).await;

        match rx.recv().await.unwrap() {
            ProgressEvent::Connection {
                manuscript_id,
                connection_id,
                ..
            } => {
                assert_eq!(manuscript_id, id);
                assert_eq!(connection_id, registration_id);
            }
            other => panic!("expected connection event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_registrations_observe_the_same_ordered_sequence() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (_, mut rx_a) = hub.register(&id).await;
        let (_, mut rx_b) = hub.register(&id).await;

        // Drain the per-channel connection events
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        for progress in [10, 40, 70] {
            hub.broadcast(&id, progress_event(&id, progress)).await;
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for expected in [10u8, 40, 70] {
                match rx.recv().await.unwrap() {
                    ProgressEvent::Progress { progress, .. } => assert_eq!(progress, expected),
                    other => panic!("expected progress event, got {other:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn broadcast_is_scoped_to_the_manuscript() {
        let hub = ProgressHub::new(&fast_config());
        let a = ManuscriptId::new("MS-A");
        let b = ManuscriptId::new("MS-B");

        let (_, mut rx_a) = hub.register(&a).await;
        let (_, mut rx_b) = hub.register(&b).await;
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        hub.broadcast(&a, progress_event(&a, 50)).await;

        assert!(matches!(
            rx_a.recv().await.unwrap(),
            ProgressEvent::Progress { .. }
        ));
        // B saw nothing
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_sink_is_pruned_on_broadcast() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (_, rx) = hub.register(&id).await;
        assert_eq!(hub.connection_count(&id).await, 1);

        drop(rx);
        hub.broadcast(&id, progress_event(&id, 10)).await;

        assert_eq!(hub.connection_count(&id).await, 0);
    }

    #[tokio::test]
    async fn terminal_event_tears_channels_down_after_grace() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (_, mut rx) = hub.register(&id).await;
        rx.recv().await.unwrap();

        hub.broadcast(
            &id,
            ProgressEvent::Complete {
                manuscript_id: id.clone(),
                progress: 100,
                status: "done".to_string(),
                total_files: 3,
                downloaded_files: 3,
                archive_name: "MS-1_0.zip".to_string(),
                timestamp: chrono::Utc::now(),
            },
        )
        .await;

        // The terminal event is still observable before teardown
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::Complete { .. }
        ));
        assert_eq!(hub.connection_count(&id).await, 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hub.connection_count(&id).await, 0);
    }

    #[tokio::test]
    async fn heartbeat_reaches_idle_observers() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (_, mut rx) = hub.register(&id).await;
        rx.recv().await.unwrap(); // connection

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("heartbeat within a second")
            .unwrap();
        assert!(matches!(event, ProgressEvent::Heartbeat { .. }));
    }

    #[tokio::test]
    async fn drop_guard_unregisters_the_channel() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (registration_id, _rx) = hub.register(&id).await;
        let guard = hub.drop_guard(&registration_id);
        assert_eq!(hub.connection_count(&id).await, 1);

        drop(guard);
        // Removal runs on a spawned task
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.connection_count(&id).await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_the_channel() {
        let hub = ProgressHub::new(&fast_config());
        let id = ManuscriptId::new("MS-1");

        let (registration_id, _rx) = hub.register(&id).await;
        assert_eq!(hub.connection_count(&id).await, 1);

        hub.unregister(&registration_id).await;
        assert_eq!(hub.connection_count(&id).await, 0);
    }
}
