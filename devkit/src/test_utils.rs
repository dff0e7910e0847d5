/*!
Test Harness pour le kernel droidscan

Câble un PresenceTracker et un Scanner sur une FakeGateway, un store mémoire
et un RecordingSink qui conserve chaque événement publié.
*/

use crate::fixtures::DeviceScript;
use crate::gateway_stub::FakeGateway;
use anyhow::Result;
use droidscan_kernel::brands::{BrandRegistry, BrandResolver};
use droidscan_kernel::events::{Event, EventSink, PollingState, ProgressEvent, ScanStage};
use droidscan_kernel::models::TrackedDevice;
use droidscan_kernel::presence::{PollingOptions, PresenceTracker};
use droidscan_kernel::scanner::Scanner;
use droidscan_kernel::store::MemoryScanStore;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Puits d'événements qui enregistre tout, dans l'ordre de publication
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn device_updates(&self) -> Vec<TrackedDevice> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::DeviceUpdate { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::StatusUpdate(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress_stages(&self) -> Vec<ScanStage> {
        self.progress().into_iter().map(|p| p.stage).collect()
    }

    pub fn polling_states(&self) -> Vec<PollingState> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::PollingUpdate(p) => Some(p.state),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        tracing::debug!("[devkit] recorded {:?}", event);
        self.lock().push(event);
    }
}

/// Harness de test complet : doublures + vrais composants du kernel
pub struct TestHarness {
    pub gateway: FakeGateway,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryScanStore>,
    pub tracker: Arc<PresenceTracker>,
    pub scanner: Arc<Scanner>,
}

impl TestHarness {
    /// Intervalles courts (20ms) pour les tests de la boucle de polling
    pub fn new() -> Self {
        Self::with_options(PollingOptions {
            interval: Duration::from_millis(20),
            restart_delay: Duration::from_millis(20),
            max_restarts: 1,
        })
    }

    pub fn with_options(options: PollingOptions) -> Self {
        init_tracing();

        let gateway = FakeGateway::new();
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryScanStore::new());
        let resolver = BrandResolver::new(Arc::new(gateway.clone()), Arc::new(BrandRegistry::with_builtin_brands()));

        let tracker = Arc::new(PresenceTracker::new(
            Arc::new(gateway.clone()),
            resolver.clone(),
            sink.clone(),
            options,
        ));
        let scanner = Arc::new(Scanner::new(Arc::new(gateway.clone()), resolver, store.clone(), sink.clone()));

        Self { gateway, sink, store, tracker, scanner }
    }

    /// Scripte puis branche un appareil (autorisé par défaut)
    pub fn plug(&self, device_id: &str, script: &DeviceScript) -> &Self {
        self.gateway.script(device_id, script).plug(device_id);
        self
    }

    /// Attend qu'une condition devienne vraie (boucle de polling en arrière-plan)
    pub async fn wait_until<F>(&self, what: &str, timeout: Duration, condition: F) -> Result<()>
    where
        F: Fn(&Self) -> bool,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if condition(self) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        anyhow::bail!("timeout waiting for {what}");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs visibles avec `cargo test -- --nocapture` ; sans effet si déjà initialisé
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_tracks_plugged_device() {
        let harness = TestHarness::new();
        harness.plug("A", &DeviceScript::xiaomi());

        let report = harness.tracker.tick().await.unwrap();
        assert_eq!(report.arrived, vec!["A".to_string()]);
        assert_eq!(harness.sink.device_updates().len(), 1);
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let harness = TestHarness::new();
        let res = harness.wait_until("nothing", Duration::from_millis(30), |h| h.tracker.is_polling()).await;
        assert!(res.is_err());
    }
}
