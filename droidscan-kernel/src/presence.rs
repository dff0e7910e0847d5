/**
 * PRESENCE - Suivi des appareils connectés
 *
 * RÔLE :
 * Détient l'ensemble autoritatif des appareils connectés et autorisés.
 * Seule la boucle de polling (via `tick`) le modifie.
 *
 * FONCTIONNEMENT :
 * - tick() : diff entre la liste live et l'ensemble suivi
 *   - arrivée : autorisation -> marque -> modèle + version Android -> `connected`
 *   - non autorisé : événement `pending_authorization`, réévalué au tick suivant
 *   - départ : retrait + événement `disconnected` sous le même verrou
 * - Boucle supervisée : un échec du tick relance la boucle (budget limité),
 *   puis abandon signalé par un événement `polling_update`
 */

use crate::brands::BrandResolver;
use crate::config::PollingConf;
use crate::events::{Event, EventSink, PollingState};
use crate::gateway::{DeviceGateway, GatewayError};
use crate::models::{DeviceId, TrackedDevice};
use crate::state::{new_state, snapshot, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type SharedPresenceTracker = Arc<PresenceTracker>;

/// Plancher de l'intervalle lu en configuration
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingOptions {
    pub interval: Duration,
    pub restart_delay: Duration,
    /// Relances autorisées par appel à `start_polling`
    pub max_restarts: u32,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            restart_delay: Duration::from_secs(5),
            max_restarts: 1,
        }
    }
}

impl From<&PollingConf> for PollingOptions {
    fn from(conf: &PollingConf) -> Self {
        Self {
            interval: Duration::from_secs(conf.interval_secs.max(MIN_POLL_INTERVAL_SECS)),
            restart_delay: Duration::from_secs(conf.restart_delay_secs),
            max_restarts: conf.max_restarts,
        }
    }
}

/// Résultat d'un tick : identifiants par issue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub arrived: Vec<DeviceId>,
    pub pending: Vec<DeviceId>,
    pub failed: Vec<DeviceId>,
    pub departed: Vec<DeviceId>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.arrived.is_empty() && self.pending.is_empty() && self.failed.is_empty() && self.departed.is_empty()
    }
}

pub struct PresenceTracker {
    gateway: Arc<dyn DeviceGateway>,
    resolver: BrandResolver,
    events: Arc<dyn EventSink>,
    options: PollingOptions,
    tracked: Shared<HashMap<DeviceId, TrackedDevice>>,
    poll_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PresenceTracker {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        resolver: BrandResolver,
        events: Arc<dyn EventSink>,
        options: PollingOptions,
    ) -> Self {
        Self {
            gateway,
            resolver,
            events,
            options,
            tracked: new_state(HashMap::new()),
            poll_task: parking_lot::Mutex::new(None),
        }
    }

    pub fn options(&self) -> PollingOptions {
        self.options
    }

    /// Un passage de la boucle. Erreur uniquement si la liste live est inaccessible.
    pub async fn tick(&self) -> Result<TickReport, GatewayError> {
        let live = self.gateway.list_devices().await?;
        let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();
        let known: HashSet<DeviceId> = self.tracked.lock().keys().cloned().collect();
        let mut report = TickReport::default();

        let mut seen = HashSet::new();
        for id in live.iter().filter(|id| !known.contains(*id)) {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.admit(id).await {
                Ok(Some(device)) => {
                    info!(device = %id, brand = ?device.brand, model = ?device.model, "[presence] device connected");
                    let mut tracked = self.tracked.lock();
                    tracked.insert(id.clone(), device.clone());
                    self.events.publish(Event::device(device));
                    report.arrived.push(id.clone());
                }
                Ok(None) => {
                    debug!(device = %id, "[presence] waiting for USB debugging authorization");
                    self.events.publish(Event::device(TrackedDevice::pending_authorization(id)));
                    report.pending.push(id.clone());
                }
                Err(e) => {
                    warn!(device = %id, "[presence] detection failed: {e}");
                    self.events
                        .publish(Event::device(TrackedDevice::failed(id, format!("Error detecting device: {e}"))));
                    report.failed.push(id.clone());
                }
            }
        }

        let now = OffsetDateTime::now_utc();
        let mut tracked = self.tracked.lock();
        let gone: Vec<DeviceId> = tracked.keys().filter(|id| !live_set.contains(id.as_str())).cloned().collect();
        for id in gone {
            if let Some(device) = tracked.remove(&id) {
                info!(device = %id, "[presence] device disconnected");
                self.events.publish(Event::device(device.into_disconnected(now)));
                report.departed.push(id);
            }
        }

        Ok(report)
    }

    /// `None` = autorisation en attente
    async fn admit(&self, device_id: &str) -> Result<Option<TrackedDevice>, GatewayError> {
        if !self.gateway.authorize(device_id).await? {
            return Ok(None);
        }
        let extractor = self.resolver.instantiate(device_id).await?;
        let model = extractor.model().await?;
        let android_version = extractor.android_version().await?;
        Ok(Some(TrackedDevice::connected(
            device_id,
            extractor.brand().as_str(),
            model,
            android_version,
            OffsetDateTime::now_utc(),
        )))
    }

    /// Démarre la boucle supervisée ; une boucle déjà active est annulée d'abord
    pub async fn start_polling(self: &Arc<Self>) {
        if let Err(e) = self.gateway.ensure_server_running().await {
            warn!("[presence] could not start adb server: {e}");
        }
        let mut slot = self.poll_task.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
            debug!("[presence] previous polling loop cancelled");
        }
        *slot = Some(tokio::spawn(self.clone().supervise()));
        info!(interval_ms = self.options.interval.as_millis() as u64, "[presence] polling started");
    }

    /// `true` si une boucle tournait
    pub fn stop_polling(&self) -> bool {
        let Some(handle) = self.poll_task.lock().take() else {
            return false;
        };
        let was_running = !handle.is_finished();
        handle.abort();
        if was_running {
            info!("[presence] polling stopped");
            self.events.publish(Event::polling(PollingState::Stopped, Some("stopped by request".into())));
        }
        was_running
    }

    pub fn is_polling(&self) -> bool {
        self.poll_task.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn supervise(self: Arc<Self>) {
        self.events.publish(Event::polling(PollingState::Started, None));
        let mut restarts = 0;
        loop {
            let failure = self.run_loop().await;
            error!("[presence] polling loop failed: {failure}");
            if restarts >= self.options.max_restarts {
                error!("[presence] giving up after {restarts} restart(s)");
                self.events.publish(Event::polling(PollingState::Stopped, Some(failure.to_string())));
                return;
            }
            restarts += 1;
            self.events.publish(Event::polling(PollingState::Restarting, Some(failure.to_string())));
            tokio::time::sleep(self.options.restart_delay).await;
        }
    }

    /// Ne rend la main qu'en cas d'échec du tick
    async fn run_loop(&self) -> GatewayError {
        loop {
            if let Err(e) = self.tick().await {
                return e;
            }
            tokio::time::sleep(self.options.interval).await;
        }
    }

    /// Copie triée de l'ensemble suivi
    pub fn connected_devices(&self) -> Vec<TrackedDevice> {
        let mut devices: Vec<TrackedDevice> = snapshot(&self.tracked).into_values().collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    pub fn device(&self, device_id: &str) -> Option<TrackedDevice> {
        self.tracked.lock().get(device_id).cloned()
    }

    pub fn is_tracked(&self, device_id: &str) -> bool {
        self.tracked.lock().contains_key(device_id)
    }

    pub async fn await_any_device(&self, timeout: Duration) -> Result<Option<DeviceId>, GatewayError> {
        self.gateway.await_any_device(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let conf = PollingConf { interval_secs: 2, restart_delay_secs: 7, max_restarts: 3, auto_start: false };
        let opts = PollingOptions::from(&conf);
        assert_eq!(opts.interval, Duration::from_secs(2));
        assert_eq!(opts.restart_delay, Duration::from_secs(7));
        assert_eq!(opts.max_restarts, 3);
        assert_eq!(PollingOptions::default().max_restarts, 1);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let conf = PollingConf { interval_secs: 0, ..PollingConf::default() };
        assert_eq!(PollingOptions::from(&conf).interval, Duration::from_secs(MIN_POLL_INTERVAL_SECS));
    }

    #[test]
    fn test_empty_report_is_quiet() {
        let mut report = TickReport::default();
        assert!(report.is_quiet());
        report.departed.push("A".into());
        assert!(!report.is_quiet());
    }
}
