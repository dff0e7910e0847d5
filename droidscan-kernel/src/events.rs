/**
 * EVENTS - Bus d'événements temps réel de droidscan
 *
 * RÔLE :
 * Diffuse les changements de présence des appareils, la progression des scans
 * et l'état de la boucle de polling vers tous les observateurs (WebSocket, MQTT).
 *
 * FONCTIONNEMENT :
 * - EventSink = seule capacité dont dépend le coeur : `publish(event)`
 * - EventBus = canal broadcast tokio + miroirs optionnels (ex: MQTT)
 * - Publication fire-and-forget : aucun observateur = aucun effet, jamais d'erreur
 */

use crate::models::{DeviceId, ScanType, TrackedDevice};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacité de publication consommée par le tracker et l'orchestrateur de scans
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Arrivée, départ, attente d'autorisation ou erreur d'un appareil
    DeviceUpdate {
        data: TrackedDevice,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// Progression d'un scan
    StatusUpdate(ProgressEvent),
    /// Cycle de vie de la boucle de polling (supervision)
    PollingUpdate(PollingUpdate),
}

impl Event {
    pub fn device(data: TrackedDevice) -> Self {
        Event::DeviceUpdate { data, timestamp: OffsetDateTime::now_utc() }
    }

    pub fn polling(state: PollingState, message: Option<String>) -> Self {
        Event::PollingUpdate(PollingUpdate {
            state,
            message,
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Started,
    BrandDetected,
    InfoGathered,
    GatheringApps,
    Saved,
    Completed,
    Failed,
}

impl ScanStage {
    /// Pourcentage d'avancement affiché aux clients (aucun pour un échec)
    pub fn progress(self, scan_type: ScanType) -> Option<f32> {
        let pct = match (self, scan_type) {
            (ScanStage::Started, _) => 0.0,
            (ScanStage::BrandDetected, ScanType::Fast) => 20.0,
            (ScanStage::BrandDetected, ScanType::Full) => 15.0,
            (ScanStage::InfoGathered, ScanType::Fast) => 60.0,
            (ScanStage::InfoGathered, ScanType::Full) => 45.0,
            (ScanStage::GatheringApps, _) => 70.0,
            (ScanStage::Saved, _) => 90.0,
            (ScanStage::Completed, _) => 100.0,
            (ScanStage::Failed, _) => return None,
        };
        Some(pct)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Identifiant de l'exécution : distingue deux scans concurrents du même appareil
    pub run_id: Uuid,
    pub device_id: DeviceId,
    pub scan_type: ScanType,
    pub stage: ScanStage,
    pub message: String,
    pub progress: Option<f32>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollingState {
    Started,
    Restarting,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollingUpdate {
    pub state: PollingState,
    pub message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Bus de diffusion : canal broadcast pour les abonnés locaux + miroirs
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    mirrors: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, mirrors: Vec::new() }
    }

    /// Ajoute un miroir qui reçoit une copie de chaque événement
    pub fn with_mirror(mut self, mirror: Arc<dyn EventSink>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: Event) {
        for mirror in &self.mirrors {
            mirror.publish(event.clone());
        }
        // Err = aucun abonné, ce qui est un cas normal
        let _ = self.tx.send(event);
    }
}
