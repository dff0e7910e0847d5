/**
 * SCANNER - Orchestration des scans fast / full
 *
 * RÔLE :
 * Produit un snapshot complet d'un appareil, le persiste et publie la progression.
 *
 * FONCTIONNEMENT :
 * - Vérification de présence directe (jamais l'ensemble suivi du tracker)
 * - Extracteur neuf à chaque scan -> device_info() -> (full) apps tierces -> save
 * - Progression : started, brand_detected, info_gathered, [gathering_apps], saved, completed
 * - Échec après la vérification : événement `failed`, rien n'est persisté
 */

use crate::brands::BrandResolver;
use crate::events::{Event, EventSink, ProgressEvent, ScanStage};
use crate::gateway::{DeviceGateway, GatewayError};
use crate::models::{DeviceId, NewScan, ScanSnapshot, ScanType, UNKNOWN};
use crate::store::{ScanStore, StoreError};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Device {0} not connected")]
    DeviceNotConnected(DeviceId),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Émetteur de progression pour une exécution de scan
struct ScanProgress<'a> {
    events: &'a dyn EventSink,
    run_id: Uuid,
    device_id: &'a str,
    scan_type: ScanType,
}

impl ScanProgress<'_> {
    fn emit(&self, stage: ScanStage, message: impl Into<String>) {
        self.events.publish(Event::StatusUpdate(ProgressEvent {
            run_id: self.run_id,
            device_id: self.device_id.to_string(),
            scan_type: self.scan_type,
            stage,
            message: message.into(),
            progress: stage.progress(self.scan_type),
            timestamp: OffsetDateTime::now_utc(),
        }));
    }
}

pub struct Scanner {
    gateway: Arc<dyn DeviceGateway>,
    resolver: BrandResolver,
    store: Arc<dyn ScanStore>,
    events: Arc<dyn EventSink>,
}

impl Scanner {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        resolver: BrandResolver,
        store: Arc<dyn ScanStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { gateway, resolver, store, events }
    }

    pub async fn fast_scan(&self, device_id: &str) -> Result<ScanSnapshot, ScanError> {
        self.scan(device_id, ScanType::Fast).await
    }

    pub async fn full_scan(&self, device_id: &str) -> Result<ScanSnapshot, ScanError> {
        self.scan(device_id, ScanType::Full).await
    }

    pub async fn scan(&self, device_id: &str, scan_type: ScanType) -> Result<ScanSnapshot, ScanError> {
        let progress = ScanProgress {
            events: self.events.as_ref(),
            run_id: Uuid::new_v4(),
            device_id,
            scan_type,
        };
        progress.emit(ScanStage::Started, format!("Starting {scan_type} scan"));

        if !self.gateway.is_connected(device_id).await? {
            warn!(device = device_id, "[scanner] {scan_type} scan aborted: device not connected");
            return Err(ScanError::DeviceNotConnected(device_id.to_string()));
        }

        match self.run(&progress).await {
            Ok(snapshot) => {
                info!(device = device_id, scan_id = snapshot.id, "[scanner] {scan_type} scan completed");
                progress.emit(ScanStage::Completed, format!("{scan_type} scan completed"));
                Ok(snapshot)
            }
            Err(e) => {
                warn!(device = device_id, "[scanner] {scan_type} scan failed: {e}");
                progress.emit(ScanStage::Failed, format!("Scan failed: {e}"));
                Err(e)
            }
        }
    }

    async fn run(&self, progress: &ScanProgress<'_>) -> Result<ScanSnapshot, ScanError> {
        let device_id = progress.device_id;
        let extractor = self.resolver.instantiate(device_id).await?;
        let brand = extractor.brand();
        progress.emit(ScanStage::BrandDetected, format!("Detected brand: {brand}"));

        let mut attributes = extractor.device_info().await?;
        progress.emit(ScanStage::InfoGathered, "Device information gathered");

        if progress.scan_type == ScanType::Full {
            progress.emit(ScanStage::GatheringApps, "Gathering installed applications");
            let apps = match extractor.installed_apps().await {
                Ok(apps) => apps,
                Err(GatewayError::CommandFailed(msg)) => {
                    warn!(device = device_id, "[scanner] package listing failed: {msg}");
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            attributes.installed_apps = Some(apps);
        }

        let model = if attributes.model.is_empty() { UNKNOWN.to_string() } else { attributes.model.clone() };
        let scan = NewScan {
            device_id: device_id.to_string(),
            brand: brand.to_string(),
            model,
            scan_type: progress.scan_type,
            attributes,
            created_at: OffsetDateTime::now_utc(),
        };
        let id = self.store.save(&scan)?;
        progress.emit(ScanStage::Saved, format!("Scan saved with id {id}"));
        Ok(scan.into_snapshot(id))
    }

    pub fn scan_by_id(&self, id: u64) -> Result<Option<ScanSnapshot>, StoreError> {
        self.store.get_by_id(id)
    }

    pub fn scans_for_device(&self, device_id: &str) -> Result<Vec<ScanSnapshot>, StoreError> {
        self.store.get_by_device(device_id)
    }

    pub fn all_scans(&self, limit: usize) -> Result<Vec<ScanSnapshot>, StoreError> {
        self.store.get_all(limit)
    }

    pub fn delete_scan(&self, id: u64) -> Result<bool, StoreError> {
        self.store.delete_by_id(id)
    }

    /// Scan le plus récent de ce type pour l'appareil
    pub fn last_scan(&self, device_id: &str, scan_type: ScanType) -> Result<Option<ScanSnapshot>, StoreError> {
        Ok(self.store.get_by_device(device_id)?.into_iter().find(|s| s.scan_type == scan_type))
    }
}
