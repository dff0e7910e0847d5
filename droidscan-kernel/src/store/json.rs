use super::{ScanStore, SnapshotTable, StoreError};
use crate::models::{NewScan, ScanSnapshot};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Store persistant : un fichier JSON réécrit à chaque mutation, cache en mémoire
pub struct JsonScanStore {
    storage_path: PathBuf,
    cache: Mutex<SnapshotTable>,
}

impl JsonScanStore {
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let table = Self::load_from_disk(&storage_path)?;
        info!("[store] {} scans loaded from {:?}", table.len(), storage_path);
        Ok(Self { storage_path, cache: Mutex::new(table) })
    }

    fn load_from_disk(path: &Path) -> Result<SnapshotTable, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            let empty = SnapshotTable::default();
            fs::write(path, serde_json::to_string_pretty(&empty)?)?;
            return Ok(empty);
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(SnapshotTable::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Écrit sous verrou : deux mutations concurrentes ne s'entrelacent pas sur disque
    fn save_to_disk(&self, table: &SnapshotTable) -> Result<(), StoreError> {
        fs::write(&self.storage_path, serde_json::to_string_pretty(table)?)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }
}

impl ScanStore for JsonScanStore {
    fn save(&self, scan: &NewScan) -> Result<u64, StoreError> {
        let mut table = self.cache.lock();
        let mut next = table.clone();
        let id = next.insert(scan);
        self.save_to_disk(&next)?;
        *table = next;
        debug!("[store] saved {} scan {} for {}", scan.scan_type, id, scan.device_id);
        Ok(id)
    }

    fn get_by_id(&self, id: u64) -> Result<Option<ScanSnapshot>, StoreError> {
        Ok(self.cache.lock().get(id))
    }

    fn get_by_device(&self, device_id: &str) -> Result<Vec<ScanSnapshot>, StoreError> {
        Ok(self.cache.lock().by_device(device_id))
    }

    fn get_all(&self, limit: usize) -> Result<Vec<ScanSnapshot>, StoreError> {
        Ok(self.cache.lock().all(limit))
    }

    fn delete_by_id(&self, id: u64) -> Result<bool, StoreError> {
        let mut table = self.cache.lock();
        let mut next = table.clone();
        if !next.remove(id) {
            return Ok(false);
        }
        self.save_to_disk(&next)?;
        *table = next;
        debug!("[store] deleted scan {id}");
        Ok(true)
    }
}
