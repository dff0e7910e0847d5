use super::{ScanStore, SnapshotTable, StoreError};
use crate::models::{NewScan, ScanSnapshot};
use parking_lot::Mutex;

/// Store volatil, perdu à l'arrêt du process
#[derive(Default)]
pub struct MemoryScanStore {
    table: Mutex<SnapshotTable>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

impl ScanStore for MemoryScanStore {
    fn save(&self, scan: &NewScan) -> Result<u64, StoreError> {
        Ok(self.table.lock().insert(scan))
    }

    fn get_by_id(&self, id: u64) -> Result<Option<ScanSnapshot>, StoreError> {
        Ok(self.table.lock().get(id))
    }

    fn get_by_device(&self, device_id: &str) -> Result<Vec<ScanSnapshot>, StoreError> {
        Ok(self.table.lock().by_device(device_id))
    }

    fn get_all(&self, limit: usize) -> Result<Vec<ScanSnapshot>, StoreError> {
        Ok(self.table.lock().all(limit))
    }

    fn delete_by_id(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.table.lock().remove(id))
    }
}
