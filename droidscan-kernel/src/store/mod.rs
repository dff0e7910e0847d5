/**
 * STORE - Persistence des snapshots de scan
 *
 * RÔLE :
 * Conserve chaque scan (fast/full) pour consultation, téléchargement et comparaison.
 * Le coeur ne voit que le trait ScanStore.
 *
 * FONCTIONNEMENT :
 * - ScanStore = interface synchrone save / get / delete
 * - SnapshotTable = table commune (ids auto-incrémentés, tri du plus récent au plus ancien)
 * - JsonScanStore = fichier JSON + cache mémoire ; MemoryScanStore = tests et mode éphémère
 */

mod json;
mod memory;

pub use json::JsonScanStore;
pub use memory::MemoryScanStore;

use crate::models::{NewScan, ScanSnapshot};
use serde::{Deserialize, Serialize};

/// Limite par défaut de `get_all` (liste des rapports)
pub const DEFAULT_REPORT_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ScanStore: Send + Sync {
    /// Persiste un scan et renvoie l'identifiant attribué
    fn save(&self, scan: &NewScan) -> Result<u64, StoreError>;
    fn get_by_id(&self, id: u64) -> Result<Option<ScanSnapshot>, StoreError>;
    /// Scans d'un appareil, du plus récent au plus ancien
    fn get_by_device(&self, device_id: &str) -> Result<Vec<ScanSnapshot>, StoreError>;
    fn get_all(&self, limit: usize) -> Result<Vec<ScanSnapshot>, StoreError>;
    /// `false` si l'identifiant n'existait pas
    fn delete_by_id(&self, id: u64) -> Result<bool, StoreError>;
}

/// Contenu sérialisé d'un store : compteur d'ids + snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotTable {
    next_id: u64,
    scans: Vec<ScanSnapshot>,
}

impl SnapshotTable {
    pub fn insert(&mut self, scan: &NewScan) -> u64 {
        // ids jamais réutilisés, même après suppression
        let id = self.next_id.max(self.scans.iter().map(|s| s.id).max().unwrap_or(0)) + 1;
        self.next_id = id;
        self.scans.push(scan.clone().into_snapshot(id));
        id
    }

    pub fn get(&self, id: u64) -> Option<ScanSnapshot> {
        self.scans.iter().find(|s| s.id == id).cloned()
    }

    pub fn by_device(&self, device_id: &str) -> Vec<ScanSnapshot> {
        newest_first(self.scans.iter().filter(|s| s.device_id == device_id).cloned().collect())
    }

    pub fn all(&self, limit: usize) -> Vec<ScanSnapshot> {
        let mut scans = newest_first(self.scans.clone());
        scans.truncate(limit);
        scans
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.scans.len();
        self.scans.retain(|s| s.id != id);
        self.scans.len() != before
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

/// Tri par date de création décroissante, id décroissant à date égale
fn newest_first(mut scans: Vec<ScanSnapshot>) -> Vec<ScanSnapshot> {
    scans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    scans
}
