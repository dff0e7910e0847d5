//! Comparaison de deux snapshots d'un même appareil (mises à jour, apps installées/supprimées).

use crate::models::{DeviceAttributes, DeviceId, ScanSnapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompareError {
    #[error("scan {0} does not belong to device {1}")]
    ForeignScan(u64, DeviceId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub scan1: Value,
    pub scan2: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppChanges {
    pub newly_installed: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Differences {
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, FieldChange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_apps: Option<AppChanges>,
}

impl Differences {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.storage.is_none() && self.installed_apps.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRef {
    pub id: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<&ScanSnapshot> for ScanRef {
    fn from(scan: &ScanSnapshot) -> Self {
        Self { id: scan.id, timestamp: scan.created_at }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanComparison {
    pub device_id: DeviceId,
    pub scan1: ScanRef,
    pub scan2: ScanRef,
    pub differences: Differences,
}

/// Compare `first` (avant) et `second` (après) ; les deux doivent appartenir à `device_id`
pub fn compare_scans(
    device_id: &str,
    first: &ScanSnapshot,
    second: &ScanSnapshot,
) -> Result<ScanComparison, CompareError> {
    for scan in [first, second] {
        if scan.device_id != device_id {
            return Err(CompareError::ForeignScan(scan.id, device_id.to_string()));
        }
    }

    Ok(ScanComparison {
        device_id: device_id.to_string(),
        scan1: first.into(),
        scan2: second.into(),
        differences: diff_attributes(&first.attributes, &second.attributes),
    })
}

fn diff_attributes(a: &DeviceAttributes, b: &DeviceAttributes) -> Differences {
    let mut diff = Differences::default();

    let pairs = [
        ("android_version", json!(a.android_version), json!(b.android_version)),
        ("security_patch", json!(a.security_patch), json!(b.security_patch)),
        ("kernel_version", json!(a.kernel_version), json!(b.kernel_version)),
        ("baseband_version", json!(a.baseband_version), json!(b.baseband_version)),
        ("bootloader_locked", json!(a.bootloader_locked), json!(b.bootloader_locked)),
    ];
    for (key, scan1, scan2) in pairs {
        if scan1 != scan2 {
            diff.fields.insert(key.to_string(), FieldChange { scan1, scan2 });
        }
    }

    let mut storage = BTreeMap::new();
    for (key, scan1, scan2) in [
        ("total", &a.storage.total, &b.storage.total),
        ("available", &a.storage.available, &b.storage.available),
    ] {
        if scan1 != scan2 {
            storage.insert(key.to_string(), FieldChange { scan1: json!(scan1), scan2: json!(scan2) });
        }
    }
    if !storage.is_empty() {
        diff.storage = Some(storage);
    }

    if let (Some(before), Some(after)) = (&a.installed_apps, &b.installed_apps) {
        let before: BTreeSet<&String> = before.iter().collect();
        let after: BTreeSet<&String> = after.iter().collect();
        let newly_installed: Vec<String> = after.difference(&before).map(|s| s.to_string()).collect();
        let removed: Vec<String> = before.difference(&after).map(|s| s.to_string()).collect();
        if !newly_installed.is_empty() || !removed.is_empty() {
            diff.installed_apps = Some(AppChanges { newly_installed, removed });
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanType;
    use crate::store::tests::scan;

    fn snapshot(id: u64, device: &str) -> ScanSnapshot {
        scan(device, ScanType::Full, OffsetDateTime::now_utc()).into_snapshot(id)
    }

    #[test]
    fn test_identical_scans_have_no_differences() {
        let a = snapshot(1, "A");
        let b = snapshot(2, "A");
        let cmp = compare_scans("A", &a, &b).unwrap();
        assert!(cmp.differences.is_empty());
        assert_eq!(cmp.scan2.id, 2);
    }

    #[test]
    fn test_update_and_apps_are_reported() {
        let mut a = snapshot(1, "A");
        let mut b = snapshot(2, "A");
        a.attributes.installed_apps = Some(vec!["com.whatsapp".into(), "com.spotify.music".into()]);
        b.attributes.installed_apps = Some(vec!["com.whatsapp".into(), "org.telegram.messenger".into()]);
        b.attributes.security_patch = "2024-08-01".into();
        b.attributes.bootloader_locked = false;
        b.attributes.storage.available = "12G".into();

        let cmp = compare_scans("A", &a, &b).unwrap();
        let json = serde_json::to_value(&cmp.differences).unwrap();
        assert_eq!(json["security_patch"]["scan2"], "2024-08-01");
        assert_eq!(json["bootloader_locked"]["scan1"], true);
        assert_eq!(json["storage"]["available"]["scan1"], "Unknown");
        assert!(json["storage"].get("total").is_none());
        assert_eq!(json["installed_apps"]["newly_installed"], serde_json::json!(["org.telegram.messenger"]));
        assert_eq!(json["installed_apps"]["removed"], serde_json::json!(["com.spotify.music"]));
        assert!(json.get("kernel_version").is_none());
    }

    #[test]
    fn test_apps_ignored_when_one_side_is_fast() {
        let mut a = snapshot(1, "A");
        let b = snapshot(2, "A");
        a.attributes.installed_apps = Some(vec!["com.whatsapp".into()]);
        assert!(compare_scans("A", &a, &b).unwrap().differences.installed_apps.is_none());
    }

    #[test]
    fn test_foreign_scan_is_rejected() {
        let a = snapshot(1, "A");
        let b = snapshot(7, "B");
        assert_eq!(compare_scans("A", &a, &b), Err(CompareError::ForeignScan(7, "A".into())));
    }
}
