use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Identifiant opaque attribué par adb (numéro de série ou `ip:port`)
pub type DeviceId = String;

/// Sentinelle utilisée quand une valeur de stockage ne peut pas être lue
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Connected,
    PendingAuthorization,
    Disconnected,
    Error,
}

/// Appareil vu par le tracker de présence.
/// Seuls les appareils `connected` vivent dans l'ensemble suivi ; les autres statuts
/// ne circulent que dans les événements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedDevice {
    pub device_id: DeviceId,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub android_version: Option<String>,
    pub status: DeviceStatus,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub connected_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub disconnected_at: Option<OffsetDateTime>,
    pub message: Option<String>,
}

impl TrackedDevice {
    pub fn connected(
        device_id: &str,
        brand: &str,
        model: String,
        android_version: String,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            brand: Some(brand.to_string()),
            model: Some(model),
            android_version: Some(android_version),
            status: DeviceStatus::Connected,
            connected_at: Some(at),
            disconnected_at: None,
            message: None,
        }
    }

    pub fn pending_authorization(device_id: &str) -> Self {
        Self::bare(
            device_id,
            DeviceStatus::PendingAuthorization,
            "Please approve USB debugging on your device",
        )
    }

    pub fn failed(device_id: &str, message: impl Into<String>) -> Self {
        Self::bare(device_id, DeviceStatus::Error, message)
    }

    fn bare(device_id: &str, status: DeviceStatus, message: impl Into<String>) -> Self {
        Self {
            device_id: device_id.to_string(),
            brand: None,
            model: None,
            android_version: None,
            status,
            connected_at: None,
            disconnected_at: None,
            message: Some(message.into()),
        }
    }

    /// Transition `connected -> disconnected` (l'entrée a déjà quitté l'ensemble suivi)
    pub fn into_disconnected(mut self, at: OffsetDateTime) -> Self {
        self.status = DeviceStatus::Disconnected;
        self.disconnected_at = Some(at);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub total: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<String>,
    pub available: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_percentage: Option<String>,
}

impl StorageInfo {
    pub fn unknown() -> Self {
        Self {
            total: UNKNOWN.to_string(),
            used: None,
            available: UNKNOWN.to_string(),
            use_percentage: None,
        }
    }
}

/// Attributs extraits d'un appareil : charge utile d'un snapshot, immuable une fois produit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub model: String,
    pub android_version: String,
    pub security_patch: String,
    pub kernel_version: String,
    pub baseband_version: String,
    pub bootloader_locked: bool,
    pub user_name: String,
    pub storage: StorageInfo,
    /// Paquets tiers, uniquement pour un scan complet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_apps: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Fast,
    Full,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Fast => f.write_str("fast"),
            ScanType::Full => f.write_str("full"),
        }
    }
}

/// Scan prêt à être persisté ; l'identifiant est attribué par le store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScan {
    pub device_id: DeviceId,
    pub brand: String,
    pub model: String,
    pub scan_type: ScanType,
    pub attributes: DeviceAttributes,
    pub created_at: OffsetDateTime,
}

impl NewScan {
    pub fn into_snapshot(self, id: u64) -> ScanSnapshot {
        ScanSnapshot {
            id,
            device_id: self.device_id,
            brand: self.brand,
            model: self.model,
            scan_type: self.scan_type,
            attributes: self.attributes,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub id: u64,
    pub device_id: DeviceId,
    pub brand: String,
    pub model: String,
    pub scan_type: ScanType,
    pub attributes: DeviceAttributes,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_keeps_identity() {
        let now = OffsetDateTime::now_utc();
        let device = TrackedDevice::connected("A1", "xiaomi", "Redmi".into(), "13".into(), now);
        let gone = device.into_disconnected(now);
        assert_eq!(gone.device_id, "A1");
        assert_eq!(gone.status, DeviceStatus::Disconnected);
        assert_eq!(gone.connected_at, Some(now));
        assert_eq!(gone.disconnected_at, Some(now));
    }

    #[test]
    fn test_status_wire_names() {
        let pending = TrackedDevice::pending_authorization("B2");
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["status"], "pending_authorization");
        assert!(json["message"].as_str().unwrap().contains("USB debugging"));
    }

    #[test]
    fn test_unknown_storage_omits_optional_columns() {
        let json = serde_json::to_value(StorageInfo::unknown()).unwrap();
        assert_eq!(json, serde_json::json!({"total": "Unknown", "available": "Unknown"}));
    }
}
