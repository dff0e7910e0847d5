/**
 * BRANDS - Extraction d'attributs polymorphe par marque
 *
 * RÔLE :
 * Chaque constructeur Android expose ses informations avec son propre dialecte
 * (propriétés getprop différentes, format des comptes, état du bootloader).
 * Un BrandExtractor traduit ce dialecte en DeviceAttributes typés.
 *
 * FONCTIONNEMENT :
 * - Trait BrandExtractor : capacités AOSP par défaut, surchargées par marque
 * - `device_info()` = composition commune à toutes les variantes
 * - Variantes : xiaomi, infinix, generic (défaut)
 * - Registry : tag de marque -> constructeur ; Resolver : appareil -> tag
 */

pub mod generic;
pub mod infinix;
pub mod parse;
pub mod registry;
pub mod xiaomi;

pub use registry::{BrandRegistry, BrandResolver, BRAND_PROPERTIES};

use crate::gateway::{DeviceGateway, GatewayError};
use crate::models::{DeviceAttributes, DeviceId, StorageInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Tag de marque normalisé (minuscules, sans espaces autour)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandTag(String);

impl BrandTag {
    pub const GENERIC: &'static str = "generic";

    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn generic() -> Self {
        Self(Self::GENERIC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_generic(&self) -> bool {
        self.0 == Self::GENERIC
    }
}

impl fmt::Display for BrandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Constructeur enregistré dans le registry pour une marque
pub type ExtractorCtor = fn(Arc<dyn DeviceGateway>, DeviceId) -> Box<dyn BrandExtractor>;

#[async_trait]
pub trait BrandExtractor: Send + Sync {
    fn brand(&self) -> BrandTag;
    fn device_id(&self) -> &str;
    fn gateway(&self) -> &dyn DeviceGateway;

    /// Valeur de repli quand l'état du bootloader est absent ou illisible
    fn bootloader_default(&self) -> bool;

    async fn shell(&self, command: &str) -> Result<String, GatewayError> {
        Ok(self.gateway().execute(self.device_id(), command).await?.trim().to_string())
    }

    async fn getprop(&self, property: &str) -> Result<String, GatewayError> {
        self.shell(&format!("getprop {property}")).await
    }

    /// Première propriété non vide de la liste, sinon chaîne vide
    async fn first_prop(&self, properties: &[&str]) -> Result<String, GatewayError> {
        for property in properties {
            let value = self.getprop(property).await?;
            if !value.is_empty() {
                return Ok(value);
            }
        }
        Ok(String::new())
    }

    async fn model(&self) -> Result<String, GatewayError> {
        self.getprop("ro.product.model").await
    }

    async fn android_version(&self) -> Result<String, GatewayError> {
        self.getprop("ro.build.version.release").await
    }

    async fn security_patch(&self) -> Result<String, GatewayError> {
        self.getprop("ro.build.version.security_patch").await
    }

    async fn kernel_version(&self) -> Result<String, GatewayError> {
        self.shell("cat /proc/version").await
    }

    async fn baseband_version(&self) -> Result<String, GatewayError>;

    async fn bootloader_locked(&self) -> Result<bool, GatewayError>;

    async fn user_name(&self) -> Result<String, GatewayError>;

    async fn storage_info(&self) -> Result<StorageInfo, GatewayError> {
        Ok(parse::storage_report(&self.shell("df -h /data").await?))
    }

    async fn installed_apps(&self) -> Result<Vec<String>, GatewayError> {
        Ok(parse::package_list(&self.shell("pm list packages -3").await?))
    }

    /// Composition commune : chaque attribut est lu indépendamment,
    /// un échec de commande retombe sur la valeur par défaut de l'attribut.
    async fn device_info(&self) -> Result<DeviceAttributes, GatewayError> {
        let id = self.device_id();
        Ok(DeviceAttributes {
            model: tolerate(id, "model", self.model().await, String::new())?,
            android_version: tolerate(id, "android_version", self.android_version().await, String::new())?,
            security_patch: tolerate(id, "security_patch", self.security_patch().await, String::new())?,
            kernel_version: tolerate(id, "kernel_version", self.kernel_version().await, String::new())?,
            baseband_version: tolerate(id, "baseband_version", self.baseband_version().await, String::new())?,
            bootloader_locked: tolerate(
                id,
                "bootloader_locked",
                self.bootloader_locked().await,
                self.bootloader_default(),
            )?,
            user_name: tolerate(id, "user_name", self.user_name().await, String::new())?,
            storage: tolerate(id, "storage", self.storage_info().await, StorageInfo::unknown())?,
            installed_apps: None,
        })
    }
}

/// `CommandFailed` -> valeur de repli ; `ToolUnavailable` remonte
pub fn tolerate<T>(
    device_id: &str,
    attribute: &str,
    result: Result<T, GatewayError>,
    fallback: T,
) -> Result<T, GatewayError> {
    match result {
        Ok(value) => Ok(value),
        Err(GatewayError::CommandFailed(msg)) => {
            warn!(device = device_id, attribute, "[brands] command failed, using default: {msg}");
            Ok(fallback)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_tag_is_normalized() {
        assert_eq!(BrandTag::new("  Xiaomi \n").as_str(), "xiaomi");
        assert!(BrandTag::generic().is_generic());
        assert_eq!(BrandTag::new("INFINIX").to_string(), "infinix");
    }

    #[test]
    fn test_tolerate_only_swallows_command_failures() {
        let failed: Result<bool, _> = Err(GatewayError::CommandFailed("exit 1".into()));
        assert_eq!(tolerate("A", "bootloader", failed, true), Ok(true));

        let missing: Result<bool, _> = Err(GatewayError::ToolUnavailable("adb".into()));
        assert!(tolerate("A", "bootloader", missing, true).is_err());
    }
}
