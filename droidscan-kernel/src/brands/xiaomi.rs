use super::{parse, BrandExtractor, BrandTag};
use crate::gateway::{DeviceGateway, GatewayError};
use crate::models::DeviceId;
use async_trait::async_trait;
use std::sync::Arc;

/// Xiaomi / Redmi / POCO (MIUI, HyperOS)
pub struct XiaomiExtractor {
    gateway: Arc<dyn DeviceGateway>,
    device_id: DeviceId,
}

impl XiaomiExtractor {
    pub const TAG: &'static str = "xiaomi";

    pub fn boxed(gateway: Arc<dyn DeviceGateway>, device_id: DeviceId) -> Box<dyn BrandExtractor> {
        Box::new(Self { gateway, device_id })
    }
}

#[async_trait]
impl BrandExtractor for XiaomiExtractor {
    fn brand(&self) -> BrandTag {
        BrandTag::new(Self::TAG)
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn gateway(&self) -> &dyn DeviceGateway {
        self.gateway.as_ref()
    }

    // MIUI verrouille le bootloader en usine
    fn bootloader_default(&self) -> bool {
        true
    }

    /// Nom commercial (« Redmi Note 12 ») plutôt que le code modèle
    async fn model(&self) -> Result<String, GatewayError> {
        self.first_prop(&["ro.product.marketname", "ro.product.model"]).await
    }

    async fn baseband_version(&self) -> Result<String, GatewayError> {
        self.first_prop(&["gsm.version.baseband", "ro.build.version.incremental"]).await
    }

    async fn bootloader_locked(&self) -> Result<bool, GatewayError> {
        let lockstate = self.getprop("ro.secureboot.lockstate").await?;
        if !lockstate.is_empty() {
            return Ok(lockstate.eq_ignore_ascii_case("locked"));
        }
        let state = self.getprop("ro.boot.verifiedbootstate").await?;
        Ok(parse::boot_state_locked(&state, &["green"], self.bootloader_default()))
    }

    /// Compte Mi en priorité, sinon le premier compte du téléphone
    async fn user_name(&self) -> Result<String, GatewayError> {
        let dump = self.shell("dumpsys account").await?;
        Ok(parse::account_name(&dump, Some("com.xiaomi"))
            .or_else(|| parse::account_name(&dump, None))
            .unwrap_or_default())
    }
}
