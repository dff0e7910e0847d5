use super::{parse, BrandExtractor, BrandTag};
use crate::gateway::{DeviceGateway, GatewayError};
use crate::models::DeviceId;
use async_trait::async_trait;
use std::sync::Arc;

/// Extracteur par défaut : uniquement des propriétés AOSP standard.
/// Utilisé pour toute marque absente du registry.
pub struct GenericExtractor {
    gateway: Arc<dyn DeviceGateway>,
    device_id: DeviceId,
}

impl GenericExtractor {
    pub fn boxed(gateway: Arc<dyn DeviceGateway>, device_id: DeviceId) -> Box<dyn BrandExtractor> {
        Box::new(Self { gateway, device_id })
    }
}

#[async_trait]
impl BrandExtractor for GenericExtractor {
    fn brand(&self) -> BrandTag {
        BrandTag::generic()
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn gateway(&self) -> &dyn DeviceGateway {
        self.gateway.as_ref()
    }

    fn bootloader_default(&self) -> bool {
        false
    }

    async fn baseband_version(&self) -> Result<String, GatewayError> {
        self.first_prop(&["gsm.version.baseband", "ro.baseband"]).await
    }

    async fn bootloader_locked(&self) -> Result<bool, GatewayError> {
        let state = self.getprop("ro.boot.verifiedbootstate").await?;
        Ok(parse::boot_state_locked(&state, &["green"], self.bootloader_default()))
    }

    async fn user_name(&self) -> Result<String, GatewayError> {
        let dump = self.shell("dumpsys account").await?;
        Ok(parse::account_name(&dump, None).unwrap_or_default())
    }
}
