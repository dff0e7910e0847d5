use super::generic::GenericExtractor;
use super::infinix::InfinixExtractor;
use super::xiaomi::XiaomiExtractor;
use super::{BrandExtractor, BrandTag, ExtractorCtor};
use crate::gateway::{DeviceGateway, GatewayError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Propriétés interrogées dans l'ordre pour identifier la marque
pub const BRAND_PROPERTIES: [&str; 4] = [
    "ro.product.brand",
    "ro.product.manufacturer",
    "ro.product.vendor.brand",
    "ro.product.system.brand",
];

/// Table tag -> constructeur. BTreeMap pour un matching par sous-chaîne déterministe.
pub struct BrandRegistry {
    ctors: BTreeMap<String, ExtractorCtor>,
    default: ExtractorCtor,
}

impl BrandRegistry {
    /// Registry vide, tout appareil tombe sur `default`
    pub fn new(default: ExtractorCtor) -> Self {
        Self { ctors: BTreeMap::new(), default }
    }

    pub fn with_builtin_brands() -> Self {
        let mut registry = Self::new(GenericExtractor::boxed);
        registry.register(XiaomiExtractor::TAG, XiaomiExtractor::boxed);
        registry.register(InfinixExtractor::TAG, InfinixExtractor::boxed);
        registry
    }

    pub fn register(&mut self, tag: &str, ctor: ExtractorCtor) -> &mut Self {
        self.ctors.insert(BrandTag::new(tag).as_str().to_string(), ctor);
        self
    }

    pub fn set_default(&mut self, ctor: ExtractorCtor) -> &mut Self {
        self.default = ctor;
        self
    }

    /// Exact, puis sous-chaîne (`xiaomi_global` -> `xiaomi`), sinon `generic`
    pub fn match_brand(&self, reported: &str) -> BrandTag {
        let reported = BrandTag::new(reported);
        if reported.as_str().is_empty() {
            return BrandTag::generic();
        }
        if self.ctors.contains_key(reported.as_str()) {
            return reported;
        }
        self.ctors
            .keys()
            .find(|name| reported.as_str().contains(name.as_str()))
            .map(|name| BrandTag::new(name))
            .unwrap_or_else(BrandTag::generic)
    }

    pub fn known_brands(&self) -> Vec<String> {
        self.ctors.keys().cloned().collect()
    }

    /// Jamais d'échec : tag inconnu ou `generic` -> extracteur par défaut
    pub fn build(
        &self,
        tag: &BrandTag,
        gateway: Arc<dyn DeviceGateway>,
        device_id: &str,
    ) -> Box<dyn BrandExtractor> {
        let ctor = self.ctors.get(tag.as_str()).copied().unwrap_or(self.default);
        ctor(gateway, device_id.to_string())
    }
}

impl Default for BrandRegistry {
    fn default() -> Self {
        Self::with_builtin_brands()
    }
}

/// Classe un appareil dans une marque et construit l'extracteur correspondant
#[derive(Clone)]
pub struct BrandResolver {
    gateway: Arc<dyn DeviceGateway>,
    registry: Arc<BrandRegistry>,
}

impl BrandResolver {
    pub fn new(gateway: Arc<dyn DeviceGateway>, registry: Arc<BrandRegistry>) -> Self {
        Self { gateway, registry }
    }

    pub fn registry(&self) -> &BrandRegistry {
        &self.registry
    }

    /// Première propriété non vide ; une commande en échec compte comme réponse vide
    pub async fn resolve_brand(&self, device_id: &str) -> Result<BrandTag, GatewayError> {
        for property in BRAND_PROPERTIES {
            let value = match self.gateway.execute(device_id, &format!("getprop {property}")).await {
                Ok(out) => out.trim().to_lowercase(),
                Err(GatewayError::CommandFailed(msg)) => {
                    debug!(device = device_id, property, "[brands] property unreadable: {msg}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !value.is_empty() {
                let tag = self.registry.match_brand(&value);
                debug!(device = device_id, property, reported = %value, brand = %tag, "[brands] resolved");
                return Ok(tag);
            }
        }
        Ok(BrandTag::generic())
    }

    pub async fn instantiate(&self, device_id: &str) -> Result<Box<dyn BrandExtractor>, GatewayError> {
        let tag = self.resolve_brand(device_id).await?;
        Ok(self.registry.build(&tag, self.gateway.clone(), device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Passerelle minimale : réponses getprop fixes, une propriété peut échouer
    struct Props {
        values: HashMap<&'static str, &'static str>,
        failing: Option<&'static str>,
    }

    #[async_trait]
    impl DeviceGateway for Props {
        async fn list_devices(&self) -> Result<Vec<String>, GatewayError> {
            Ok(vec!["A".into()])
        }
        async fn execute(&self, _: &str, command: &str) -> Result<String, GatewayError> {
            let property = command.trim_start_matches("getprop ");
            if self.failing == Some(property) {
                return Err(GatewayError::CommandFailed("boom".into()));
            }
            Ok(self.values.get(property).copied().unwrap_or("").to_string())
        }
        async fn ensure_server_running(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn authorize(&self, _: &str) -> Result<bool, GatewayError> {
            Ok(true)
        }
    }

    fn resolver(values: &[(&'static str, &'static str)], failing: Option<&'static str>) -> BrandResolver {
        let gateway = Arc::new(Props { values: values.iter().copied().collect(), failing });
        BrandResolver::new(gateway, Arc::new(BrandRegistry::with_builtin_brands()))
    }

    #[test]
    fn test_match_brand() {
        let registry = BrandRegistry::with_builtin_brands();
        assert_eq!(registry.match_brand("Xiaomi").as_str(), "xiaomi");
        assert_eq!(registry.match_brand("xiaomi_global").as_str(), "xiaomi");
        assert_eq!(registry.match_brand("INFINIX MOBILITY").as_str(), "infinix");
        assert!(registry.match_brand("samsung").is_generic());
        assert!(registry.match_brand("").is_generic());
        assert_eq!(registry.known_brands(), vec!["infinix", "xiaomi"]);
    }

    #[test]
    fn test_unknown_tag_builds_default() {
        let registry = BrandRegistry::with_builtin_brands();
        let gateway: Arc<dyn DeviceGateway> = Arc::new(Props { values: HashMap::new(), failing: None });
        let extractor = registry.build(&BrandTag::new("nokia"), gateway, "A");
        assert!(extractor.brand().is_generic());
        assert_eq!(extractor.device_id(), "A");
    }

    #[tokio::test]
    async fn test_first_non_empty_property_wins() {
        let r = resolver(&[("ro.product.manufacturer", "xiaomi_global"), ("ro.product.vendor.brand", "infinix")], None);
        assert_eq!(r.resolve_brand("A").await.unwrap().as_str(), "xiaomi");
    }

    #[tokio::test]
    async fn test_failed_property_is_skipped() {
        let r = resolver(&[("ro.product.brand", "xiaomi"), ("ro.product.manufacturer", "Infinix")], Some("ro.product.brand"));
        let extractor = r.instantiate("A").await.unwrap();
        assert_eq!(extractor.brand().as_str(), "infinix");
    }

    #[tokio::test]
    async fn test_nothing_reported_is_generic() {
        let r = resolver(&[], None);
        assert!(r.resolve_brand("A").await.unwrap().is_generic());
    }
}
