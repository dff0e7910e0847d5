use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DroidscanConfig {
    pub adb: AdbConf,
    pub polling: PollingConf,
    pub store: StoreConf,
    pub http: HttpConf,
    pub mqtt: Option<MqttConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AdbConf {
    pub command: String, // ex: "adb -H 127.0.0.1 -P 5037"
}

impl Default for AdbConf {
    fn default() -> Self {
        Self { command: "adb".into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConf {
    pub interval_secs: u64,
    pub restart_delay_secs: u64,
    pub max_restarts: u32,
    pub auto_start: bool,
}

impl Default for PollingConf {
    fn default() -> Self {
        Self { interval_secs: 5, restart_delay_secs: 5, max_restarts: 1, auto_start: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConf {
    pub path: String,
}

impl Default for StoreConf {
    fn default() -> Self {
        Self { path: "./data/scans.json".into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8000".into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_client_id() -> String {
    "droidscan".into()
}

/// YAML -> config ; texte vide ou invalide = défauts
pub fn parse_config(txt: &str) -> DroidscanConfig {
    if txt.trim().is_empty() {
        return DroidscanConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("[droidscan] invalid config: {e}");
        DroidscanConfig::default()
    })
}

pub async fn load_config() -> DroidscanConfig {
    let path = std::env::var("DROIDSCAN_CONFIG").unwrap_or_else(|_| "droidscan.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        parse_config(&fs::read_to_string(&path).await.unwrap_or_default())
    } else {
        warn!("[droidscan] no {path}, using default config");
        DroidscanConfig::default()
    };
    if let Ok(command) = std::env::var("DROIDSCAN_ADB") {
        if !command.trim().is_empty() {
            cfg.adb.command = command;
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = parse_config("polling:\n  interval_secs: 2\nmqtt:\n  host: broker.lan\n  port: 1883\n");
        assert_eq!(cfg.polling.interval_secs, 2);
        assert_eq!(cfg.polling.max_restarts, 1);
        assert!(cfg.polling.auto_start);
        assert_eq!(cfg.adb.command, "adb");
        assert_eq!(cfg.store.path, "./data/scans.json");
        let mqtt = cfg.mqtt.unwrap();
        assert_eq!(mqtt.host, "broker.lan");
        assert_eq!(mqtt.client_id, "droidscan");
    }

    #[test]
    fn test_invalid_or_empty_yaml_is_default() {
        assert_eq!(parse_config("").http.bind, "0.0.0.0:8000");
        assert_eq!(parse_config("polling: [oops").polling.interval_secs, 5);
        assert!(parse_config("   \n").mqtt.is_none());
    }
}
