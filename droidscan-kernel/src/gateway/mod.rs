/**
 * GATEWAY - Passerelle de commandes vers les appareils (adb)
 *
 * RÔLE :
 * Frontière process entre droidscan et le binaire du device-bridge.
 * Le coeur ne manipule que du texte de commande : jamais le framing adb.
 *
 * FONCTIONNEMENT :
 * - DeviceGateway = trait async (liste, exécution shell, serveur, autorisation)
 * - AdbGateway = implémentation réelle via `tokio::process`
 * - Erreurs : ToolUnavailable (binaire absent) / CommandFailed (code retour non nul)
 */

mod adb;

pub use adb::AdbGateway;

use crate::models::DeviceId;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Intervalle entre deux listes d'appareils pendant `await_any_device`
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("device bridge unavailable: {0}")]
    ToolUnavailable(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Appareils visibles, hors état `offline`
    async fn list_devices(&self) -> Result<Vec<DeviceId>, GatewayError>;

    /// Exécute une commande shell sur l'appareil et renvoie la sortie brute
    async fn execute(&self, device_id: &str, command: &str) -> Result<String, GatewayError>;

    async fn ensure_server_running(&self) -> Result<(), GatewayError>;

    /// `true` si le débogage USB est autorisé pour cet appareil
    async fn authorize(&self, device_id: &str) -> Result<bool, GatewayError>;

    /// Test direct, indépendant de tout état mis en cache : visible ET autorisé
    async fn is_connected(&self, device_id: &str) -> Result<bool, GatewayError> {
        if !self.list_devices().await?.iter().any(|id| id == device_id) {
            return Ok(false);
        }
        self.authorize(device_id).await
    }

    /// Attend qu'au moins un appareil apparaisse ; `None` si le délai expire.
    /// Un délai trop grand pour l'horloge revient à attendre sans limite.
    async fn await_any_device(&self, timeout: Duration) -> Result<Option<DeviceId>, GatewayError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(first) = self.list_devices().await?.into_iter().next() {
                return Ok(Some(first));
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    WAIT_POLL_INTERVAL.min(deadline - now)
                }
                None => WAIT_POLL_INTERVAL,
            };
            tokio::time::sleep(pause).await;
        }
    }
}

/// Ligne de `adb devices` : identifiant + état rapporté (device, unauthorized, offline...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub state: String,
}

impl DeviceEntry {
    pub fn is_offline(&self) -> bool {
        self.state == "offline"
    }

    pub fn is_authorized(&self) -> bool {
        self.state == "device"
    }
}

/// Parse la sortie de `adb devices`.
/// Ignore l'en-tête, les lignes vides et les messages du daemon (`* daemon started *`).
pub fn parse_device_list(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let state = parts.next().unwrap_or("unknown");
            Some(DeviceEntry { id: id.to_string(), state: state.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "* daemon not running; starting now at tcp:5037\n\
                           * daemon started successfully\n\
                           List of devices attached\n\
                           4f1c2a9e\tdevice\n\
                           192.168.1.20:5555\tunauthorized\n\
                           ZX1G22\toffline\n\
                           \n";

    #[test]
    fn test_parse_device_list() {
        let entries = parse_device_list(DEVICES);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], DeviceEntry { id: "4f1c2a9e".into(), state: "device".into() });
        assert!(!entries[1].is_authorized());
        assert!(entries[2].is_offline());
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_device_list("List of devices attached\n\n").is_empty());
        assert!(parse_device_list("").is_empty());
    }

    struct Appearing {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl DeviceGateway for Appearing {
        async fn list_devices(&self) -> Result<Vec<DeviceId>, GatewayError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(if n >= 2 { vec!["late".to_string()] } else { vec![] })
        }
        async fn execute(&self, _: &str, _: &str) -> Result<String, GatewayError> {
            Ok(String::new())
        }
        async fn ensure_server_running(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn authorize(&self, _: &str) -> Result<bool, GatewayError> {
            Ok(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_any_device_returns_first_arrival() {
        let gateway = Appearing { calls: 0.into() };
        let found = gateway.await_any_device(Duration::from_secs(30)).await.unwrap();
        assert_eq!(found.as_deref(), Some("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_any_device_times_out() {
        let gateway = Appearing { calls: 0.into() };
        let found = gateway.await_any_device(Duration::from_millis(500)).await.unwrap();
        assert_eq!(found, None);
        // troisième liste : l'appareil est désormais visible
        assert!(gateway.is_connected("late").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_any_device_with_unbounded_timeout() {
        let gateway = Appearing { calls: 0.into() };
        let found = gateway.await_any_device(Duration::MAX).await.unwrap();
        assert_eq!(found.as_deref(), Some("late"));
    }
}
