use super::{parse_device_list, DeviceEntry, DeviceGateway, GatewayError};
use crate::models::DeviceId;
use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::process::Command;
use tracing::{debug, info};

/// Passerelle réelle : chaque opération lance le binaire adb et attend sa sortie.
pub struct AdbGateway {
    program: String,
    base_args: Vec<String>,
}

impl AdbGateway {
    /// `command` peut contenir des arguments (ex: "adb -H 127.0.0.1 -P 5037")
    pub fn new(command: &str) -> Result<Self, GatewayError> {
        let mut parts = shell_words::split(command)
            .map_err(|e| GatewayError::ToolUnavailable(format!("invalid adb command {command:?}: {e}")))?;
        if parts.is_empty() {
            return Err(GatewayError::ToolUnavailable("empty adb command".into()));
        }
        let program = parts.remove(0);
        Ok(Self { program, base_args: parts })
    }

    async fn run(&self, args: &[&str]) -> Result<String, GatewayError> {
        debug!(program = %self.program, ?args, "[adb] running");
        let output = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => GatewayError::ToolUnavailable(format!("{} not found", self.program)),
                _ => GatewayError::CommandFailed(format!("spawn {}: {e}", self.program)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GatewayError::CommandFailed(format!("{} ({})", stderr, output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn entries(&self) -> Result<Vec<DeviceEntry>, GatewayError> {
        Ok(parse_device_list(&self.run(&["devices"]).await?))
    }
}

#[async_trait]
impl DeviceGateway for AdbGateway {
    async fn list_devices(&self) -> Result<Vec<DeviceId>, GatewayError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| !entry.is_offline())
            .map(|entry| entry.id)
            .collect())
    }

    async fn execute(&self, device_id: &str, command: &str) -> Result<String, GatewayError> {
        self.run(&["-s", device_id, "shell", command]).await
    }

    /// Sans invite d'autorisation : seul l'état `device` compte
    async fn is_connected(&self, device_id: &str) -> Result<bool, GatewayError> {
        Ok(self.entries().await?.iter().any(|e| e.id == device_id && e.is_authorized()))
    }

    async fn ensure_server_running(&self) -> Result<(), GatewayError> {
        self.run(&["start-server"]).await?;
        info!("[adb] server running");
        Ok(())
    }

    async fn authorize(&self, device_id: &str) -> Result<bool, GatewayError> {
        let state = |entries: Vec<DeviceEntry>| {
            entries.into_iter().find(|e| e.id == device_id).map(|e| e.state)
        };

        match state(self.entries().await?).as_deref() {
            Some("device") => return Ok(true),
            Some("unauthorized") => {}
            _ => return Ok(false),
        }

        // Une commande shell déclenche la boîte de dialogue RSA côté téléphone
        info!(device = device_id, "[adb] requesting USB debugging authorization");
        match self.execute(device_id, "echo 'Authorization requested'").await {
            Ok(_) | Err(GatewayError::CommandFailed(_)) => {}
            Err(e) => return Err(e),
        }

        Ok(state(self.entries().await?).as_deref() == Some("device"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_with_arguments_is_split() {
        let gw = AdbGateway::new("adb -H '127.0.0.1' -P 5037").unwrap();
        assert_eq!(gw.program, "adb");
        assert_eq!(gw.base_args, vec!["-H", "127.0.0.1", "-P", "5037"]);
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(matches!(AdbGateway::new("  "), Err(GatewayError::ToolUnavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unauthorized_device_is_not_connected() {
        let listing = "printf 'List of devices attached\\nA1\\tdevice\\nB2\\tunauthorized\\nC3\\toffline\\n'";
        let gw = AdbGateway::new(&format!("sh -c {}", shell_words::quote(listing))).unwrap();

        assert_eq!(gw.list_devices().await.unwrap(), vec!["A1".to_string(), "B2".into()]);
        assert!(gw.is_connected("A1").await.unwrap());
        assert!(!gw.is_connected("B2").await.unwrap());
        assert!(!gw.is_connected("C3").await.unwrap());
        assert!(!gw.is_connected("Z9").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let gw = AdbGateway::new("droidscan-no-such-adb-binary").unwrap();
        let err = gw.list_devices().await.unwrap_err();
        assert!(matches!(err, GatewayError::ToolUnavailable(_)));
    }
}
