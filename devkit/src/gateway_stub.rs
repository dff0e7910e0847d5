/*!
Passerelle adb simulée pour développement sans téléphone

Remplace `AdbGateway` dans les tests : liste live, autorisation USB,
réponses par (appareil, commande), pannes injectées. Journalise chaque commande.
*/

use crate::fixtures::DeviceScript;
use async_trait::async_trait;
use droidscan_kernel::gateway::{DeviceGateway, GatewayError};
use droidscan_kernel::models::DeviceId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct FakeState {
    live: Vec<DeviceId>,
    unauthorized: HashSet<DeviceId>,
    replies: HashMap<(DeviceId, String), Reply>,
    tool_missing: bool,
    log: Vec<(DeviceId, String)>,
    list_calls: usize,
    server_starts: usize,
}

/// Clonable : tous les clones partagent le même état
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Branche un appareil (no-op s'il est déjà visible)
    pub fn plug(&self, device_id: &str) -> &Self {
        let mut st = self.state();
        if !st.live.iter().any(|id| id == device_id) {
            st.live.push(device_id.to_string());
        }
        self
    }

    pub fn unplug(&self, device_id: &str) -> &Self {
        self.state().live.retain(|id| id != device_id);
        self
    }

    pub fn set_live(&self, ids: &[&str]) -> &Self {
        self.state().live = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn live(&self) -> Vec<DeviceId> {
        self.state().live.clone()
    }

    /// `false` = la boîte de dialogue USB n'a pas encore été acceptée
    pub fn set_authorized(&self, device_id: &str, authorized: bool) -> &Self {
        let mut st = self.state();
        if authorized {
            st.unauthorized.remove(device_id);
        } else {
            st.unauthorized.insert(device_id.to_string());
        }
        self
    }

    pub fn reply(&self, device_id: &str, command: &str, output: &str) -> &Self {
        self.state()
            .replies
            .insert((device_id.to_string(), command.to_string()), Reply::Text(output.to_string()));
        self
    }

    /// La commande échoue avec `CommandFailed(stderr)`
    pub fn fail(&self, device_id: &str, command: &str, stderr: &str) -> &Self {
        self.state()
            .replies
            .insert((device_id.to_string(), command.to_string()), Reply::Fail(stderr.to_string()));
        self
    }

    pub fn script(&self, device_id: &str, script: &DeviceScript) -> &Self {
        for (command, output) in script.entries() {
            self.reply(device_id, command, output);
        }
        self
    }

    /// Simule un binaire adb absent : toute opération -> `ToolUnavailable`
    pub fn break_tool(&self) -> &Self {
        self.state().tool_missing = true;
        self
    }

    pub fn repair_tool(&self) -> &Self {
        self.state().tool_missing = false;
        self
    }

    pub fn commands_for(&self, device_id: &str) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter(|(id, _)| id == device_id)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn server_starts(&self) -> usize {
        self.state().server_starts
    }

    fn check_tool(st: &FakeState) -> Result<(), GatewayError> {
        if st.tool_missing {
            return Err(GatewayError::ToolUnavailable("adb not found".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceGateway for FakeGateway {
    async fn list_devices(&self) -> Result<Vec<DeviceId>, GatewayError> {
        let mut st = self.state();
        st.list_calls += 1;
        Self::check_tool(&st)?;
        Ok(st.live.clone())
    }

    async fn execute(&self, device_id: &str, command: &str) -> Result<String, GatewayError> {
        let mut st = self.state();
        Self::check_tool(&st)?;
        st.log.push((device_id.to_string(), command.to_string()));
        if !st.live.iter().any(|id| id == device_id) {
            return Err(GatewayError::CommandFailed(format!("device '{device_id}' not found")));
        }
        match st.replies.get(&(device_id.to_string(), command.to_string())) {
            Some(Reply::Text(out)) => Ok(out.clone()),
            Some(Reply::Fail(stderr)) => Err(GatewayError::CommandFailed(stderr.clone())),
            None => Ok(String::new()),
        }
    }

    async fn ensure_server_running(&self) -> Result<(), GatewayError> {
        let mut st = self.state();
        Self::check_tool(&st)?;
        st.server_starts += 1;
        Ok(())
    }

    async fn authorize(&self, device_id: &str) -> Result<bool, GatewayError> {
        let st = self.state();
        Self::check_tool(&st)?;
        Ok(st.live.iter().any(|id| id == device_id) && !st.unauthorized.contains(device_id))
    }
}
