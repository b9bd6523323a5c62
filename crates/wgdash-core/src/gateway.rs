use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::conf::{self, PeerBlock};
use crate::error::GatewayError;
use crate::exec::CommandRunner;
use crate::status::{self, RuntimePeer};

/// Where the gateway's state lives on disk and how to reach the tunnel.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// WireGuard server config, shared with the daemon itself.
    pub config_path: PathBuf,
    /// File wg-quick writes the real interface name into (on macOS, `wg0`
    /// resolves to a `utun` device).
    pub name_path: PathBuf,
    pub keys_dir: PathBuf,
    pub configs_dir: PathBuf,
    pub template_path: PathBuf,
    /// First three octets of the tunnel /24, e.g. `10.10.10`.
    pub subnet: String,
    pub endpoint_host: String,
    pub endpoint_port: u16,
    /// pf anchor holding the NAT rules.
    pub nat_anchor: String,
    /// launchd labels to report status for.
    pub daemon_labels: Vec<String>,
}

/// Live peers plus the interface they were read from.
#[derive(Debug, Serialize)]
pub struct WgShow {
    pub iface: Option<String>,
    pub peers: Vec<RuntimePeer>,
}

/// All gateway operations, generic over the subprocess port so the whole
/// service runs against a scripted runner in tests.
pub struct Gateway<R> {
    pub(crate) runner: R,
    pub(crate) settings: GatewaySettings,
}

impl<R: CommandRunner> Gateway<R> {
    pub fn new(runner: R, settings: GatewaySettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Raw server config text. An unreadable file degrades to `None`; read
    /// paths report "nothing configured" rather than failing.
    pub async fn read_config(&self) -> Option<String> {
        tokio::fs::read_to_string(&self.settings.config_path)
            .await
            .ok()
    }

    /// Resolved tunnel interface name, if the daemon has written one.
    pub async fn interface_name(&self) -> Option<String> {
        let name = tokio::fs::read_to_string(&self.settings.name_path)
            .await
            .ok()?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub async fn is_up(&self) -> bool {
        match self.interface_name().await {
            Some(iface) => self.runner.run("wg", &["show", &iface], None).await.is_ok(),
            None => false,
        }
    }

    /// Live peers from `wg show`. No interface or a failed invocation
    /// degrades to an empty list.
    pub async fn peers(&self) -> WgShow {
        let Some(iface) = self.interface_name().await else {
            return WgShow {
                iface: None,
                peers: Vec::new(),
            };
        };

        let peers = match self.runner.run("wg", &["show", &iface], None).await {
            Ok(output) => status::parse_peers(&output),
            Err(e) => {
                warn!(error = %e, iface, "wg show failed");
                Vec::new()
            }
        };

        WgShow {
            iface: Some(iface),
            peers,
        }
    }

    /// Public key to client name, from the config file.
    pub async fn client_map(&self) -> HashMap<String, String> {
        match self.read_config().await {
            Some(text) => conf::public_key_to_name(&text),
            None => HashMap::new(),
        }
    }

    /// All provisioned clients, in config-file order.
    pub async fn list_clients(&self) -> Vec<PeerBlock> {
        match self.read_config().await {
            Some(text) => conf::list_peer_blocks(&text),
            None => Vec::new(),
        }
    }

    /// Remove a peer from the running interface only. The config file keeps
    /// its block, so the peer returns on the next tunnel restart.
    pub async fn disconnect_peer(&self, public_key: &str) -> Result<(), GatewayError> {
        let iface = self
            .interface_name()
            .await
            .ok_or(GatewayError::NotRunning)?;

        self.runner
            .run("wg", &["set", &iface, "peer", public_key, "remove"], None)
            .await?;
        Ok(())
    }
}
