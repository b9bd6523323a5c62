//! Host-level status: tunnel, IP forwarding, NAT rules, public address and
//! launchd daemons. Every probe degrades to "off"/absent on failure; an
//! admin dashboard should report a broken host, not crash on it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::exec::CommandRunner;
use crate::gateway::Gateway;
use crate::status::{self, TunnelInfo};

#[derive(Debug, Serialize)]
pub struct TunnelStatus {
    pub up: bool,
    pub iface: Option<String>,
    #[serde(flatten)]
    pub info: TunnelInfo,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub tunnel: TunnelStatus,
    pub ip_forwarding: bool,
    pub nat: Option<String>,
    pub public_ip: Option<String>,
    pub daemons: BTreeMap<String, bool>,
}

impl<R: CommandRunner> Gateway<R> {
    pub async fn tunnel_status(&self) -> TunnelStatus {
        let Some(iface) = self.interface_name().await else {
            return TunnelStatus {
                up: false,
                iface: None,
                info: TunnelInfo::default(),
            };
        };

        match self.runner.run("wg", &["show", &iface], None).await {
            Ok(output) => TunnelStatus {
                up: true,
                iface: Some(iface),
                info: status::parse_interface(&output),
            },
            Err(_) => TunnelStatus {
                up: false,
                iface: Some(iface),
                info: TunnelInfo::default(),
            },
        }
    }

    pub async fn ip_forwarding(&self) -> bool {
        match self
            .runner
            .run("sysctl", &["-n", "net.inet.ip.forwarding"], None)
            .await
        {
            Ok(out) => out.trim() == "1",
            Err(_) => false,
        }
    }

    pub async fn nat_rules(&self) -> Option<String> {
        let out = self
            .runner
            .run("pfctl", &["-a", &self.settings.nat_anchor, "-s", "nat"], None)
            .await
            .ok()?;
        let out = out.trim();
        (!out.is_empty()).then(|| out.to_string())
    }

    pub async fn public_ip(&self) -> Option<String> {
        let out = self
            .runner
            .run("curl", &["-s", "--max-time", "5", "ifconfig.me"], None)
            .await
            .ok()?;
        Some(out.trim().to_string())
    }

    pub async fn daemon_loaded(&self, label: &str) -> bool {
        self.runner
            .run("launchctl", &["list", label], None)
            .await
            .is_ok()
    }

    /// One aggregated snapshot; all probes run concurrently.
    pub async fn system_status(&self) -> SystemStatus {
        let daemon_checks = futures::future::join_all(
            self.settings
                .daemon_labels
                .iter()
                .map(|label| async move { (label.clone(), self.daemon_loaded(label).await) }),
        );

        let (tunnel, ip_forwarding, nat, public_ip, daemon_states) = tokio::join!(
            self.tunnel_status(),
            self.ip_forwarding(),
            self.nat_rules(),
            self.public_ip(),
            daemon_checks,
        );
        let daemons: BTreeMap<String, bool> = daemon_states.into_iter().collect();

        SystemStatus {
            tunnel,
            ip_forwarding,
            nat,
            public_ip,
            daemons,
        }
    }
}
