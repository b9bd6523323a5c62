// Copyright (C) 2026 wgdash contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client provisioning: key generation through `wg`, address allocation,
//! config rendering and the server-config append/excise pair.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::conf;
use crate::error::GatewayError;
use crate::exec::CommandRunner;
use crate::gateway::Gateway;
use crate::qr;

const CLIENT_IP: &str = "__CLIENT_IP__";
const CLIENT_PRIVATE_KEY: &str = "__CLIENT_PRIVATE_KEY__";
const SERVER_PUBLIC_KEY: &str = "__SERVER_PUBLIC_KEY__";
const PRESHARED_KEY: &str = "__PRESHARED_KEY__";
const ENDPOINT: &str = "__ENDPOINT__";

/// Result of provisioning one client.
#[derive(Debug, Serialize)]
pub struct NewClient {
    pub name: String,
    pub ip: String,
    pub endpoint: String,
    pub public_key: String,
    pub qr_data_url: String,
    /// Whether the peer was pushed into the running interface. When false
    /// the on-disk config still holds it and the next restart picks it up.
    pub hot_reloaded: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovedClient {
    pub removed: String,
}

/// Client names end up in file names and config comments; keep them boring.
pub fn valid_client_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Literal substitution of every placeholder occurrence. No escaping, no
/// syntax: the template is plain text with magic tokens.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (token, value) in vars {
        out = out.replace(token, value);
    }
    out
}

/// Write key material and configs with owner-only permissions.
async fn write_secret(path: &Path, contents: &str) -> std::io::Result<()> {
    tokio::fs::write(path, contents).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

impl<R: CommandRunner> Gateway<R> {
    fn client_config_path(&self, name: &str) -> PathBuf {
        self.settings.configs_dir.join(format!("{name}.conf"))
    }

    fn key_path(&self, name: &str, kind: &str) -> PathBuf {
        self.settings.keys_dir.join(format!("{name}_{kind}.key"))
    }

    /// Provision a new client: generate key material through `wg`, allocate
    /// the next free address, render the importable client config, and
    /// append the peer block to the server config.
    pub async fn generate_client(&self, name: &str) -> Result<NewClient, GatewayError> {
        if !valid_client_name(name) {
            return Err(GatewayError::InvalidName);
        }

        let client_config_path = self.client_config_path(name);
        if tokio::fs::try_exists(&client_config_path).await.unwrap_or(false) {
            return Err(GatewayError::AlreadyExists(name.to_string()));
        }

        let server_config = self
            .read_config()
            .await
            .ok_or(GatewayError::NotConfigured)?;

        tokio::fs::create_dir_all(&self.settings.keys_dir).await?;
        tokio::fs::create_dir_all(&self.settings.configs_dir).await?;

        let private_key = self.runner.run("wg", &["genkey"], None).await?.trim().to_string();
        let public_key = self
            .runner
            .run("wg", &["pubkey"], Some(&private_key))
            .await?
            .trim()
            .to_string();
        let psk = self.runner.run("wg", &["genpsk"], None).await?.trim().to_string();

        write_secret(&self.key_path(name, "private"), &format!("{private_key}\n")).await?;
        write_secret(&self.key_path(name, "public"), &format!("{public_key}\n")).await?;
        write_secret(&self.key_path(name, "psk"), &format!("{psk}\n")).await?;

        let ip = conf::next_available_ip(&server_config, &self.settings.subnet)?;

        let server_public_key =
            tokio::fs::read_to_string(self.settings.keys_dir.join("server_public.key"))
                .await
                .map_err(|_| GatewayError::NotConfigured)?
                .trim()
                .to_string();

        let template = tokio::fs::read_to_string(&self.settings.template_path)
            .await
            .map_err(|_| GatewayError::NotConfigured)?;

        let endpoint = format!(
            "{}:{}",
            self.settings.endpoint_host, self.settings.endpoint_port
        );
        let client_config = render_template(
            &template,
            &[
                (CLIENT_IP, ip.as_str()),
                (CLIENT_PRIVATE_KEY, private_key.as_str()),
                (SERVER_PUBLIC_KEY, server_public_key.as_str()),
                (PRESHARED_KEY, psk.as_str()),
                (ENDPOINT, endpoint.as_str()),
            ],
        );
        write_secret(&client_config_path, &client_config).await?;

        let updated =
            conf::append_peer_block(&server_config, name, &public_key, &psk, &format!("{ip}/32"));
        write_secret(&self.settings.config_path, &updated).await?;

        let hot_reloaded = self.hot_add_peer(name, &public_key, &psk, &ip).await;

        let qr_data_url = qr::data_url(&client_config)?;

        info!(client = name, ip = %ip, hot_reloaded, "client provisioned");

        Ok(NewClient {
            name: name.to_string(),
            ip,
            endpoint,
            public_key,
            qr_data_url,
            hot_reloaded,
        })
    }

    /// Push the new peer into the running interface without a restart. The
    /// on-disk config is already durable, so failure here is non-fatal.
    /// `wg set` reads the preshared key from a file; the staged copy is
    /// removed on every exit path.
    async fn hot_add_peer(&self, name: &str, public_key: &str, psk: &str, ip: &str) -> bool {
        let Some(iface) = self.interface_name().await else {
            return false;
        };

        let tmp = self.settings.keys_dir.join(format!(".tmp_psk_{name}"));
        if let Err(e) = write_secret(&tmp, &format!("{psk}\n")).await {
            warn!(error = %e, client = name, "failed to stage preshared key");
            return false;
        }

        let tmp_arg = tmp.to_string_lossy().into_owned();
        let allowed = format!("{ip}/32");
        let result = self
            .runner
            .run(
                "wg",
                &[
                    "set",
                    &iface,
                    "peer",
                    public_key,
                    "preshared-key",
                    &tmp_arg,
                    "allowed-ips",
                    &allowed,
                ],
                None,
            )
            .await;

        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            warn!(error = %e, client = name, "failed to remove staged preshared key");
        }

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, client = name, "hot reload failed; peer loads on next restart");
                false
            }
        }
    }

    /// Revoke a client: best-effort removal from the live interface, then
    /// excise its block from the server config and delete its files.
    pub async fn remove_client(&self, name: &str) -> Result<RemovedClient, GatewayError> {
        if !valid_client_name(name) {
            return Err(GatewayError::InvalidName);
        }

        let config = self
            .read_config()
            .await
            .ok_or(GatewayError::NotConfigured)?;

        let needle = format!("{} {name}", conf::CLIENT_TAG);
        if !config.split('\n').any(|line| line.trim() == needle) {
            return Err(GatewayError::NotFound(name.to_string()));
        }

        // Drop the live peer first, while the key is still in the config.
        if let Some(public_key) = conf::list_peer_blocks(&config)
            .into_iter()
            .find(|block| block.name == name)
            .and_then(|block| block.public_key)
        {
            if let Some(iface) = self.interface_name().await {
                if let Err(e) = self
                    .runner
                    .run("wg", &["set", &iface, "peer", &public_key, "remove"], None)
                    .await
                {
                    warn!(error = %e, client = name, "live peer removal failed");
                }
            }
        }

        let updated = conf::remove_peer_block(&config, name);
        write_secret(&self.settings.config_path, &updated).await?;

        for path in [
            self.key_path(name, "private"),
            self.key_path(name, "public"),
            self.key_path(name, "psk"),
            self.client_config_path(name),
        ] {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, path = %path.display(), "failed to remove client file");
                }
            }
        }

        info!(client = name, "client removed");
        Ok(RemovedClient {
            removed: name.to_string(),
        })
    }

    /// QR rendering of an already-provisioned client's config.
    pub async fn client_qr(&self, name: &str) -> Result<String, GatewayError> {
        if !valid_client_name(name) {
            return Err(GatewayError::InvalidName);
        }

        let contents = tokio::fs::read_to_string(self.client_config_path(name))
            .await
            .map_err(|_| GatewayError::NotFound(name.to_string()))?;

        qr::data_url(&contents)
    }
}
