use std::env;
use std::path::PathBuf;

use thiserror::Error;
use wgdash_core::gateway::GatewaySettings;

#[derive(Debug)]
pub struct Config {
    pub bind_addr: String,
    pub admin_user: String,
    /// Argon2 hash of the admin password; never the password itself.
    pub admin_pass_hash: String,
    pub jwt_secret: String,
    pub wg_conf: PathBuf,
    pub wg_name_file: PathBuf,
    /// Root for keys/, configs/ and templates/.
    pub data_dir: PathBuf,
    pub subnet: String,
    pub endpoint_host: String,
    pub endpoint_port: u16,
    pub nat_anchor: String,
    pub daemon_labels: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}")]
    MissingEnvVar { var: &'static str },

    #[error("invalid value for {var}")]
    InvalidValue { var: &'static str },
}

fn require_env(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingEnvVar { var })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint_port = match env::var("ENDPOINT_PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var: "ENDPOINT_PORT" })?,
            Err(_) => 51820,
        };

        let daemon_labels = env::var("DAEMON_LABELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            admin_user: env::var("DASHBOARD_USER").unwrap_or_else(|_| "admin".to_string()),
            admin_pass_hash: require_env("DASHBOARD_PASS_HASH")?,
            jwt_secret: require_env("JWT_SECRET")?,
            wg_conf: env::var("WG_CONF")
                .unwrap_or_else(|_| "/usr/local/etc/wireguard/wg0.conf".to_string())
                .into(),
            wg_name_file: env::var("WG_NAME_FILE")
                .unwrap_or_else(|_| "/var/run/wireguard/wg0.name".to_string())
                .into(),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "/usr/local/var/wgdash".to_string())
                .into(),
            subnet: env::var("SUBNET").unwrap_or_else(|_| "10.10.10".to_string()),
            endpoint_host: require_env("ENDPOINT_HOST")?,
            endpoint_port,
            nat_anchor: env::var("NAT_ANCHOR")
                .unwrap_or_else(|_| "com.apple/wireguard".to_string()),
            daemon_labels,
        })
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            config_path: self.wg_conf.clone(),
            name_path: self.wg_name_file.clone(),
            keys_dir: self.data_dir.join("keys"),
            configs_dir: self.data_dir.join("configs"),
            template_path: self.data_dir.join("templates").join("client.conf.template"),
            subnet: self.subnet.clone(),
            endpoint_host: self.endpoint_host.clone(),
            endpoint_port: self.endpoint_port,
            nat_anchor: self.nat_anchor.clone(),
            daemon_labels: self.daemon_labels.clone(),
        }
    }
}
