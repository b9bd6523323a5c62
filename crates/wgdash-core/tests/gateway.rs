use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use wgdash_core::GatewayError;
use wgdash_core::exec::{CommandRunner, ExecError};
use wgdash_core::gateway::{Gateway, GatewaySettings};

// -- Scripted runner ---------------------------------------------------------

const SHOW_OUTPUT: &str = "\
interface: utun7
  public key: SRV_PUB=
  listening port: 51820

peer: CLIENT_PUB=
  endpoint: 198.51.100.4:53231
  allowed ips: 10.10.10.2/32
  latest handshake: 30 seconds ago
  transfer: 1.00 MiB received, 2.00 MiB sent
";

/// Records every invocation and answers `wg`/`sysctl`/... with canned
/// output; no real process is ever spawned.
#[derive(Default)]
struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    fail_wg_set: bool,
}

impl ScriptedRunner {
    fn failing_set() -> Self {
        Self {
            fail_wg_set: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, ExecError> {
        let mut line = vec![command.to_string()];
        line.extend(args.iter().map(|a| a.to_string()));
        self.calls.lock().unwrap().push(line.join(" "));

        match (command, args.first().copied()) {
            ("wg", Some("genkey")) => Ok("CLIENT_PRIV=\n".into()),
            ("wg", Some("pubkey")) => {
                assert_eq!(stdin, Some("CLIENT_PRIV="));
                Ok("CLIENT_PUB=\n".into())
            }
            ("wg", Some("genpsk")) => Ok("CLIENT_PSK=\n".into()),
            ("wg", Some("show")) => Ok(SHOW_OUTPUT.into()),
            ("wg", Some("set")) if self.fail_wg_set => Err(ExecError::Failed {
                command: "wg".into(),
                code: Some(1),
                stderr: "Unable to modify interface".into(),
            }),
            ("wg", Some("set")) => Ok(String::new()),
            ("sysctl", _) => Ok("1\n".into()),
            ("pfctl", _) => Ok("nat on en0 from 10.10.10.0/24 to any\n".into()),
            ("curl", _) => Ok("203.0.113.9\n".into()),
            ("launchctl", _) => Ok("{ \"PID\" = 4242; }\n".into()),
            _ => Ok(String::new()),
        }
    }
}

// -- Fixture -----------------------------------------------------------------

const SERVER_CONF: &str = "[Interface]\nAddress = 10.10.10.1/24\nListenPort = 51820\nPrivateKey = SRV_PRIV=";

const TEMPLATE: &str = "\
[Interface]
PrivateKey = __CLIENT_PRIVATE_KEY__
Address = __CLIENT_IP__/32

[Peer]
PublicKey = __SERVER_PUBLIC_KEY__
PresharedKey = __PRESHARED_KEY__
Endpoint = __ENDPOINT__
AllowedIPs = 0.0.0.0/0
";

struct Fixture {
    // Held so the tempdir outlives the test.
    _dir: TempDir,
    settings: GatewaySettings,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let settings = GatewaySettings {
            config_path: root.join("wg0.conf"),
            name_path: root.join("wg0.name"),
            keys_dir: root.join("keys"),
            configs_dir: root.join("configs"),
            template_path: root.join("client.conf.template"),
            subnet: "10.10.10".into(),
            endpoint_host: "vpn.example.com".into(),
            endpoint_port: 51820,
            nat_anchor: "com.apple/wireguard".into(),
            daemon_labels: vec!["com.example.wg".into(), "com.example.dns".into()],
        };

        std::fs::write(&settings.config_path, SERVER_CONF).unwrap();
        std::fs::create_dir_all(&settings.keys_dir).unwrap();
        std::fs::write(settings.keys_dir.join("server_public.key"), "SRV_PUB=\n").unwrap();
        std::fs::write(&settings.template_path, TEMPLATE).unwrap();

        Self { _dir: dir, settings }
    }

    fn with_running_tunnel(self) -> Self {
        std::fs::write(&self.settings.name_path, "utun7\n").unwrap();
        self
    }

    fn gateway(&self, runner: ScriptedRunner) -> Gateway<ScriptedRunner> {
        Gateway::new(runner, self.settings.clone())
    }

    fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

// -- Provisioning ------------------------------------------------------------

#[tokio::test]
async fn generate_client_writes_keys_config_and_peer_block() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    let created = gw.generate_client("laptop").await.unwrap();

    assert_eq!(created.name, "laptop");
    assert_eq!(created.ip, "10.10.10.2");
    assert_eq!(created.public_key, "CLIENT_PUB=");
    assert_eq!(created.endpoint, "vpn.example.com:51820");
    assert!(!created.hot_reloaded);
    assert!(created.qr_data_url.starts_with("data:image/png;base64,"));

    for kind in ["private", "public", "psk"] {
        assert!(fx.settings.keys_dir.join(format!("laptop_{kind}.key")).exists());
    }

    let client_conf = fx.read(&fx.settings.configs_dir.join("laptop.conf"));
    assert!(client_conf.contains("PrivateKey = CLIENT_PRIV="));
    assert!(client_conf.contains("Address = 10.10.10.2/32"));
    assert!(client_conf.contains("PublicKey = SRV_PUB="));
    assert!(client_conf.contains("Endpoint = vpn.example.com:51820"));
    assert!(!client_conf.contains("__"));

    let server_conf = fx.read(&fx.settings.config_path);
    assert!(server_conf.contains("# Cliente: laptop"));
    assert!(server_conf.contains("PublicKey = CLIENT_PUB="));
    assert!(server_conf.contains("AllowedIPs = 10.10.10.2/32"));
}

#[tokio::test]
async fn second_client_gets_next_address() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    gw.generate_client("one").await.unwrap();
    let second = gw.generate_client("two").await.unwrap();
    assert_eq!(second.ip, "10.10.10.3");
}

#[tokio::test]
async fn duplicate_client_is_rejected() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    gw.generate_client("laptop").await.unwrap();
    let err = gw.generate_client("laptop").await.unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyExists(ref n) if n == "laptop"));
}

#[tokio::test]
async fn bad_name_is_rejected_before_any_subprocess() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::default();
    let gw = fx.gateway(runner);

    let err = gw.generate_client("bad name").await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidName));
    assert!(gw.runner().calls().is_empty());
}

#[tokio::test]
async fn missing_server_config_is_not_configured() {
    let fx = Fixture::new();
    std::fs::remove_file(&fx.settings.config_path).unwrap();
    let gw = fx.gateway(ScriptedRunner::default());

    let err = gw.generate_client("laptop").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotConfigured));
}

#[tokio::test]
async fn hot_reload_runs_wg_set_and_cleans_staged_psk() {
    let fx = Fixture::new().with_running_tunnel();
    let gw = fx.gateway(ScriptedRunner::default());

    let created = gw.generate_client("phone").await.unwrap();
    assert!(created.hot_reloaded);

    let set_call = gw
        .runner()
        .calls()
        .into_iter()
        .find(|c| c.starts_with("wg set"))
        .expect("wg set was invoked");
    assert!(set_call.contains("peer CLIENT_PUB="));
    assert!(set_call.contains("allowed-ips 10.10.10.2/32"));
    assert!(set_call.contains("preshared-key"));

    assert!(!fx.settings.keys_dir.join(".tmp_psk_phone").exists());
}

#[tokio::test]
async fn failed_hot_reload_is_non_fatal_and_still_cleans_up() {
    let fx = Fixture::new().with_running_tunnel();
    let gw = fx.gateway(ScriptedRunner::failing_set());

    let created = gw.generate_client("phone").await.unwrap();
    assert!(!created.hot_reloaded);
    // Durable state was written regardless.
    assert!(fx.read(&fx.settings.config_path).contains("# Cliente: phone"));
    assert!(!fx.settings.keys_dir.join(".tmp_psk_phone").exists());
}

// -- Removal -----------------------------------------------------------------

#[tokio::test]
async fn add_then_remove_restores_server_config() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    gw.generate_client("laptop").await.unwrap();
    gw.remove_client("laptop").await.unwrap();

    assert_eq!(fx.read(&fx.settings.config_path), SERVER_CONF);
    assert!(!fx.settings.configs_dir.join("laptop.conf").exists());
    assert!(!fx.settings.keys_dir.join("laptop_private.key").exists());
}

#[tokio::test]
async fn remove_unknown_client_is_not_found() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    let err = gw.remove_client("nobody").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(ref n) if n == "nobody"));
    assert_eq!(fx.read(&fx.settings.config_path), SERVER_CONF);
}

#[tokio::test]
async fn remove_with_running_tunnel_drops_live_peer() {
    let fx = Fixture::new().with_running_tunnel();
    let gw = fx.gateway(ScriptedRunner::default());

    gw.generate_client("laptop").await.unwrap();
    gw.remove_client("laptop").await.unwrap();

    let calls = gw.runner().calls();
    assert!(
        calls
            .iter()
            .any(|c| c == "wg set utun7 peer CLIENT_PUB= remove")
    );
}

// -- Reads and live state ----------------------------------------------------

#[tokio::test]
async fn list_clients_degrades_to_empty_without_config() {
    let fx = Fixture::new();
    std::fs::remove_file(&fx.settings.config_path).unwrap();
    let gw = fx.gateway(ScriptedRunner::default());

    assert!(gw.list_clients().await.is_empty());
    assert!(gw.client_map().await.is_empty());
}

#[tokio::test]
async fn peers_without_interface_name_is_empty() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    let show = gw.peers().await;
    assert_eq!(show.iface, None);
    assert!(show.peers.is_empty());
    assert!(!gw.is_up().await);
}

#[tokio::test]
async fn peers_with_running_tunnel_parses_wg_show() {
    let fx = Fixture::new().with_running_tunnel();
    let gw = fx.gateway(ScriptedRunner::default());

    let show = gw.peers().await;
    assert_eq!(show.iface.as_deref(), Some("utun7"));
    assert_eq!(show.peers.len(), 1);
    assert_eq!(show.peers[0].public_key, "CLIENT_PUB=");
    assert_eq!(show.peers[0].rx.as_deref(), Some("1.00 MiB"));
}

#[tokio::test]
async fn disconnect_without_tunnel_is_not_running() {
    let fx = Fixture::new();
    let gw = fx.gateway(ScriptedRunner::default());

    let err = gw.disconnect_peer("CLIENT_PUB=").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotRunning));
}

#[tokio::test]
async fn system_status_aggregates_probes() {
    let fx = Fixture::new().with_running_tunnel();
    let gw = fx.gateway(ScriptedRunner::default());

    let status = gw.system_status().await;
    assert!(status.tunnel.up);
    assert_eq!(status.tunnel.iface.as_deref(), Some("utun7"));
    assert_eq!(status.tunnel.info.listen_port.as_deref(), Some("51820"));
    assert!(status.ip_forwarding);
    assert!(status.nat.as_deref().unwrap().contains("nat on en0"));
    assert_eq!(status.public_ip.as_deref(), Some("203.0.113.9"));
    assert_eq!(status.daemons.get("com.example.wg"), Some(&true));
    assert_eq!(status.daemons.get("com.example.dns"), Some(&true));

    let launchctl_calls = gw
        .runner()
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("launchctl list"))
        .count();
    assert_eq!(launchctl_calls, 2);
}
