//! Parser for the textual output of `wg show <iface>`.
//!
//! Records are ephemeral: they exist for the duration of one status query
//! and have no identity beyond it.

use serde::Serialize;

/// One peer from live `wg show` output.
///
/// `rx`/`tx` carry display values with the trailing `received`/`sent` word
/// stripped; `rx_raw`/`tx_raw` keep the untouched halves for consumers that
/// want the original units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimePeer {
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_handshake: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_raw: Option<String>,
    pub has_psk: bool,
}

impl RuntimePeer {
    fn new(public_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            ..Self::default()
        }
    }
}

/// Interface header fields from the same output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TunnelInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Line scanner over `wg show` output: a `peer:` line flushes the record in
/// progress and opens the next one; field lines accumulate into the current
/// record; end of input flushes the last.
pub fn parse_peers(output: &str) -> Vec<RuntimePeer> {
    let mut peers = Vec::new();
    let mut current: Option<RuntimePeer> = None;

    for line in output.lines() {
        let line = line.trim();

        if let Some(key) = line.strip_prefix("peer:") {
            if let Some(done) = current.take() {
                peers.push(done);
            }
            current = Some(RuntimePeer::new(key.trim()));
            continue;
        }

        let Some(peer) = current.as_mut() else {
            continue;
        };

        if let Some(value) = line.strip_prefix("endpoint:") {
            peer.endpoint = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("allowed ips:") {
            peer.allowed_ips = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("latest handshake:") {
            peer.latest_handshake = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("transfer:") {
            // Split on the first comma: "X received, Y sent".
            if let Some((rx, tx)) = value.split_once(',') {
                peer.rx_raw = Some(rx.trim().to_string());
                peer.tx_raw = Some(tx.trim().to_string());
                peer.rx = Some(rx.replace("received", "").trim().to_string());
                peer.tx = Some(tx.replace("sent", "").trim().to_string());
            }
        } else if line.starts_with("preshared key:") {
            peer.has_psk = true;
        }
    }

    if let Some(done) = current.take() {
        peers.push(done);
    }

    peers
}

/// Header scan for the interface section (listening port, public key).
pub fn parse_interface(output: &str) -> TunnelInfo {
    let mut info = TunnelInfo::default();

    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("listening port:") {
            info.listen_port = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("public key:") {
            info.public_key = Some(value.trim().to_string());
        }
    }

    info
}
