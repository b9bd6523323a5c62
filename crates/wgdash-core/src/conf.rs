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

//! The server config file as a peer store.
//!
//! The same file is consumed directly by the WireGuard daemon, so it cannot
//! be normalized into structured storage: every function here round-trips
//! untouched content byte-for-byte and only ever appends or excises one
//! comment-tagged block. Changing a client means delete and recreate.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::GatewayError;

/// Comment tag binding a human-readable client name to the `[Peer]` stanza
/// that follows it. WireGuard itself never sees comment lines.
pub const CLIENT_TAG: &str = "# Cliente:";

/// Stanza fields are only attributed to a client comment when they appear
/// within this many lines after it.
const LOOKAHEAD: usize = 4;

/// One provisioned client recovered from the config text. Fields stay unset
/// when the stanza is missing or outside the look-ahead window; the block is
/// still reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerBlock {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<String>,
}

fn comment_name(line: &str) -> Option<&str> {
    line.trim().strip_prefix(CLIENT_TAG).map(str::trim)
}

/// Everything after the first `=`, trimmed. Later `=` characters stay part
/// of the value; base64 keys end with them.
fn field_value(line: &str) -> Option<&str> {
    line.split_once('=').map(|(_, value)| value.trim())
}

/// All client blocks, in file order.
pub fn list_peer_blocks(text: &str) -> Vec<PeerBlock> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut blocks = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(name) = comment_name(line) else {
            continue;
        };

        let mut block = PeerBlock {
            name: name.to_string(),
            public_key: None,
            allowed_ips: None,
        };

        for ahead in lines.iter().skip(i + 1).take(LOOKAHEAD) {
            let ahead = ahead.trim();
            if block.public_key.is_none() && ahead.starts_with("PublicKey") {
                block.public_key = field_value(ahead).map(str::to_string);
            } else if block.allowed_ips.is_none() && ahead.starts_with("AllowedIPs") {
                block.allowed_ips = field_value(ahead).map(str::to_string);
            }
        }

        blocks.push(block);
    }

    blocks
}

/// Index of public key to client name. A duplicated key keeps the later
/// block's name; not treated as an error.
pub fn public_key_to_name(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for block in list_peer_blocks(text) {
        if let Some(key) = block.public_key {
            map.insert(key, block.name);
        }
    }

    map
}

/// First free address in the `/24` pool, scanning host octets 2..=254 in
/// ascending order. `.1` is reserved for the server.
pub fn next_available_ip(text: &str, subnet: &str) -> Result<String, GatewayError> {
    let used = used_addresses(text, subnet);

    for host in 2u8..=254 {
        let candidate = format!("{subnet}.{host}");
        if !used.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(GatewayError::PoolExhausted)
}

/// Every `subnet.<digits>` substring anywhere in the text, plus the reserved
/// `.1`. Deliberately not stanza-aware: an address embedded in a comment or
/// a pasted template still counts as taken.
fn used_addresses(text: &str, subnet: &str) -> HashSet<String> {
    let prefix = format!("{subnet}.");
    let mut used = HashSet::new();

    for (idx, _) in text.match_indices(&prefix) {
        let rest = &text[idx + prefix.len()..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if end > 0 {
            used.insert(format!("{subnet}.{}", &rest[..end]));
        }
    }

    used.insert(format!("{subnet}.1"));
    used
}

/// Append a fixed-shape client block: blank-line separator, name comment,
/// `[Peer]` stanza, trailing newline. Pure append; uniqueness is the
/// caller's problem.
pub fn append_peer_block(
    text: &str,
    name: &str,
    public_key: &str,
    preshared_key: &str,
    allowed_ips: &str,
) -> String {
    format!(
        "{text}\n{CLIENT_TAG} {name}\n[Peer]\nPublicKey = {public_key}\nPresharedKey = {preshared_key}\nAllowedIPs = {allowed_ips}\n"
    )
}

/// Excise the named client's block, leaving all other lines untouched.
///
/// The blank separator line preceding the comment is removed with it, so
/// removal is symmetric with [`append_peer_block`]. After the comment,
/// contiguous `[Peer]`/`PublicKey`/`PresharedKey`/`AllowedIPs` lines are
/// consumed; a blank stopping line is consumed too, any other stopping line
/// is kept. A line breaking that contiguity (another comment, say) ends the
/// skip early and later stanza lines survive; existing deployments depend on
/// that, so it stays.
///
/// An unknown name returns the input unchanged, byte-for-byte.
pub fn remove_peer_block(text: &str, name: &str) -> String {
    let needle = format!("{CLIENT_TAG} {name}");
    let mut result: Vec<&str> = Vec::new();
    let mut skipping = false;

    for line in text.split('\n') {
        if line.trim() == needle {
            skipping = true;
            if result.last().is_some_and(|prev| prev.trim().is_empty()) {
                result.pop();
            }
            continue;
        }

        if skipping {
            let trimmed = line.trim();
            if trimmed == "[Peer]"
                || trimmed.starts_with("PublicKey")
                || trimmed.starts_with("PresharedKey")
                || trimmed.starts_with("AllowedIPs")
            {
                continue;
            }
            skipping = false;
            if trimmed.is_empty() {
                continue;
            }
        }

        result.push(line);
    }

    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const ALICE: &str = "# Cliente: alice\n[Peer]\nPublicKey = ABC\nAllowedIPs = 10.10.10.2/32\n";

    fn base_config() -> String {
        "[Interface]\nAddress = 10.10.10.1/24\nListenPort = 51820\nPrivateKey = KEY=".to_string()
    }

    // -- Block listing -------------------------------------------------------

    #[test]
    fn empty_text_lists_nothing() {
        assert!(list_peer_blocks("").is_empty());
    }

    #[test]
    fn single_block_scenario() {
        let blocks = list_peer_blocks(ALICE);
        assert_eq!(
            blocks,
            vec![PeerBlock {
                name: "alice".to_string(),
                public_key: Some("ABC".to_string()),
                allowed_ips: Some("10.10.10.2/32".to_string()),
            }]
        );
    }

    #[test]
    fn blocks_come_back_in_file_order() {
        let text = format!(
            "{}\n# Cliente: bob\n[Peer]\nPublicKey = DEF\nAllowedIPs = 10.10.10.3/32\n",
            ALICE
        );
        let names: Vec<_> = list_peer_blocks(&text).into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn comment_without_stanza_still_emits_block() {
        let blocks = list_peer_blocks("# Cliente: ghost\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "ghost");
        assert_eq!(blocks[0].public_key, None);
        assert_eq!(blocks[0].allowed_ips, None);
    }

    #[test]
    fn fields_outside_lookahead_window_are_not_attributed() {
        let text = "# Cliente: far\n\n\n\n\nPublicKey = TOOFAR\n";
        let blocks = list_peer_blocks(text);
        assert_eq!(blocks[0].public_key, None);
    }

    #[test]
    fn value_keeps_embedded_equals_signs() {
        let text = "# Cliente: pad\n[Peer]\nPublicKey = abc123==\n";
        let blocks = list_peer_blocks(text);
        assert_eq!(blocks[0].public_key.as_deref(), Some("abc123=="));
    }

    #[test]
    fn duplicate_field_in_window_keeps_first_value() {
        let text = "# Cliente: twice\n[Peer]\nPublicKey = FIRST\nPublicKey = SECOND\n";
        let blocks = list_peer_blocks(text);
        assert_eq!(blocks[0].public_key.as_deref(), Some("FIRST"));
    }

    #[test]
    fn key_map_joins_names_and_later_block_wins_on_collision() {
        let text = "# Cliente: a\n[Peer]\nPublicKey = SAME\n\n# Cliente: b\n[Peer]\nPublicKey = SAME\n";
        let map = public_key_to_name(text);
        assert_eq!(map.len(), 1);
        assert_eq!(map["SAME"], "b");
    }

    // -- Address pool --------------------------------------------------------

    #[test]
    fn empty_config_allocates_dot_two() {
        assert_eq!(next_available_ip("", "10.10.10").unwrap(), "10.10.10.2");
    }

    #[test]
    fn never_allocates_reserved_server_address() {
        // .1 only appears implicitly; .2 taken in the text.
        let text = "AllowedIPs = 10.10.10.2/32";
        assert_eq!(next_available_ip(text, "10.10.10").unwrap(), "10.10.10.3");
    }

    #[test]
    fn matches_addresses_anywhere_in_text() {
        // Not stanza-aware: a commented-out address still counts.
        let text = "# old client used 10.10.10.2 once\n";
        assert_eq!(next_available_ip(text, "10.10.10").unwrap(), "10.10.10.3");
    }

    #[test]
    fn skips_to_first_gap() {
        let text = "10.10.10.2 10.10.10.3 10.10.10.5";
        assert_eq!(next_available_ip(text, "10.10.10").unwrap(), "10.10.10.4");
    }

    #[test]
    fn full_pool_is_exhausted() {
        let mut text = String::new();
        for host in 2u8..=254 {
            text.push_str(&format!("10.10.10.{host}\n"));
        }
        assert!(matches!(
            next_available_ip(&text, "10.10.10"),
            Err(GatewayError::PoolExhausted)
        ));
    }

    #[test]
    fn other_subnets_do_not_count() {
        let text = "10.10.11.2 192.168.1.2";
        assert_eq!(next_available_ip(text, "10.10.10").unwrap(), "10.10.10.2");
    }

    // -- Append / remove -----------------------------------------------------

    #[test]
    fn append_shape() {
        let out = append_peer_block("X", "alice", "PK=", "PSK=", "10.10.10.2/32");
        assert_eq!(
            out,
            "X\n# Cliente: alice\n[Peer]\nPublicKey = PK=\nPresharedKey = PSK=\nAllowedIPs = 10.10.10.2/32\n"
        );
    }

    #[test]
    fn append_then_remove_round_trips() {
        let original = base_config();
        let appended = append_peer_block(&original, "alice", "PK", "PSK", "10.10.10.2/32");
        assert_eq!(remove_peer_block(&appended, "alice"), original);
    }

    #[test_case("alice" ; "first block")]
    #[test_case("bob" ; "second block")]
    fn round_trip_with_two_clients(victim: &str) {
        let original = base_config();
        let both = append_peer_block(
            &append_peer_block(&original, "alice", "A", "PA", "10.10.10.2/32"),
            "bob",
            "B",
            "PB",
            "10.10.10.3/32",
        );
        let removed = remove_peer_block(&both, victim);
        assert!(!removed.contains(&format!("# Cliente: {victim}")));
        for survivor in ["alice", "bob"] {
            if survivor != victim {
                assert!(removed.contains(&format!("# Cliente: {survivor}")));
            }
        }
    }

    #[test]
    fn remove_unknown_name_is_byte_for_byte_noop() {
        let appended = append_peer_block(&base_config(), "alice", "PK", "PSK", "10.10.10.2/32");
        assert_eq!(remove_peer_block(&appended, "mallory"), appended);
    }

    #[test]
    fn remove_first_block_leaves_no_leading_blank_line() {
        // Scenario from a config whose first line is already a client block.
        let appended = append_peer_block(ALICE.trim_end(), "bob", "B", "PB", "10.10.10.3/32");
        let removed = remove_peer_block(&appended, "alice");
        assert_eq!(
            removed,
            "# Cliente: bob\n[Peer]\nPublicKey = B\nPresharedKey = PB\nAllowedIPs = 10.10.10.3/32\n"
        );
    }

    #[test]
    fn interrupted_stanza_ends_skip_early_and_keeps_stragglers() {
        // A foreign comment inside the stanza stops the skip; the stanza
        // lines after it survive. Compatibility behavior, pinned on purpose.
        let text = "# Cliente: a\n[Peer]\nPublicKey = A\n# note\nPresharedKey = X\n";
        assert_eq!(remove_peer_block(text, "a"), "# note\nPresharedKey = X\n");
    }

    #[test]
    fn adjacent_comment_line_is_kept() {
        let text = "# Cliente: a\n[Peer]\nPublicKey = A\n# Cliente: b\n[Peer]\nPublicKey = B\n";
        assert_eq!(
            remove_peer_block(text, "a"),
            "# Cliente: b\n[Peer]\nPublicKey = B\n"
        );
    }

    #[test]
    fn untouched_lines_survive_byte_for_byte() {
        let text = format!(
            "[Interface]\n  Indented = kept  \n\n{}\n# trailing comment",
            "# Cliente: gone\n[Peer]\nPublicKey = G"
        );
        let removed = remove_peer_block(&text, "gone");
        assert!(removed.contains("  Indented = kept  "));
        assert!(removed.contains("# trailing comment"));
    }
}
