//! Wi-Fi access-point enumeration
//!
//! Uses NetworkManager's `nmcli` in terse mode, which is scriptable and
//! available on most Linux systems the agent targets. Hosts without
//! NetworkManager (or without a Wi-Fi adapter) simply yield an empty
//! scan with a warning.

use anyhow::Result;
use chrono::{DateTime, Utc};
use netprobe_core::WifiNetwork;
use netprobe_store::Store;
use tracing::{info, warn};

/// Enumerate visible access points. Failures are recovered here; an
/// unsupported medium yields an empty result.
pub async fn scan() -> Vec<WifiNetwork> {
    match scan_inner().await {
        Ok(networks) => {
            info!(networks = networks.len(), "Wi-Fi scan complete");
            networks
        }
        Err(e) => {
            warn!(error = %e, "Wi-Fi scan failed");
            Vec::new()
        }
    }
}

/// Persist one cycle's observations
pub fn store_scan(
    store: &Store,
    probe_id: &str,
    networks: &[WifiNetwork],
    seen_at: DateTime<Utc>,
) -> Result<usize> {
    for net in networks {
        store.upsert_wifi_network(probe_id, net, seen_at)?;
    }
    Ok(networks.len())
}

async fn scan_inner() -> Result<Vec<WifiNetwork>> {
    let output = tokio::process::Command::new("nmcli")
        .args([
            "-t",
            "-f",
            "SSID,BSSID,CHAN,SIGNAL,SECURITY",
            "dev",
            "wifi",
            "list",
            "--rescan",
            "yes",
        ])
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!(
            "nmcli failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_terse_output(&stdout))
}

fn parse_terse_output(stdout: &str) -> Vec<WifiNetwork> {
    stdout.lines().filter_map(parse_terse_line).collect()
}

/// Parse one line of `nmcli -t` output. Fields are colon-separated and
/// literal colons (as in BSSIDs) are backslash-escaped:
/// `MyNet:AA\:BB\:CC\:DD\:EE\:FF:6:72:WPA2`
fn parse_terse_line(line: &str) -> Option<WifiNetwork> {
    let fields = split_terse_fields(line);
    if fields.len() < 5 {
        return None;
    }

    let bssid = fields[1].trim();
    if bssid.is_empty() {
        return None;
    }

    let security = match fields[4].trim() {
        "" | "--" => None,
        s => Some(s.to_string()),
    };

    Some(WifiNetwork {
        bssid: bssid.to_uppercase(),
        ssid: fields[0].clone(),
        channel: fields[2].trim().parse().ok(),
        signal: fields[3].trim().parse().ok(),
        security,
    })
}

/// Split on unescaped colons, unescaping `\:` and `\\` within fields
fn split_terse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_escaped_bssid_colons() {
        let fields = split_terse_fields(r"MyNet:AA\:BB\:CC\:DD\:EE\:FF:6:72:WPA2");
        assert_eq!(
            fields,
            vec!["MyNet", "AA:BB:CC:DD:EE:FF", "6", "72", "WPA2"]
        );
    }

    #[test]
    fn parses_full_line() {
        let net = parse_terse_line(r"office-5g:0A\:1B\:2C\:3D\:4E\:5F:44:87:WPA2 WPA3").unwrap();
        assert_eq!(net.bssid, "0A:1B:2C:3D:4E:5F");
        assert_eq!(net.ssid, "office-5g");
        assert_eq!(net.channel, Some(44));
        assert_eq!(net.signal, Some(87));
        assert_eq!(net.security.as_deref(), Some("WPA2 WPA3"));
    }

    #[test]
    fn hidden_ssid_and_open_security() {
        let net = parse_terse_line(r":AA\:BB\:CC\:DD\:EE\:FF:1:40:--").unwrap();
        assert_eq!(net.ssid, "");
        assert!(net.security.is_none());
    }

    #[test]
    fn lines_without_bssid_are_dropped() {
        assert!(parse_terse_line("garbage").is_none());
        assert!(parse_terse_line("net::6:50:WPA2").is_none());
    }

    #[test]
    fn parses_multi_line_output() {
        let out = "a:11\\:22\\:33\\:44\\:55\\:66:1:50:WPA2\nb:AA\\:BB\\:CC\\:DD\\:EE\\:FF:11:70:WPA1\n";
        let nets = parse_terse_output(out);
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[1].bssid, "AA:BB:CC:DD:EE:FF");
    }
}
