//! LAN host discovery
//!
//! Active sweep of the configured subnet (`fping` when available,
//! parallel `ping` otherwise) merged with the kernel neighbor table
//! (`ip neigh`), which supplies MAC addresses for the hosts that
//! answered. Vendors are resolved through the OUI table before the
//! observations are stored.

use crate::device_type;
use crate::oui::OuiDb;
use anyhow::Result;
use chrono::{DateTime, Utc};
use netprobe_core::{format_mac, normalize_mac, LanHost};
use netprobe_store::Store;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Entry from the kernel neighbor table
#[derive(Debug, Clone)]
struct NeighborEntry {
    ip: Ipv4Addr,
    /// Normalized MAC, absent for INCOMPLETE entries
    mac: Option<String>,
    /// Whether the kernel currently considers the neighbor alive
    active: bool,
}

/// Sweep the subnet and return this cycle's observations. Probing
/// failures are recovered here: the scanner warns and returns whatever
/// it could still collect (possibly nothing).
pub async fn scan(subnet: Ipv4Addr, prefix_len: u8, oui: &OuiDb) -> Vec<LanHost> {
    let reachable = match sweep_subnet(subnet, prefix_len).await {
        Ok(ips) => ips,
        Err(e) => {
            warn!(error = %e, "LAN sweep failed");
            Vec::new()
        }
    };

    let neighbors = match neighbor_table() {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Neighbor table unavailable");
            Vec::new()
        }
    };

    let mut hosts = merge_observations(subnet, prefix_len, &reachable, &neighbors);

    for host in &mut hosts {
        if let Some(mac) = &host.mac {
            host.vendor = oui.resolve(mac).map(str::to_string);
        }
    }
    resolve_hostnames(&mut hosts).await;

    for host in &mut hosts {
        host.device_type =
            device_type::classify(host.hostname.as_deref(), host.vendor.as_deref())
                .map(str::to_string);
        let mac = host.mac.as_deref().map(format_mac).unwrap_or_default();
        debug!(
            ip = %host.ip,
            mac = %mac,
            vendor = host.vendor.as_deref().unwrap_or(""),
            device_type = host.device_type.as_deref().unwrap_or(""),
            "LAN host observed"
        );
    }

    info!(
        hosts = hosts.len(),
        subnet = %subnet,
        prefix = prefix_len,
        "LAN scan complete"
    );
    hosts
}

/// Persist one cycle's observations
pub fn store_scan(
    store: &Store,
    probe_id: &str,
    hosts: &[LanHost],
    seen_at: DateTime<Utc>,
) -> Result<usize> {
    for host in hosts {
        store.upsert_lan_host(probe_id, host, seen_at)?;
    }
    Ok(hosts.len())
}

/// Combine sweep answers with neighbor-table entries into one
/// observation per IP. Neighbor entries without a MAC are dropped
/// unless the sweep saw the host answer.
fn merge_observations(
    subnet: Ipv4Addr,
    prefix_len: u8,
    reachable: &[Ipv4Addr],
    neighbors: &[NeighborEntry],
) -> Vec<LanHost> {
    let mut by_ip: HashMap<Ipv4Addr, LanHost> = HashMap::new();

    for &ip in reachable {
        by_ip.insert(
            ip,
            LanHost {
                ip: IpAddr::V4(ip),
                mac: None,
                vendor: None,
                hostname: None,
                device_type: None,
                reachable: true,
            },
        );
    }

    for entry in neighbors {
        if !subnet_contains(subnet, prefix_len, entry.ip) {
            continue;
        }
        match by_ip.get_mut(&entry.ip) {
            Some(host) => {
                if host.mac.is_none() {
                    host.mac = entry.mac.clone();
                }
            }
            None => {
                if let Some(mac) = &entry.mac {
                    by_ip.insert(
                        entry.ip,
                        LanHost {
                            ip: IpAddr::V4(entry.ip),
                            mac: Some(mac.clone()),
                            vendor: None,
                            hostname: None,
                            device_type: None,
                            reachable: entry.active,
                        },
                    );
                }
            }
        }
    }

    let mut hosts: Vec<LanHost> = by_ip.into_values().collect();
    hosts.sort_by_key(|h| h.ip);
    hosts
}

/// Read the kernel neighbor table via `ip neigh show`
fn neighbor_table() -> Result<Vec<NeighborEntry>> {
    let output = Command::new("ip").args(["neigh", "show"]).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "ip neigh failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let entries: Vec<NeighborEntry> = stdout.lines().filter_map(parse_neighbor_line).collect();
    debug!(entries = entries.len(), "Neighbor table read");
    Ok(entries)
}

/// Parse one `ip neigh show` line:
/// `192.168.1.1 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE`
fn parse_neighbor_line(line: &str) -> Option<NeighborEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let ip = Ipv4Addr::from_str(parts.first()?).ok()?;

    let mac = parts
        .iter()
        .position(|&p| p == "lladdr")
        .and_then(|idx| parts.get(idx + 1))
        .and_then(|raw| normalize_mac(raw));

    let active = matches!(
        parts.last().copied(),
        Some("REACHABLE") | Some("DELAY") | Some("PROBE") | Some("PERMANENT")
    );

    Some(NeighborEntry { ip, mac, active })
}

fn subnet_contains(subnet: Ipv4Addr, prefix_len: u8, ip: Ipv4Addr) -> bool {
    let mask = prefix_mask(prefix_len);
    (u32::from(ip) & mask) == (u32::from(subnet) & mask)
}

fn prefix_mask(prefix_len: u8) -> u32 {
    if prefix_len >= 32 {
        u32::MAX
    } else {
        !((1u32 << (32 - prefix_len)) - 1)
    }
}

/// All host addresses of the subnet, excluding network and broadcast
fn enumerate_hosts(subnet: Ipv4Addr, prefix_len: u8) -> Vec<Ipv4Addr> {
    let mask = prefix_mask(prefix_len);
    let network = u32::from(subnet) & mask;
    let broadcast = network | !mask;
    (network.saturating_add(1)..broadcast)
        .map(Ipv4Addr::from)
        .collect()
}

/// Ping-sweep the subnet, returning the hosts that answered
async fn sweep_subnet(subnet: Ipv4Addr, prefix_len: u8) -> Result<Vec<Ipv4Addr>> {
    let hosts = enumerate_hosts(subnet, prefix_len);
    debug!(
        hosts = hosts.len(),
        subnet = %subnet,
        prefix = prefix_len,
        "Sweeping subnet"
    );

    if fping_available() {
        sweep_with_fping(&hosts)
    } else {
        Ok(sweep_with_ping(&hosts).await)
    }
}

fn fping_available() -> bool {
    Command::new("which")
        .arg("fping")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn sweep_with_fping(hosts: &[Ipv4Addr]) -> Result<Vec<Ipv4Addr>> {
    let host_list: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
    let output = Command::new("fping")
        .args(["-a", "-q", "-r", "1", "-t", "200"])
        .args(&host_list)
        .output()?;

    // fping exits non-zero when any host is unreachable; only the
    // alive list on stdout matters
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter_map(|l| Ipv4Addr::from_str(l.trim()).ok())
        .collect())
}

async fn sweep_with_ping(hosts: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
    use tokio::task::JoinSet;

    let mut tasks = JoinSet::new();
    for &ip in hosts {
        tasks.spawn(async move {
            let result = tokio::process::Command::new("ping")
                .args(["-c", "1", "-W", "1", &ip.to_string()])
                .output()
                .await;
            match result {
                Ok(output) if output.status.success() => Some(ip),
                _ => None,
            }
        });
    }

    let mut reachable = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Some(ip)) = result {
            reachable.push(ip);
        }
    }
    reachable
}

/// Best-effort reverse lookup for the hosts that answered the sweep
async fn resolve_hostnames(hosts: &mut [LanHost]) {
    use tokio::task::JoinSet;

    let mut tasks = JoinSet::new();
    for (idx, host) in hosts.iter().enumerate() {
        if !host.reachable {
            continue;
        }
        let ip = host.ip;
        tasks.spawn(async move { (idx, reverse_lookup(ip).await) });
    }

    while let Some(result) = tasks.join_next().await {
        if let Ok((idx, Some(name))) = result {
            hosts[idx].hostname = Some(name);
        }
    }
}

async fn reverse_lookup(ip: IpAddr) -> Option<String> {
    let output = tokio::process::Command::new("getent")
        .args(["hosts", &ip.to_string()])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .split_whitespace()
        .nth(1)
        .map(|name| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_neighbor_line_reachable() {
        let entry =
            parse_neighbor_line("192.168.1.100 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE")
                .unwrap();
        assert_eq!(entry.ip, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(entry.mac.as_deref(), Some("AABBCCDDEEFF"));
        assert!(entry.active);
    }

    #[test]
    fn parse_neighbor_line_stale_is_inactive() {
        let entry = parse_neighbor_line("192.168.1.100 dev eth0 lladdr aa:bb:cc:dd:ee:ff STALE")
            .unwrap();
        assert!(!entry.active);
        assert!(entry.mac.is_some());
    }

    #[test]
    fn parse_neighbor_line_incomplete_has_no_mac() {
        let entry = parse_neighbor_line("192.168.1.100 dev eth0 INCOMPLETE").unwrap();
        assert!(entry.mac.is_none());
        assert!(!entry.active);
    }

    #[test]
    fn parse_neighbor_line_rejects_garbage() {
        assert!(parse_neighbor_line("").is_none());
        assert!(parse_neighbor_line("not-an-ip dev eth0").is_none());
    }

    #[test]
    fn subnet_membership() {
        let subnet = Ipv4Addr::new(192, 168, 1, 0);
        assert!(subnet_contains(subnet, 24, Ipv4Addr::new(192, 168, 1, 42)));
        assert!(!subnet_contains(subnet, 24, Ipv4Addr::new(192, 168, 2, 1)));
        assert!(subnet_contains(subnet, 16, Ipv4Addr::new(192, 168, 200, 1)));
    }

    #[test]
    fn enumerate_hosts_excludes_network_and_broadcast() {
        let hosts = enumerate_hosts(Ipv4Addr::new(10, 0, 0, 0), 30);
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn merge_prefers_sweep_reachability_and_neighbor_macs() {
        let subnet = Ipv4Addr::new(10, 0, 0, 0);
        let reachable = vec![Ipv4Addr::new(10, 0, 0, 5)];
        let neighbors = vec![
            NeighborEntry {
                ip: Ipv4Addr::new(10, 0, 0, 5),
                mac: Some("AABBCCDDEEFF".into()),
                active: false,
            },
            // Known to the kernel but silent this cycle
            NeighborEntry {
                ip: Ipv4Addr::new(10, 0, 0, 9),
                mac: Some("112233445566".into()),
                active: false,
            },
            // Outside the subnet, must be ignored
            NeighborEntry {
                ip: Ipv4Addr::new(172, 16, 0, 1),
                mac: Some("FFEEDDCCBBAA".into()),
                active: true,
            },
        ];

        let hosts = merge_observations(subnet, 24, &reachable, &neighbors);
        assert_eq!(hosts.len(), 2);

        let swept = hosts
            .iter()
            .find(|h| h.ip == IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
            .unwrap();
        assert!(swept.reachable);
        assert_eq!(swept.mac.as_deref(), Some("AABBCCDDEEFF"));

        let silent = hosts
            .iter()
            .find(|h| h.ip == IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)))
            .unwrap();
        assert!(!silent.reachable);
    }

    #[test]
    fn merge_drops_macless_neighbors_that_did_not_answer() {
        let neighbors = vec![NeighborEntry {
            ip: Ipv4Addr::new(10, 0, 0, 3),
            mac: None,
            active: false,
        }];
        let hosts = merge_observations(Ipv4Addr::new(10, 0, 0, 0), 24, &[], &neighbors);
        assert!(hosts.is_empty());
    }
}
