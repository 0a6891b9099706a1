//! Local probe identity collection

use chrono::Utc;
use netprobe_core::{ProbeId, ProbeInfo};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};

/// Snapshot the identity of the host this agent runs on
pub fn collect(probe_id: &str, name: &str) -> ProbeInfo {
    let mut interfaces: Vec<String> = NetworkInterface::show()
        .unwrap_or_default()
        .into_iter()
        .map(|iface| iface.name)
        .collect();
    interfaces.sort();
    interfaces.dedup();

    ProbeInfo {
        probe_id: ProbeId::new(probe_id),
        name: name.to_string(),
        hostname: local_hostname(),
        interfaces,
        started_at: Utc::now(),
    }
}

fn local_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .or_else(|_| std::fs::read_to_string("/etc/hostname"))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collected_info_carries_identity() {
        let info = collect("probe-1", "lab-agent");
        assert_eq!(info.probe_id.as_str(), "probe-1");
        assert_eq!(info.name, "lab-agent");
        assert!(!info.hostname.is_empty());
    }

    #[test]
    fn interface_names_are_deduplicated() {
        let info = collect("probe-1", "lab-agent");
        let mut names = info.interfaces.clone();
        names.sort();
        names.dedup();
        assert_eq!(names, info.interfaces);
    }
}
