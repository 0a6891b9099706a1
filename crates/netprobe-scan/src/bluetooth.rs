//! Bluetooth device enumeration
//!
//! Drives `bluetoothctl`: a timed discovery pass first, then the known
//! device list, then a best-effort `info` per device for class and
//! RSSI. Hosts without a controller yield an empty scan with a warning.

use anyhow::Result;
use chrono::{DateTime, Utc};
use netprobe_core::BluetoothDevice;
use netprobe_store::Store;
use tracing::{debug, info, warn};

/// How long the discovery pass listens for advertisements
const DISCOVER_SECS: u32 = 8;

/// Enumerate nearby Bluetooth devices. Failures are recovered here; an
/// unsupported medium yields an empty result.
pub async fn scan() -> Vec<BluetoothDevice> {
    match scan_inner().await {
        Ok(devices) => {
            info!(devices = devices.len(), "Bluetooth scan complete");
            devices
        }
        Err(e) => {
            warn!(error = %e, "Bluetooth scan failed");
            Vec::new()
        }
    }
}

/// Persist one cycle's observations
pub fn store_scan(
    store: &Store,
    probe_id: &str,
    devices: &[BluetoothDevice],
    seen_at: DateTime<Utc>,
) -> Result<usize> {
    for dev in devices {
        store.upsert_bluetooth_device(probe_id, dev, seen_at)?;
    }
    Ok(devices.len())
}

async fn scan_inner() -> Result<Vec<BluetoothDevice>> {
    // Discovery pass; bluetoothctl exits when the timeout elapses.
    // A failure here (no controller, no permission) is fatal for the
    // whole scan, the later steps would see nothing anyway.
    let discover = tokio::process::Command::new("bluetoothctl")
        .args(["--timeout", &DISCOVER_SECS.to_string(), "scan", "on"])
        .output()
        .await?;
    if !discover.status.success() {
        anyhow::bail!(
            "bluetoothctl scan failed: {}",
            String::from_utf8_lossy(&discover.stderr).trim()
        );
    }

    let list = tokio::process::Command::new("bluetoothctl")
        .args(["devices"])
        .output()
        .await?;
    if !list.status.success() {
        anyhow::bail!(
            "bluetoothctl devices failed: {}",
            String::from_utf8_lossy(&list.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&list.stdout);
    let mut devices: Vec<BluetoothDevice> =
        stdout.lines().filter_map(parse_device_line).collect();

    // Detail pass is best effort per device
    for dev in &mut devices {
        match device_info(&dev.address).await {
            Ok((class, rssi)) => {
                dev.device_class = class;
                dev.rssi = rssi;
            }
            Err(e) => debug!(address = %dev.address, error = %e, "No device details"),
        }
    }

    Ok(devices)
}

/// Parse a `bluetoothctl devices` line:
/// `Device AA:BB:CC:DD:EE:FF Some Device Name`
fn parse_device_line(line: &str) -> Option<BluetoothDevice> {
    let rest = line.strip_prefix("Device ")?;
    let (address, name) = match rest.split_once(' ') {
        Some((addr, name)) => (addr, Some(name.trim().to_string())),
        None => (rest, None),
    };
    if address.len() != 17 {
        return None;
    }
    // bluetoothctl shows the address itself as a placeholder name for
    // devices that never advertised one
    let name = name.filter(|n| !n.is_empty() && n.as_str() != address);
    Some(BluetoothDevice {
        address: address.to_uppercase(),
        name,
        device_class: None,
        rssi: None,
    })
}

async fn device_info(address: &str) -> Result<(Option<String>, Option<i32>)> {
    let output = tokio::process::Command::new("bluetoothctl")
        .args(["info", address])
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!("bluetoothctl info failed for {address}");
    }
    Ok(parse_info_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Pull `Class:` and `RSSI:` values out of `bluetoothctl info` output
fn parse_info_output(stdout: &str) -> (Option<String>, Option<i32>) {
    let mut class = None;
    let mut rssi = None;
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Class:") {
            class = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("RSSI:") {
            // Newer bluez prints "RSSI: 0xffffffbc (-68)"
            let value = value.trim();
            rssi = value
                .split(['(', ')'])
                .nth(1)
                .unwrap_or(value)
                .trim()
                .parse()
                .ok();
        }
    }
    (class, rssi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_line_with_name() {
        let dev = parse_device_line("Device AA:BB:CC:DD:EE:FF JBL Flip 5").unwrap();
        assert_eq!(dev.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(dev.name.as_deref(), Some("JBL Flip 5"));
    }

    #[test]
    fn placeholder_name_becomes_none() {
        let dev = parse_device_line("Device AA:BB:CC:DD:EE:FF AA:BB:CC:DD:EE:FF").unwrap();
        assert!(dev.name.is_none());
    }

    #[test]
    fn non_device_lines_are_skipped() {
        assert!(parse_device_line("[NEW] Controller 00:11:22:33:44:55").is_none());
        assert!(parse_device_line("Device short").is_none());
    }

    #[test]
    fn parses_info_class_and_rssi() {
        let out = "\
Device AA:BB:CC:DD:EE:FF (public)
\tName: JBL Flip 5
\tClass: 0x00240404
\tRSSI: -72
";
        let (class, rssi) = parse_info_output(out);
        assert_eq!(class.as_deref(), Some("0x00240404"));
        assert_eq!(rssi, Some(-72));
    }

    #[test]
    fn parses_parenthesized_rssi() {
        let (_, rssi) = parse_info_output("\tRSSI: 0xffffffbc (-68)\n");
        assert_eq!(rssi, Some(-68));
    }
}
