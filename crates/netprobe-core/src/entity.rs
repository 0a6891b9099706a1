//! Entity types for observations made by the medium scanners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Unique identifier for a probe (the scanning host running the agent)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeId(pub String);

impl ProbeId {
    /// Create a ProbeId from a configured identity string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random probe identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProbeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the scanning host, upserted into the store at every startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeInfo {
    pub probe_id: ProbeId,
    /// Human-readable probe name from configuration
    pub name: String,
    /// Hostname of the machine the probe runs on
    pub hostname: String,
    /// Names of the network interfaces present at startup
    pub interfaces: Vec<String>,
    pub started_at: DateTime<Utc>,
}

/// A host observed on the wired LAN during one scan cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanHost {
    pub ip: IpAddr,
    /// Normalized MAC address, when the neighbor table exposes one
    pub mac: Option<String>,
    /// Vendor name resolved from the OUI table (longest matching prefix)
    pub vendor: Option<String>,
    /// Reverse-resolved name, best effort
    pub hostname: Option<String>,
    /// Coarse device category inferred from hostname and vendor keywords
    pub device_type: Option<String>,
    /// Whether the host answered the sweep this cycle
    pub reachable: bool,
}

/// A Wi-Fi access point observed during one scan cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    /// BSSID of the access point, the natural key for this medium
    pub bssid: String,
    pub ssid: String,
    pub channel: Option<u32>,
    /// Signal strength in dBm (or the adapter's percentage scale)
    pub signal: Option<i32>,
    /// Security type as reported by the adapter (e.g. "WPA2")
    pub security: Option<String>,
}

/// A Bluetooth device observed during one scan cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    /// Bluetooth device address, the natural key for this medium
    pub address: String,
    pub name: Option<String>,
    /// Raw device class value when the controller reports one
    pub device_class: Option<String>,
    pub rssi: Option<i32>,
}
