//! netprobe Scan - Medium scanners and vendor lookup
//!
//! This crate provides the three per-cycle probes:
//! - LAN sweep (ping sweep merged with the kernel neighbor table, with
//!   vendor and device-type enrichment)
//! - Wi-Fi access-point enumeration (nmcli)
//! - Bluetooth device enumeration (bluetoothctl)
//!
//! plus the OUI vendor database manager (staleness-checked refresh from
//! the IEEE registry, longest-prefix lookup).
//!
//! Scanners share one contract: probe the environment, return whatever
//! was observed this cycle (possibly nothing), and never let a probing
//! failure escape. A medium that is unsupported or denied on this host
//! logs a warning and yields an empty result.

pub mod bluetooth;
pub mod device_type;
pub mod lan;
pub mod oui;
pub mod wifi;

pub use oui::OuiDb;
