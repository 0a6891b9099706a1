//! netprobe Core - Shared types for the discovery and capture agent
//!
//! This crate provides the foundational types for the netprobe system:
//! - Probe identity (the scanning host every observation is keyed by)
//! - Observed entities for the three mediums (LAN, Wi-Fi, Bluetooth)
//! - Capture session statistics
//! - MAC address normalization helpers

pub mod capture;
pub mod entity;
pub mod mac;

pub use capture::{CaptureSession, CaptureStats};
pub use entity::{BluetoothDevice, LanHost, ProbeId, ProbeInfo, WifiNetwork};
pub use mac::{format_mac, normalize_mac};
