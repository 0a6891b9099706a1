//! Configuration loading and probe identity persistence

use anyhow::Result;
use netprobe_core::ProbeId;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sniffing: SniffingConfig,
    #[serde(default)]
    pub oui: OuiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Stable probe identity. Generated and written back on first run
    /// when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable probe name
    #[serde(default = "default_probe_name")]
    pub name: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_probe_name(),
        }
    }
}

fn default_probe_name() -> String {
    "netprobe".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Subnet swept by the LAN scanner
    #[serde(default = "default_subnet")]
    pub subnet: Ipv4Addr,
    /// Subnet prefix length
    #[serde(default = "default_prefix")]
    pub prefix_len: u8,
    /// Pause between scan cycles in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Report and persist capture statistics every N cycles
    #[serde(default = "default_stats_every")]
    pub stats_every_cycles: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            prefix_len: default_prefix(),
            interval_secs: default_interval(),
            stats_every_cycles: default_stats_every(),
        }
    }
}

fn default_subnet() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 0)
}

fn default_prefix() -> u8 {
    24
}

fn default_interval() -> u64 {
    600
}

fn default_stats_every() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SniffingConfig {
    /// Whether passive packet capture runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Capture interface; auto-detected when unset
    #[serde(default)]
    pub interface: Option<String>,
}

impl Default for SniffingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interface: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuiConfig {
    /// Age in days after which the cached vendor table is refreshed
    #[serde(default = "default_staleness")]
    pub staleness_days: u32,
    /// Registry download URL
    #[serde(default = "default_source_url")]
    pub source_url: String,
}

impl Default for OuiConfig {
    fn default() -> Self {
        Self {
            staleness_days: default_staleness(),
            source_url: default_source_url(),
        }
    }
}

fn default_staleness() -> u32 {
    30
}

fn default_source_url() -> String {
    netprobe_scan::oui::DEFAULT_SOURCE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("netprobe.db")
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Return the configured probe identity, minting and persisting one
/// when the configuration does not carry an id yet. Persistence is best
/// effort: a read-only configuration file just means the identity does
/// not survive a restart.
pub fn ensure_probe_id(config: &mut Config, path: &Path) -> String {
    if let Some(id) = &config.probe.id {
        return id.clone();
    }

    let id = ProbeId::generate();
    config.probe.id = Some(id.as_str().to_string());
    match toml::to_string_pretty(&config) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not persist generated probe id"
                );
            } else {
                info!(probe = %id, path = %path.display(), "Generated probe identity");
            }
        }
        Err(e) => warn!(error = %e, "Could not serialize configuration"),
    }
    id.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scan.interval_secs, 600);
        assert_eq!(config.scan.stats_every_cycles, 5);
        assert_eq!(config.scan.prefix_len, 24);
        assert!(config.sniffing.enabled);
        assert_eq!(config.oui.staleness_days, 30);
        assert_eq!(config.database.path, PathBuf::from("netprobe.db"));
        assert!(config.probe.id.is_none());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[scan]
subnet = "10.0.0.0"
interval_secs = 60

[sniffing]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(config.scan.subnet, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(config.scan.interval_secs, 60);
        assert_eq!(config.scan.prefix_len, 24);
        assert!(!config.sniffing.enabled);
        assert!(config.sniffing.interface.is_none());
    }

    #[test]
    fn generated_probe_id_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netprobe.toml");

        let mut config = Config::default();
        let id = ensure_probe_id(&mut config, &path);
        assert!(!id.is_empty());

        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.probe.id.as_deref(), Some(id.as_str()));

        // Second call returns the persisted id instead of minting
        let mut reloaded = reloaded;
        assert_eq!(ensure_probe_id(&mut reloaded, &path), id);
    }
}
