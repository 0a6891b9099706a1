//! OUI vendor database manager
//!
//! The IEEE registry maps MAC address prefixes to vendor names. The
//! table is cached in the store and refreshed when older than the
//! configured staleness threshold; a failed refresh keeps the cached
//! table authoritative until the next scheduled check.

use anyhow::Result;
use chrono::{Duration, Utc};
use netprobe_core::normalize_mac;
use netprobe_store::Store;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default registry source (MA-L, 24-bit prefixes)
pub const DEFAULT_SOURCE_URL: &str = "https://standards-oui.ieee.org/oui.txt";

const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// In-memory vendor lookup table with longest-prefix resolution.
///
/// Prefixes are normalized to bare uppercase hex. Resolution tries each
/// distinct prefix length present in the table, longest first, so a
/// lookup costs one hash probe per length (the registry has at most a
/// handful: 24-, 28- and 36-bit blocks).
pub struct OuiDb {
    by_prefix: HashMap<String, String>,
    /// Distinct prefix lengths present, longest first
    prefix_lens: Vec<usize>,
}

impl OuiDb {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut by_prefix = HashMap::new();
        for (prefix, vendor) in entries {
            if let Some(normalized) = normalize_mac(&prefix) {
                by_prefix.insert(normalized, vendor);
            }
        }
        let mut prefix_lens: Vec<usize> = by_prefix.keys().map(|p| p.len()).collect();
        prefix_lens.sort_unstable_by(|a, b| b.cmp(a));
        prefix_lens.dedup();
        Self {
            by_prefix,
            prefix_lens,
        }
    }

    /// Load the cached table from the store
    pub fn load(store: &Store) -> Result<Self> {
        let entries = store.load_oui_entries()?;
        debug!(entries = entries.len(), "OUI table loaded");
        Ok(Self::from_entries(entries))
    }

    /// Vendor for the longest prefix matching this MAC, if any
    pub fn resolve(&self, mac: &str) -> Option<&str> {
        let normalized = normalize_mac(mac)?;
        for &len in &self.prefix_lens {
            if len > normalized.len() {
                continue;
            }
            if let Some(vendor) = self.by_prefix.get(&normalized[..len]) {
                return Some(vendor);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }
}

/// Parse the IEEE registry text format: lines like
/// `AA-BB-CC   (hex)\t\tVendor Name`
pub fn parse_registry(text: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for line in text.lines() {
        if !line.contains("(hex)") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(prefix) = parts.next() else { continue };
        // Skip the "(hex)" marker itself
        let vendor: String = parts.skip(1).collect::<Vec<_>>().join(" ");
        if vendor.is_empty() {
            continue;
        }
        if let Some(normalized) = normalize_mac(prefix) {
            entries.push((normalized, vendor));
        }
    }
    entries
}

/// Refresh the cached vendor table when it is stale (or missing).
/// Returns true when a refresh actually happened. Fetch failures are
/// recovered here: the cached table stays authoritative and the next
/// scheduled check retries.
pub async fn check_and_update(
    store: &mut Store,
    staleness_days: u32,
    source_url: &str,
) -> Result<bool> {
    let stale = match store.oui_refreshed_at()? {
        Some(ts) => Utc::now() - ts >= Duration::days(i64::from(staleness_days)),
        None => true,
    };
    if !stale {
        debug!("OUI table is fresh, skipping refresh");
        return Ok(false);
    }

    info!(url = source_url, "Refreshing OUI vendor table");
    let text = match fetch_registry(source_url).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "OUI refresh failed, keeping cached table");
            return Ok(false);
        }
    };

    let entries = parse_registry(&text);
    if entries.is_empty() {
        warn!("OUI registry fetch returned no parseable entries, keeping cached table");
        return Ok(false);
    }

    let inserted = store.replace_oui_entries(&entries, Utc::now())?;
    info!(entries = inserted, "OUI vendor table refreshed");
    Ok(true)
}

async fn fetch_registry(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("netprobe/", env!("CARGO_PKG_VERSION")))
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}
