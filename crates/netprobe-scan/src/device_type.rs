//! Coarse device-type classification
//!
//! Infers a device category from the hostname and OUI vendor of a LAN
//! host by keyword matching. Purely advisory: an unmatched host gets no
//! type at all, and a later cycle with better data can fill it in.

/// Categories and the keywords that select them, checked in order
/// against the lowercased hostname + vendor text. First match wins.
const DEVICE_TYPES: &[(&str, &[&str])] = &[
    ("router", &["router", "gateway", "fritz", "edgerouter"]),
    ("switch", &["switch"]),
    ("access point", &["access point", "wireless", "unifi", "wifi"]),
    ("printer", &["printer", "print", "laserjet", "epson", "canon"]),
    ("nas", &["nas", "synology", "qnap", "diskstation", "storage"]),
    ("camera", &["camera", "surveillance", "dvr", "nvr"]),
    ("phone", &["iphone", "android", "smartphone", "phone"]),
    ("tablet", &["ipad", "tablet"]),
    ("laptop", &["laptop", "notebook", "macbook", "thinkpad"]),
    ("desktop", &["desktop", "workstation", "imac"]),
    ("server", &["server", "rackmount", "proxmox", "esxi"]),
    ("tv", &["smarttv", "roku", "chromecast", "appletv", "-tv"]),
    ("game console", &["playstation", "xbox", "nintendo"]),
    ("iot", &["iot", "smart", "hue", "nest", "ring", "arlo", "tasmota", "shelly"]),
];

/// Classify a host from whatever identity signals the scan produced.
/// Returns `None` when neither hostname nor vendor carries a known
/// keyword.
pub fn classify(hostname: Option<&str>, vendor: Option<&str>) -> Option<&'static str> {
    let mut text = String::new();
    if let Some(h) = hostname {
        text.push_str(&h.to_lowercase());
        text.push(' ');
    }
    if let Some(v) = vendor {
        text.push_str(&v.to_lowercase());
    }
    if text.trim().is_empty() {
        return None;
    }
    DEVICE_TYPES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(device_type, _)| *device_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_keywords_classify() {
        assert_eq!(classify(Some("home-router"), None), Some("router"));
        assert_eq!(classify(Some("DISKSTATION"), None), Some("nas"));
        assert_eq!(classify(Some("johns-iPhone"), None), Some("phone"));
    }

    #[test]
    fn vendor_keywords_classify() {
        assert_eq!(
            classify(None, Some("Synology Incorporated")),
            Some("nas")
        );
        assert_eq!(classify(None, Some("Roku, Inc.")), Some("tv"));
    }

    #[test]
    fn first_matching_category_wins() {
        // "nas-server" matches both nas and server; the table is ordered
        // most-specific first
        assert_eq!(classify(Some("nas-server"), None), Some("nas"));
        assert_eq!(classify(Some("smarttv-lounge"), None), Some("tv"));
    }

    #[test]
    fn unknown_hosts_get_no_type() {
        assert_eq!(classify(Some("host-42"), Some("Acme Corp")), None);
        assert_eq!(classify(None, None), None);
        assert_eq!(classify(Some(""), None), None);
    }
}
