//! Capture session types shared between the capture subsystem and the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One continuous run of the packet capture subsystem, bounded by start
/// and stop. At most one session is open (`ended_at` null) at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSession {
    pub session_id: String,
    pub probe_id: String,
    /// Interface the session captured on
    pub interface: String,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, when the session is closed
    pub ended_at: Option<DateTime<Utc>>,
    pub packet_count: u64,
    pub unique_src_ips: u64,
    pub printable_payloads: u64,
}

/// Consistent snapshot of a running (or finished) session's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub packet_count: u64,
    pub unique_src_ips: u64,
    pub printable_payloads: u64,
}

impl CaptureStats {
    /// Share of observed packets whose payload passed the printable
    /// heuristic, as a percentage
    pub fn printable_pct(&self) -> f64 {
        if self.packet_count == 0 {
            0.0
        } else {
            self.printable_payloads as f64 / self.packet_count as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_pct_of_empty_session_is_zero() {
        let stats = CaptureStats {
            packet_count: 0,
            unique_src_ips: 0,
            printable_payloads: 0,
        };
        assert_eq!(stats.printable_pct(), 0.0);
    }

    #[test]
    fn printable_pct() {
        let stats = CaptureStats {
            packet_count: 200,
            unique_src_ips: 4,
            printable_payloads: 50,
        };
        assert_eq!(stats.printable_pct(), 25.0);
    }
}
