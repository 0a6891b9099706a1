//! Capture session rows
//!
//! Invariant: at most one session is open (`ended_at` NULL) at any
//! moment. `open_session` is preceded at daemon startup by
//! `close_stale_sessions`, which sweeps up sessions a crash left open,
//! so the invariant holds across restarts too.

use crate::Store;
use anyhow::Result;
use chrono::{DateTime, Utc};
use netprobe_core::CaptureStats;
use rusqlite::{params, OptionalExtension};
use tracing::warn;

/// A persisted capture session row
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub session_id: String,
    pub interface: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub stats: CaptureStats,
}

impl Store {
    pub fn open_session(
        &self,
        session_id: &str,
        probe_id: &str,
        interface: &str,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO capture_sessions(session_id, probe_id, interface, started_at)
             VALUES (?,?,?,?)",
            params![session_id, probe_id, interface, started_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Close a session, writing its final counters. Only touches the row
    /// while it is still open, so a second close is a no-op.
    pub fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        stats: &CaptureStats,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE capture_sessions
             SET ended_at=?, packet_count=?, unique_src_ips=?, printable_payloads=?
             WHERE session_id=? AND ended_at IS NULL",
            params![
                ended_at.to_rfc3339(),
                stats.packet_count as i64,
                stats.unique_src_ips as i64,
                stats.printable_payloads as i64,
                session_id,
            ],
        )?;
        Ok(updated > 0)
    }

    /// Update a running session's counters without closing it. Lets the
    /// persisted row track the live counters between stats reports.
    pub fn update_session_counters(&self, session_id: &str, stats: &CaptureStats) -> Result<()> {
        self.conn.execute(
            "UPDATE capture_sessions
             SET packet_count=?, unique_src_ips=?, printable_payloads=?
             WHERE session_id=?",
            params![
                stats.packet_count as i64,
                stats.unique_src_ips as i64,
                stats.printable_payloads as i64,
                session_id,
            ],
        )?;
        Ok(())
    }

    /// Close any session a previous run left open. Returns how many rows
    /// were swept, which is 0 after a clean shutdown.
    pub fn close_stale_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let swept = self.conn.execute(
            "UPDATE capture_sessions SET ended_at=? WHERE ended_at IS NULL",
            params![now.to_rfc3339()],
        )?;
        if swept > 0 {
            warn!(sessions = swept, "Closed capture sessions left open by a previous run");
        }
        Ok(swept)
    }

    pub fn open_session_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(1) FROM capture_sessions WHERE ended_at IS NULL",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT session_id, interface, started_at, ended_at,
                        packet_count, unique_src_ips, printable_payloads
                 FROM capture_sessions WHERE session_id=?",
                params![session_id],
                |r| {
                    Ok(SessionRow {
                        session_id: r.get(0)?,
                        interface: r.get(1)?,
                        started_at: parse_ts(r.get(2)?),
                        ended_at: r.get::<_, Option<String>>(3)?.map(parse_ts),
                        stats: CaptureStats {
                            packet_count: r.get::<_, i64>(4)? as u64,
                            unique_src_ips: r.get::<_, i64>(5)? as u64,
                            printable_payloads: r.get::<_, i64>(6)? as u64,
                        },
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use netprobe_core::{ProbeId, ProbeInfo};

    fn store_with_probe() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_probe_info(&ProbeInfo {
                probe_id: ProbeId::new("probe-1"),
                name: "p".into(),
                hostname: "h".into(),
                interfaces: vec![],
                started_at: Utc::now(),
            })
            .unwrap();
        store
    }

    fn stats(n: u64) -> CaptureStats {
        CaptureStats {
            packet_count: n,
            unique_src_ips: 3,
            printable_payloads: n / 2,
        }
    }

    #[test]
    fn at_most_one_open_session() {
        let store = store_with_probe();
        store
            .open_session("s-1", "probe-1", "eth0", Utc::now())
            .unwrap();
        assert_eq!(store.open_session_count().unwrap(), 1);

        store.close_session("s-1", Utc::now(), &stats(10)).unwrap();
        store
            .open_session("s-2", "probe-1", "eth0", Utc::now())
            .unwrap();
        assert_eq!(store.open_session_count().unwrap(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let store = store_with_probe();
        store
            .open_session("s-1", "probe-1", "eth0", Utc::now())
            .unwrap();

        assert!(store.close_session("s-1", Utc::now(), &stats(42)).unwrap());
        // Second close must not overwrite the recorded counters
        assert!(!store.close_session("s-1", Utc::now(), &stats(0)).unwrap());

        let row = store.get_session("s-1").unwrap().unwrap();
        assert_eq!(row.stats.packet_count, 42);
        assert!(row.ended_at.is_some());
    }

    #[test]
    fn startup_sweep_restores_the_singleton_invariant() {
        let store = store_with_probe();
        store
            .open_session("crashed", "probe-1", "eth0", Utc::now())
            .unwrap();

        // Simulated restart: sweep, then open the new session
        assert_eq!(store.close_stale_sessions(Utc::now()).unwrap(), 1);
        store
            .open_session("fresh", "probe-1", "eth0", Utc::now())
            .unwrap();
        assert_eq!(store.open_session_count().unwrap(), 1);
    }
}
