//! OUI vendor table persistence
//!
//! The vendor table is refreshed as a whole: a successful fetch replaces
//! every row inside one transaction, so lookups either see the old table
//! or the new one, never a partial merge. `refreshed_at` is carried on
//! every row; the staleness check reads the newest one.

use crate::Store;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;

impl Store {
    /// Replace the entire vendor table with a freshly fetched one.
    /// Prefixes are expected pre-normalized (bare uppercase hex).
    pub fn replace_oui_entries(
        &mut self,
        entries: &[(String, String)],
        refreshed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM oui_entries", [])?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO oui_entries(prefix, vendor, refreshed_at) VALUES (?,?,?)",
            )?;
            let ts = refreshed_at.to_rfc3339();
            for (prefix, vendor) in entries {
                inserted += stmt.execute(params![prefix, vendor, ts])?;
            }
        }
        tx.commit()?;
        debug!(entries = inserted, "OUI table replaced");
        Ok(inserted)
    }

    /// Timestamp of the last successful refresh, None when the table has
    /// never been populated
    pub fn oui_refreshed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let ts: Option<String> =
            self.conn
                .query_row("SELECT MAX(refreshed_at) FROM oui_entries", [], |r| {
                    r.get(0)
                })?;
        Ok(ts.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .ok()
        }))
    }

    /// Load every (prefix, vendor) pair for the in-memory lookup table
    pub fn load_oui_entries(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT prefix, vendor FROM oui_entries")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn replace_swaps_the_whole_table() {
        let mut store = Store::open_in_memory().unwrap();
        let t1 = Utc::now();
        store
            .replace_oui_entries(
                &[("AABBCC".into(), "OldVendor".into())],
                t1 - Duration::days(60),
            )
            .unwrap();
        store
            .replace_oui_entries(
                &[
                    ("DDEEFF".into(), "NewVendor".into()),
                    ("001122".into(), "OtherVendor".into()),
                ],
                t1,
            )
            .unwrap();

        let entries = store.load_oui_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries.iter().any(|(p, _)| p == "AABBCC"));
        assert_eq!(
            store.oui_refreshed_at().unwrap().unwrap().timestamp(),
            t1.timestamp()
        );
    }

    #[test]
    fn empty_table_has_no_refresh_timestamp() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.oui_refreshed_at().unwrap().is_none());
    }
}
