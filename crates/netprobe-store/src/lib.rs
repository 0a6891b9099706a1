//! netprobe Store - Embedded relational persistence
//!
//! Observations from the medium scanners, capture session counters, and
//! the OUI vendor table all land in a single SQLite database opened in
//! WAL mode, so short-lived scanner connections and the long-lived
//! capture connection can coexist without blocking each other.
//!
//! The concurrency discipline is one [`Store`] per task: every scanner
//! job and the capture worker open their own connection, scoped to the
//! task's lifetime, and drop it on completion. Connections are never
//! shared across tasks. Writes are partitioned by entity type, so no
//! two tasks ever touch the same row.

mod entities;
mod open;
mod oui;
mod schema;
mod sessions;

pub use entities::{BluetoothRow, LanHostRow, WifiRow};
pub use open::Store;
pub use sessions::SessionRow;
