//! Upserts for scanner observations
//!
//! Every entity has a natural key (`(probe_id, ip, mac)`, `(probe_id,
//! bssid)`, `(probe_id, address)`). The first observation inserts the
//! row with `first_seen = last_seen`; every later observation updates
//! `last_seen` and the mutable fields in place. Entities not seen in a
//! cycle are left untouched; staleness is a query-time concern.

use crate::Store;
use anyhow::Result;
use chrono::{DateTime, Utc};
use netprobe_core::{BluetoothDevice, LanHost, ProbeInfo, WifiNetwork};
use rusqlite::{params, OptionalExtension};

/// A persisted LAN host row, as read back for queries and tests
#[derive(Debug, Clone)]
pub struct LanHostRow {
    pub ip: String,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub hostname: Option<String>,
    pub device_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub reachable: bool,
}

#[derive(Debug, Clone)]
pub struct WifiRow {
    pub bssid: String,
    pub ssid: String,
    pub channel: Option<u32>,
    pub signal: Option<i32>,
    pub security: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BluetoothRow {
    pub address: String,
    pub name: Option<String>,
    pub device_class: Option<String>,
    pub rssi: Option<i32>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

impl Store {
    /// Register or refresh this probe's identity. Keyed by probe_id, so
    /// restarts update the existing row rather than inserting a new one.
    pub fn upsert_probe_info(&self, info: &ProbeInfo) -> Result<()> {
        let interfaces = serde_json::to_string(&info.interfaces)?;
        self.conn.execute(
            "INSERT INTO probe_info(probe_id, name, hostname, interfaces, started_at)
             VALUES (?,?,?,?,?)
             ON CONFLICT(probe_id) DO UPDATE SET
               name=excluded.name, hostname=excluded.hostname,
               interfaces=excluded.interfaces, started_at=excluded.started_at",
            params![
                info.probe_id.as_str(),
                info.name,
                info.hostname,
                interfaces,
                info.started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_lan_host(
        &self,
        probe_id: &str,
        host: &LanHost,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        // The unique key stores an unknown MAC as '' so SQLite enforces
        // uniqueness (NULLs would compare distinct)
        let mac = host.mac.clone().unwrap_or_default();
        self.conn.execute(
            "INSERT INTO lan_hosts(probe_id, ip, mac, vendor, hostname, device_type, first_seen, last_seen, reachable)
             VALUES (?,?,?,?,?,?,?,?,?)
             ON CONFLICT(probe_id, ip, mac) DO UPDATE SET
               vendor=COALESCE(excluded.vendor, lan_hosts.vendor),
               hostname=COALESCE(excluded.hostname, lan_hosts.hostname),
               device_type=COALESCE(excluded.device_type, lan_hosts.device_type),
               last_seen=excluded.last_seen,
               reachable=excluded.reachable",
            params![
                probe_id,
                host.ip.to_string(),
                mac,
                host.vendor,
                host.hostname,
                host.device_type,
                seen_at.to_rfc3339(),
                seen_at.to_rfc3339(),
                host.reachable as i64,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_wifi_network(
        &self,
        probe_id: &str,
        net: &WifiNetwork,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO wifi_networks(probe_id, bssid, ssid, channel, signal, security, first_seen, last_seen)
             VALUES (?,?,?,?,?,?,?,?)
             ON CONFLICT(probe_id, bssid) DO UPDATE SET
               ssid=excluded.ssid,
               channel=COALESCE(excluded.channel, wifi_networks.channel),
               signal=COALESCE(excluded.signal, wifi_networks.signal),
               security=COALESCE(excluded.security, wifi_networks.security),
               last_seen=excluded.last_seen",
            params![
                probe_id,
                net.bssid,
                net.ssid,
                net.channel,
                net.signal,
                net.security,
                seen_at.to_rfc3339(),
                seen_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_bluetooth_device(
        &self,
        probe_id: &str,
        dev: &BluetoothDevice,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bluetooth_devices(probe_id, address, name, device_class, rssi, first_seen, last_seen)
             VALUES (?,?,?,?,?,?,?)
             ON CONFLICT(probe_id, address) DO UPDATE SET
               name=COALESCE(excluded.name, bluetooth_devices.name),
               device_class=COALESCE(excluded.device_class, bluetooth_devices.device_class),
               rssi=COALESCE(excluded.rssi, bluetooth_devices.rssi),
               last_seen=excluded.last_seen",
            params![
                probe_id,
                dev.address,
                dev.name,
                dev.device_class,
                dev.rssi,
                seen_at.to_rfc3339(),
                seen_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_lan_host(&self, probe_id: &str, ip: &str, mac: &str) -> Result<Option<LanHostRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT ip, mac, vendor, hostname, device_type, first_seen, last_seen, reachable
                 FROM lan_hosts WHERE probe_id=? AND ip=? AND mac=?",
                params![probe_id, ip, mac],
                |r| {
                    Ok(LanHostRow {
                        ip: r.get(0)?,
                        mac: {
                            let m: String = r.get(1)?;
                            if m.is_empty() { None } else { Some(m) }
                        },
                        vendor: r.get(2)?,
                        hostname: r.get(3)?,
                        device_type: r.get(4)?,
                        first_seen: parse_ts(r.get(5)?),
                        last_seen: parse_ts(r.get(6)?),
                        reachable: r.get::<_, i64>(7)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn lan_host_count(&self, probe_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(1) FROM lan_hosts WHERE probe_id=?",
            params![probe_id],
            |r| r.get(0),
        )?)
    }

    pub fn get_wifi_network(&self, probe_id: &str, bssid: &str) -> Result<Option<WifiRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT bssid, ssid, channel, signal, security, first_seen, last_seen
                 FROM wifi_networks WHERE probe_id=? AND bssid=?",
                params![probe_id, bssid],
                |r| {
                    Ok(WifiRow {
                        bssid: r.get(0)?,
                        ssid: r.get(1)?,
                        channel: r.get(2)?,
                        signal: r.get(3)?,
                        security: r.get(4)?,
                        first_seen: parse_ts(r.get(5)?),
                        last_seen: parse_ts(r.get(6)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_bluetooth_device(
        &self,
        probe_id: &str,
        address: &str,
    ) -> Result<Option<BluetoothRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT address, name, device_class, rssi, first_seen, last_seen
                 FROM bluetooth_devices WHERE probe_id=? AND address=?",
                params![probe_id, address],
                |r| {
                    Ok(BluetoothRow {
                        address: r.get(0)?,
                        name: r.get(1)?,
                        device_class: r.get(2)?,
                        rssi: r.get(3)?,
                        first_seen: parse_ts(r.get(4)?),
                        last_seen: parse_ts(r.get(5)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
