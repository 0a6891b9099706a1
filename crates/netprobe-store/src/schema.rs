pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE probe_info (
  probe_id        TEXT PRIMARY KEY,
  name            TEXT NOT NULL,
  hostname        TEXT NOT NULL,
  interfaces      TEXT NOT NULL,
  started_at      TEXT NOT NULL
);

CREATE TABLE lan_hosts (
  host_id         INTEGER PRIMARY KEY AUTOINCREMENT,
  probe_id        TEXT NOT NULL REFERENCES probe_info(probe_id),
  ip              TEXT NOT NULL,
  mac             TEXT NOT NULL DEFAULT '',
  vendor          TEXT,
  hostname        TEXT,
  device_type     TEXT,
  first_seen      TEXT NOT NULL,
  last_seen       TEXT NOT NULL,
  reachable       INTEGER NOT NULL CHECK (reachable IN (0,1)),
  UNIQUE (probe_id, ip, mac)
);

CREATE TABLE wifi_networks (
  net_id          INTEGER PRIMARY KEY AUTOINCREMENT,
  probe_id        TEXT NOT NULL REFERENCES probe_info(probe_id),
  bssid           TEXT NOT NULL,
  ssid            TEXT NOT NULL,
  channel         INTEGER,
  signal          INTEGER,
  security        TEXT,
  first_seen      TEXT NOT NULL,
  last_seen       TEXT NOT NULL,
  UNIQUE (probe_id, bssid)
);

CREATE TABLE bluetooth_devices (
  dev_id          INTEGER PRIMARY KEY AUTOINCREMENT,
  probe_id        TEXT NOT NULL REFERENCES probe_info(probe_id),
  address         TEXT NOT NULL,
  name            TEXT,
  device_class    TEXT,
  rssi            INTEGER,
  first_seen      TEXT NOT NULL,
  last_seen       TEXT NOT NULL,
  UNIQUE (probe_id, address)
);

CREATE TABLE oui_entries (
  prefix          TEXT PRIMARY KEY,
  vendor          TEXT NOT NULL,
  refreshed_at    TEXT NOT NULL
);

CREATE TABLE capture_sessions (
  session_id          TEXT PRIMARY KEY,
  probe_id            TEXT NOT NULL REFERENCES probe_info(probe_id),
  interface           TEXT NOT NULL,
  started_at          TEXT NOT NULL,
  ended_at            TEXT,
  packet_count        INTEGER NOT NULL DEFAULT 0,
  unique_src_ips      INTEGER NOT NULL DEFAULT 0,
  printable_payloads  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_lan_hosts_probe ON lan_hosts(probe_id);
CREATE INDEX idx_lan_hosts_seen ON lan_hosts(probe_id, last_seen);
CREATE INDEX idx_wifi_probe ON wifi_networks(probe_id);
CREATE INDEX idx_bt_probe ON bluetooth_devices(probe_id);
CREATE INDEX idx_sessions_probe ON capture_sessions(probe_id);
CREATE INDEX idx_sessions_open ON capture_sessions(ended_at) WHERE ended_at IS NULL;

COMMIT;
"#;
