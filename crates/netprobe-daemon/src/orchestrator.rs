//! Run-forever orchestration: startup, scan cycles, capture lifecycle
//! and graceful shutdown.
//!
//! Each concurrent task opens its own store connection; the connection
//! held here is used only from this task. Scanners run fan-out per
//! cycle and a failing medium never aborts the others.

use crate::config::Config;
use crate::probe;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use netprobe_capture::Capture;
use netprobe_scan::{bluetooth, lan, oui, wifi, OuiDb};
use netprobe_store::Store;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause after an unexpected cycle failure before trying again
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Run the agent until the shutdown signal rises
pub async fn run(config: Config, probe_id: String, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let store = startup(&config, &probe_id).await?;

    let mut capture = if config.sniffing.enabled {
        match Capture::start(
            &config.database.path,
            &probe_id,
            config.sniffing.interface.as_deref(),
        ) {
            Ok(capture) => Some(capture),
            Err(e) => {
                warn!(error = %e, "Packet capture unavailable, continuing without it");
                None
            }
        }
    } else {
        info!("Packet capture disabled by configuration");
        None
    };

    let interval = Duration::from_secs(config.scan.interval_secs);
    let mut cycle: u64 = 0;

    while !*shutdown.borrow() {
        cycle += 1;
        match run_cycle(&config, &probe_id, cycle).await {
            Ok(()) => {
                if cycle % config.scan.stats_every_cycles.max(1) == 0 {
                    report_capture(&store, &mut capture);
                }
                sleep_until_shutdown(interval, &mut shutdown).await;
            }
            Err(e) => {
                error!(cycle, error = %e, "Scan cycle failed, backing off");
                sleep_until_shutdown(ERROR_BACKOFF, &mut shutdown).await;
            }
        }
    }

    if let Some(capture) = capture.as_mut() {
        match capture.stop(&store) {
            Ok(stats) => info!(
                packets = stats.packet_count,
                unique_src_ips = stats.unique_src_ips,
                printable = stats.printable_payloads,
                "Final capture statistics"
            ),
            Err(e) => error!(error = %e, "Failed to close capture session"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Run exactly one scan cycle and return
pub async fn scan_once(config: &Config, probe_id: &str) -> Result<()> {
    startup(config, probe_id).await?;
    run_cycle(config, probe_id, 1).await
}

/// Startup sequence shared by daemon and single-scan modes. A store
/// that cannot be opened is fatal; everything else degrades.
async fn startup(config: &Config, probe_id: &str) -> Result<Store> {
    let store = Store::open(&config.database.path).with_context(|| {
        format!(
            "failed to open store at {}",
            config.database.path.display()
        )
    })?;

    // Sessions left open by an earlier crash are closed before a new
    // one starts; the store logs what it swept
    store.close_stale_sessions(Utc::now())?;

    let info = probe::collect(probe_id, &config.probe.name);
    store.upsert_probe_info(&info)?;
    info!(
        probe = %info.probe_id,
        hostname = %info.hostname,
        interfaces = info.interfaces.len(),
        "Probe identity registered"
    );

    // The replace runs in a transaction on its own connection. A failed
    // refresh leaves the cached table authoritative.
    let mut oui_store = Store::open(&config.database.path)?;
    if let Err(e) = oui::check_and_update(
        &mut oui_store,
        config.oui.staleness_days,
        &config.oui.source_url,
    )
    .await
    {
        warn!(error = %e, "OUI refresh failed, keeping cached table");
    }

    Ok(store)
}

/// One scan cycle: the three medium scanners run as concurrent tasks,
/// each on its own store connection. A failing scanner is logged and
/// skipped; the cycle only errors when no medium got through at all.
async fn run_cycle(config: &Config, probe_id: &str, cycle: u64) -> Result<()> {
    info!(cycle, "Scan cycle started");
    let started = Instant::now();

    let lan_task = tokio::spawn(lan_job(
        config.database.path.clone(),
        probe_id.to_string(),
        config.scan.subnet,
        config.scan.prefix_len,
    ));
    let wifi_task = tokio::spawn(wifi_job(
        config.database.path.clone(),
        probe_id.to_string(),
    ));
    let bluetooth_task = tokio::spawn(bluetooth_job(
        config.database.path.clone(),
        probe_id.to_string(),
    ));

    let (lan_res, wifi_res, bluetooth_res) = tokio::join!(lan_task, wifi_task, bluetooth_task);
    let succeeded = [
        log_outcome(cycle, "lan", lan_res),
        log_outcome(cycle, "wifi", wifi_res),
        log_outcome(cycle, "bluetooth", bluetooth_res),
    ]
    .iter()
    .filter(|ok| **ok)
    .count();

    if succeeded == 0 {
        bail!("all scanners failed");
    }

    info!(
        cycle,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scan cycle complete"
    );
    Ok(())
}

async fn lan_job(
    db_path: PathBuf,
    probe_id: String,
    subnet: Ipv4Addr,
    prefix_len: u8,
) -> Result<usize> {
    let store = Store::open(&db_path)?;
    let oui = OuiDb::load(&store)?;
    let hosts = lan::scan(subnet, prefix_len, &oui).await;
    lan::store_scan(&store, &probe_id, &hosts, Utc::now())
}

async fn wifi_job(db_path: PathBuf, probe_id: String) -> Result<usize> {
    let store = Store::open(&db_path)?;
    let networks = wifi::scan().await;
    wifi::store_scan(&store, &probe_id, &networks, Utc::now())
}

async fn bluetooth_job(db_path: PathBuf, probe_id: String) -> Result<usize> {
    let store = Store::open(&db_path)?;
    let devices = bluetooth::scan().await;
    bluetooth::store_scan(&store, &probe_id, &devices, Utc::now())
}

fn log_outcome(
    cycle: u64,
    medium: &str,
    result: std::result::Result<Result<usize>, tokio::task::JoinError>,
) -> bool {
    match result {
        Ok(Ok(entities)) => {
            debug!(cycle, medium, entities, "Scanner finished");
            true
        }
        Ok(Err(e)) => {
            warn!(cycle, medium, error = %e, "Scanner failed, skipping this medium");
            false
        }
        Err(e) => {
            warn!(cycle, medium, error = %e, "Scanner task panicked");
            false
        }
    }
}

/// Periodic capture health report: log a counter snapshot, persist it,
/// and notice a worker that died since the last report. A dead worker
/// already closed its session row, so the handle is just dropped.
fn report_capture(store: &Store, capture: &mut Option<Capture>) {
    let Some(cap) = capture.as_mut() else { return };

    if let Some(exit) = cap.take_exit() {
        error!(session = %cap.session_id(), error = %exit, "Capture worker exited");
        *capture = None;
        return;
    }

    let stats = cap.stats();
    info!(
        session = %cap.session_id(),
        packets = stats.packet_count,
        unique_src_ips = stats.unique_src_ips,
        printable = stats.printable_payloads,
        "Capture statistics"
    );
    if let Err(e) = store.update_session_counters(cap.session_id(), &stats) {
        warn!(error = %e, "Failed to persist capture counters");
    }
}

/// Interruptible pause between cycles
async fn sleep_until_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn sleep_returns_promptly_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let started = Instant::now();
        let sleeper = tokio::spawn(async move {
            sleep_until_shutdown(Duration::from_secs(60), &mut rx).await;
        });
        tx.send(true).unwrap();
        sleeper.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn startup_registers_probe_and_sweeps_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("agent.db");
        // Fresh table plus an unreachable registry host keeps the
        // refresh on its failure path without network access
        config.oui.source_url = "http://127.0.0.1:9/oui.txt".to_string();

        {
            let store = Store::open(&config.database.path).unwrap();
            store
                .upsert_probe_info(&probe::collect("probe-under-test", "test"))
                .unwrap();
            store
                .open_session("stale", "probe-under-test", "eth0", Utc::now())
                .unwrap();
        }

        let store = startup(&config, "probe-under-test").await.unwrap();
        assert_eq!(store.open_session_count().unwrap(), 0);
        assert!(store
            .get_session("stale")
            .unwrap()
            .unwrap()
            .ended_at
            .is_some());
    }
}
