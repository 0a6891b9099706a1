//! netprobe Capture - Continuous passive packet capture
//!
//! A capture session attaches to one interface, runs a blocking read
//! loop on a dedicated OS thread, and accumulates per-session counters
//! (packet count, distinct source IPs, printable payloads) without ever
//! persisting raw packet bytes. The counters live in shared atomics so
//! the orchestrator can snapshot them while the loop runs.
//!
//! The worker is supervised: if the channel read fails mid-run the
//! worker closes the session row with whatever it accumulated and
//! reports the exit reason on a channel the orchestrator drains. There
//! is no automatic restart; restart policy belongs to the caller.

mod classify;
#[cfg(test)]
pub(crate) mod testutil;

pub use classify::{classify_frame, is_mostly_printable, PacketSummary, Protocol};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use netprobe_core::CaptureStats;
use netprobe_store::Store;
use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long a blocking read waits before the loop re-checks its stop flag
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Why the capture worker exited on its own instead of being stopped
#[derive(Debug, Clone, Error)]
pub enum CaptureExit {
    #[error("capture channel read failed: {0}")]
    ReadFailed(String),
}

/// Session-scoped counters, mutated only by the capture worker and read
/// by anyone holding the handle. Individual atomics keep reads
/// consistent without locking the hot path.
#[derive(Default)]
struct SessionCounters {
    packets: AtomicU64,
    printable: AtomicU64,
    src_ips: Mutex<HashSet<IpAddr>>,
}

impl SessionCounters {
    /// `packets` is bumped before the derived counters, and `snapshot`
    /// reads it last, so a concurrent read never observes more printable
    /// payloads or source IPs than packets.
    fn record(&self, summary: &PacketSummary) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        if let Some(ip) = summary.src_ip {
            self.src_ips
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(ip);
        }
        if summary.printable_payload {
            self.printable.fetch_add(1, Ordering::Release);
        }
    }

    fn snapshot(&self) -> CaptureStats {
        let printable_payloads = self.printable.load(Ordering::Acquire);
        let unique_src_ips = self
            .src_ips
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len() as u64;
        let packet_count = self.packets.load(Ordering::Relaxed);
        CaptureStats {
            packet_count,
            unique_src_ips,
            printable_payloads,
        }
    }
}

/// Source of link-layer frames. The production implementation wraps a
/// pnet datalink receiver; tests drive the loop with synthetic frames.
pub(crate) trait FrameSource: Send {
    /// Next frame, or `Ok(None)` when the poll timeout elapsed without
    /// one (so the loop can observe its stop flag)
    fn next_frame(&mut self) -> std::io::Result<Option<&[u8]>>;
}

struct DatalinkSource {
    rx: Box<dyn DataLinkReceiver>,
}

impl FrameSource for DatalinkSource {
    fn next_frame(&mut self) -> std::io::Result<Option<&[u8]>> {
        match self.rx.next() {
            Ok(frame) => Ok(Some(frame)),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// The consumption loop. Exits cleanly when the stop flag rises, or
/// with the underlying error when the source fails.
fn run_capture_loop<S: FrameSource>(
    source: &mut S,
    counters: &SessionCounters,
    stop: &AtomicBool,
) -> std::io::Result<()> {
    while !stop.load(Ordering::Relaxed) {
        match source.next_frame()? {
            Some(frame) => {
                if let Some(summary) = classify_frame(frame) {
                    counters.record(&summary);
                }
            }
            // Poll timeout, go around and re-check the stop flag
            None => continue,
        }
    }
    Ok(())
}

/// Handle on a running capture session
pub struct Capture {
    session_id: String,
    counters: Arc<SessionCounters>,
    stop: Arc<AtomicBool>,
    stopped: bool,
    worker: Option<thread::JoinHandle<()>>,
    exit_rx: Receiver<CaptureExit>,
}

impl Capture {
    /// Attach to the interface, open a new session row, and start the
    /// consumption loop on its own thread.
    ///
    /// `interface` of `None` (or empty) auto-detects the first up,
    /// non-loopback interface carrying an address.
    pub fn start(db_path: &Path, probe_id: &str, interface: Option<&str>) -> Result<Capture> {
        let iface = resolve_interface(interface)?;

        let mut config = datalink::Config::default();
        config.read_timeout = Some(POLL_INTERVAL);
        let rx = match datalink::channel(&iface, config)
            .with_context(|| format!("failed to open capture channel on {}", iface.name))?
        {
            Channel::Ethernet(_tx, rx) => rx,
            _ => bail!("unsupported datalink channel type on {}", iface.name),
        };

        let session_id = Uuid::new_v4().to_string();
        {
            // Short-lived connection just for the session row
            let store = Store::open(db_path)?;
            store.open_session(&session_id, probe_id, &iface.name, Utc::now())?;
        }

        let counters = Arc::new(SessionCounters::default());
        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = mpsc::channel();

        let worker = spawn_worker(
            rx,
            db_path.to_path_buf(),
            session_id.clone(),
            Arc::clone(&counters),
            Arc::clone(&stop),
            exit_tx,
        )?;

        info!(
            session = %session_id,
            interface = %iface.name,
            "Packet capture started"
        );

        Ok(Capture {
            session_id,
            counters,
            stop,
            stopped: false,
            worker: Some(worker),
            exit_rx,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Consistent snapshot of the running session's counters. Callable
    /// concurrently with the capture loop; repeated reads never see a
    /// decreasing packet count.
    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Exit reason reported by the worker, if it died on its own since
    /// the last check
    pub fn take_exit(&self) -> Option<CaptureExit> {
        self.exit_rx.try_recv().ok()
    }

    /// Stop the capture loop, close the session row with final counters,
    /// and return them. Idempotent: a second call joins nothing and
    /// returns the same final stats.
    pub fn stop(&mut self, store: &Store) -> Result<CaptureStats> {
        let stats = if self.stopped {
            self.counters.snapshot()
        } else {
            self.stopped = true;
            self.stop.store(true, Ordering::Relaxed);
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    error!(session = %self.session_id, "Capture worker panicked");
                }
            }
            let stats = self.counters.snapshot();
            // False when the worker already closed the row after a
            // mid-run failure
            if store.close_session(&self.session_id, Utc::now(), &stats)? {
                info!(
                    session = %self.session_id,
                    packets = stats.packet_count,
                    "Packet capture stopped"
                );
            }
            stats
        };
        Ok(stats)
    }
}

fn spawn_worker(
    rx: Box<dyn DataLinkReceiver>,
    db_path: PathBuf,
    session_id: String,
    counters: Arc<SessionCounters>,
    stop: Arc<AtomicBool>,
    exit_tx: Sender<CaptureExit>,
) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("netprobe-capture".into())
        .spawn(move || {
            let mut source = DatalinkSource { rx };
            match run_capture_loop(&mut source, &counters, &stop) {
                Ok(()) => debug!(session = %session_id, "Capture loop exited on stop"),
                Err(e) => {
                    warn!(
                        session = %session_id,
                        error = %e,
                        "Capture channel lost, closing session with partial counters"
                    );
                    // This task's own short-lived connection; the handle's
                    // connection belongs to the orchestrator task
                    match Store::open(&db_path) {
                        Ok(store) => {
                            if let Err(err) =
                                store.close_session(&session_id, Utc::now(), &counters.snapshot())
                            {
                                error!(session = %session_id, error = %err, "Failed to close session");
                            }
                        }
                        Err(err) => {
                            error!(session = %session_id, error = %err, "Failed to open store")
                        }
                    }
                    let _ = exit_tx.send(CaptureExit::ReadFailed(e.to_string()));
                }
            }
        })?;
    Ok(handle)
}

fn resolve_interface(name: Option<&str>) -> Result<NetworkInterface> {
    let interfaces = datalink::interfaces();
    match name.filter(|n| !n.is_empty()) {
        Some(n) => interfaces
            .into_iter()
            .find(|i| i.name == n)
            .with_context(|| format!("capture interface not found: {n}")),
        None => interfaces
            .into_iter()
            .find(|i| i.is_up() && !i.is_loopback() && !i.ips.is_empty())
            .context("no usable capture interface detected"),
    }
}
