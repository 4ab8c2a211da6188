//! Orderer integration test harness.
//!
//! Each test runs a complete orderer in-process: broadcaster, batch cutter,
//! and a TCP accept loop on an OS-assigned loopback port. Clients talk to it
//! over real sockets with `BroadcastClient`.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use orderer_core::wire::Block;
use orderer_services::{
    serve, BroadcastClient, Broadcaster, CutterHandle, CutterSettings, LogSink, MemoryLogSink,
};

mod broadcast_flow;
mod failures;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const MAX_FRAME: usize = 64 * 1024;

/// A running orderer. Dropping it signals shutdown.
pub struct Orderer {
    pub addr: SocketAddr,
    pub broadcaster: Broadcaster,
    pub cutter: CutterHandle,
    pub shutdown: broadcast::Sender<()>,
}

impl Drop for Orderer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

impl Orderer {
    pub async fn client(&self) -> Result<BroadcastClient> {
        BroadcastClient::connect(self.addr)
            .await
            .with_context(|| format!("failed to connect to {}", self.addr))
    }
}

pub fn settings(batch_size: usize, batch_timeout: Duration) -> CutterSettings {
    CutterSettings {
        batch_size,
        batch_timeout,
    }
}

/// Start an orderer writing to `sink`.
pub async fn start_orderer(
    settings: CutterSettings,
    sink: Arc<dyn LogSink>,
    max_frame: usize,
) -> Result<Orderer> {
    let (shutdown, _) = broadcast::channel(1);
    let (broadcaster, cutter) =
        Broadcaster::start(settings, settings.batch_size, sink, shutdown.subscribe())
            .context("genesis failed")?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(serve(
        listener,
        broadcaster.clone(),
        max_frame,
        shutdown.subscribe(),
    ));

    Ok(Orderer {
        addr,
        broadcaster,
        cutter,
        shutdown,
    })
}

/// Start an orderer on a fresh in-memory sink, returning both.
pub async fn start_memory_orderer(
    settings: CutterSettings,
) -> Result<(Orderer, Arc<MemoryLogSink>)> {
    let sink = Arc::new(MemoryLogSink::new());
    let orderer = start_orderer(settings, sink.clone(), MAX_FRAME).await?;
    Ok((orderer, sink))
}

pub fn decode_blocks(records: &[Bytes]) -> Result<Vec<Block>> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| Block::decode(r).with_context(|| format!("record {i} is not a block")))
        .collect()
}

/// Payloads of every non-genesis block, in commit order, as strings.
pub fn ordered_payloads(blocks: &[Block]) -> Vec<String> {
    blocks
        .iter()
        .skip(1)
        .flat_map(|b| b.data.payloads.iter())
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect()
}

/// Poll `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for_condition<F>(timeout: Duration, mut cond: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Unique scratch directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "orderer-it-{}-{}-{}",
        label,
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
