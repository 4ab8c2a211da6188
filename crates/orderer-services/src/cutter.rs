//! Batch cutter — the single task that turns queued payloads into blocks.
//!
//! Two events race continuously: a payload arriving on the intake queue and
//! the batch timer expiring. Whichever is ready is serviced:
//!
//!   payload  → append; at `batch_size`, rearm the timer and cut
//!   timer    → rearm the timer; cut if the batch is non-empty
//!
//! The pending batch and the chain state are owned by this task alone. A cut
//! runs to completion (build, encode, send) before the next event is looked
//! at, so blocks leave in chain order. Any encode or sink failure ends the
//! task with a `CutterError`; no further block is ever attempted.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use orderer_core::chain::{genesis_payloads, ChainState};
use orderer_core::config::GeneralConfig;
use orderer_core::wire::WireError;

use crate::intake::IntakeReceiver;
use crate::sink::{LogSink, SinkError};

/// Cut thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CutterSettings {
    /// Payload count that cuts immediately. Must be positive.
    pub batch_size: usize,
    /// Longest a non-empty batch waits. Must be positive.
    pub batch_timeout: Duration,
}

impl CutterSettings {
    pub fn from_config(general: &GeneralConfig) -> Self {
        Self {
            batch_size: general.batch_size as usize,
            batch_timeout: general.batch_timeout(),
        }
    }
}

/// Snapshot of the committed chain, published after every block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainTip {
    /// Blocks committed so far, genesis included.
    pub height: u64,
    /// Header hash of the newest block, hex. Empty before genesis.
    pub last_hash: String,
    /// Client payloads committed so far.
    pub messages_ordered: u64,
    /// Set once the cutter has stopped on a fatal error.
    pub halted: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CutterError {
    #[error("block {number} failed to encode: {source}")]
    Encode { number: u64, source: WireError },

    #[error("log sink rejected block {number}: {source}")]
    Sink { number: u64, source: SinkError },
}

pub struct BatchCutter {
    settings: CutterSettings,
    chain: ChainState,
    batch: Vec<Bytes>,
    intake: IntakeReceiver,
    sink: Arc<dyn LogSink>,
    tip: watch::Sender<ChainTip>,
    shutdown: broadcast::Receiver<()>,
}

impl BatchCutter {
    pub fn new(
        settings: CutterSettings,
        chain: ChainState,
        intake: IntakeReceiver,
        sink: Arc<dyn LogSink>,
        tip: watch::Sender<ChainTip>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            batch: Vec::new(),
            settings,
            chain,
            intake,
            sink,
            tip,
            shutdown,
        }
    }

    /// Publish block 0. Must happen before `run` consumes the intake queue.
    pub fn emit_genesis(&mut self) -> Result<(), CutterError> {
        self.publish(genesis_payloads())
            .map_err(|e| self.halt(e))?;
        tracing::info!(hash = %self.tip.borrow().last_hash, "genesis block sent");
        Ok(())
    }

    /// Event loop. Returns `Ok` on shutdown or when every intake sender is
    /// gone; the pending batch is not flushed in either case.
    pub async fn run(mut self) -> Result<(), CutterError> {
        let period = self.settings.batch_timeout;
        let timer = tokio::time::sleep(period);
        tokio::pin!(timer);

        tracing::info!(
            batch_size = self.settings.batch_size,
            batch_timeout_ms = period.as_millis() as u64,
            "batch cutter running"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(pending = self.batch.len(), "batch cutter shutting down");
                    return Ok(());
                }

                msg = self.intake.next() => {
                    let Some(payload) = msg else {
                        tracing::info!(pending = self.batch.len(), "intake closed, batch cutter exiting");
                        return Ok(());
                    };
                    self.batch.push(payload);
                    if self.batch.len() >= self.settings.batch_size {
                        timer.as_mut().reset(Instant::now() + period);
                        self.cut().map_err(|e| self.halt(e))?;
                    }
                }

                () = &mut timer => {
                    timer.as_mut().reset(Instant::now() + period);
                    if !self.batch.is_empty() {
                        self.cut().map_err(|e| self.halt(e))?;
                    }
                }
            }
        }
    }

    /// Turn the whole pending batch into one block.
    fn cut(&mut self) -> Result<(), CutterError> {
        let payloads = std::mem::take(&mut self.batch);
        let count = payloads.len() as u64;
        self.publish(payloads)?;
        self.tip.send_modify(|tip| tip.messages_ordered += count);
        Ok(())
    }

    /// Build, encode and send the next block; advance the chain only once
    /// the sink accepted it.
    fn publish(&mut self, payloads: Vec<Bytes>) -> Result<(), CutterError> {
        let (block, next) = self.chain.build(payloads);
        let number = block.number();
        let encoded = block
            .encode()
            .map_err(|source| CutterError::Encode { number, source })?;

        self.sink
            .send(&encoded)
            .map_err(|source| CutterError::Sink { number, source })?;

        tracing::info!(
            number,
            payloads = block.data.payloads.len(),
            bytes = encoded.len(),
            "block cut"
        );
        self.chain = next;
        let height = self.chain.height();
        let last_hash = hex::encode(&self.chain.prev_hash);
        self.tip.send_modify(|tip| {
            tip.height = height;
            tip.last_hash = last_hash;
        });
        Ok(())
    }

    fn halt(&self, err: CutterError) -> CutterError {
        tracing::error!(error = %err, "batch cutter halted, no further blocks will be produced");
        let reason = err.to_string();
        self.tip.send_modify(|tip| tip.halted = Some(reason));
        err
    }
}
