//! Broadcaster — accepts client streams and feeds the batch cutter.
//!
//! `Broadcaster::start` does all one-time work up front: it sends the
//! genesis block and spawns the cutter before the caller accepts a single
//! connection. After that, any number of streams can be handed to
//! `handle` concurrently.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use orderer_core::chain::ChainState;
use orderer_core::wire::{BroadcastResponse, Status};

use crate::cutter::{BatchCutter, ChainTip, CutterError, CutterSettings};
use crate::intake::{intake, IntakeSender};
use crate::sink::{LogSink, SinkError};
use crate::stream::{BroadcastStream, StreamError};
use crate::streams::StreamRegistry;

/// Resolves when the cutter stops. `Err` means block production is over.
pub type CutterHandle = JoinHandle<Result<(), CutterError>>;

#[derive(Clone)]
pub struct Broadcaster {
    intake: IntakeSender,
    sink: Arc<dyn LogSink>,
    tip: watch::Receiver<ChainTip>,
    streams: StreamRegistry,
    settings: CutterSettings,
}

impl Broadcaster {
    /// Send genesis, then spawn the batch cutter. Must be called from within
    /// a tokio runtime.
    pub fn start(
        settings: CutterSettings,
        intake_capacity: usize,
        sink: Arc<dyn LogSink>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(Self, CutterHandle), CutterError> {
        let (intake_tx, intake_rx) = intake(intake_capacity);
        let (tip_tx, tip_rx) = watch::channel(ChainTip::default());

        let mut cutter = BatchCutter::new(
            settings,
            ChainState::genesis(),
            intake_rx,
            sink.clone(),
            tip_tx,
            shutdown,
        );
        cutter.emit_genesis()?;
        let handle = tokio::spawn(cutter.run());

        Ok((
            Self {
                intake: intake_tx,
                sink,
                tip: tip_rx,
                streams: StreamRegistry::new(),
                settings,
            },
            handle,
        ))
    }

    /// Serve one client until it disconnects or its transport fails.
    ///
    /// Every received envelope is queued for the cutter and answered before
    /// the next one is read. A full queue makes this wait. The reply is
    /// `SUCCESS` as soon as the envelope is queued; it says nothing about
    /// whether the block holding it reaches the log. Once the cutter has
    /// halted, envelopes are answered with `SERVICE_UNAVAILABLE` instead.
    ///
    /// Only ever returns the error that ended the stream.
    pub async fn handle<S: BroadcastStream>(&self, mut stream: S) -> Result<(), StreamError> {
        let peer = stream.peer();
        let id = self.streams.register(peer.clone());
        tracing::debug!(peer = %peer, stream = id, "broadcast stream opened");

        let result = self.recv_requests(&mut stream, id).await;

        self.streams.remove(id);
        result
    }

    async fn recv_requests<S: BroadcastStream>(
        &self,
        stream: &mut S,
        id: u64,
    ) -> Result<(), StreamError> {
        loop {
            let envelope = match stream.recv().await {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::debug!(stream = id, error = %e, "can no longer receive requests from client");
                    return Err(e);
                }
            };

            let status = match self.intake.submit(envelope.payload).await {
                Ok(()) => {
                    self.streams.record(id);
                    Status::Success
                }
                Err(_) => Status::ServiceUnavailable,
            };

            if let Err(e) = stream.send(BroadcastResponse { status }).await {
                tracing::info!(stream = id, error = %e, "cannot send broadcast reply to client");
                return Err(e);
            }
            tracing::debug!(stream = id, %status, "sent broadcast reply");
        }
    }

    /// Close the log sink. The cutter's pending batch is not flushed.
    pub fn close(&self) -> Result<(), SinkError> {
        self.sink.close()
    }

    /// Latest committed chain snapshot.
    pub fn tip(&self) -> ChainTip {
        self.tip.borrow().clone()
    }

    /// Receiver that changes whenever a block is committed or the cutter halts.
    pub fn subscribe_tip(&self) -> watch::Receiver<ChainTip> {
        self.tip.clone()
    }

    pub fn streams(&self) -> &StreamRegistry {
        &self.streams
    }

    pub fn settings(&self) -> CutterSettings {
        self.settings
    }

    /// Payloads queued but not yet taken by the cutter.
    pub fn queued(&self) -> usize {
        self.intake.queued()
    }
}
