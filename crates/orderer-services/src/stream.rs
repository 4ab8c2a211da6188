//! Broadcast stream abstraction — one bidirectional client connection.
//!
//! The broadcaster only needs two things from a transport: the next inbound
//! envelope, and a way to send the reply for it. Framing, sockets and peer
//! identity live behind this trait.

use std::future::Future;

use orderer_core::wire::{BroadcastResponse, Envelope};

/// A connected client. Replies must be sent in the order envelopes arrived.
pub trait BroadcastStream: Send {
    /// Human-readable peer label for logs and the stream registry.
    fn peer(&self) -> String;

    /// Next inbound envelope. `StreamError::Closed` on orderly disconnect.
    fn recv(&mut self) -> impl Future<Output = Result<Envelope, StreamError>> + Send;

    /// Send the reply for the most recently received envelope.
    fn send(
        &mut self,
        reply: BroadcastResponse,
    ) -> impl Future<Output = Result<(), StreamError>> + Send;
}

/// Errors local to one stream. They end that stream's handler and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("client closed the stream")]
    Closed,

    #[error("stream i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("malformed reply: {0}")]
    BadReply(#[from] orderer_core::wire::WireError),
}

impl StreamError {
    /// True for an orderly client disconnect.
    pub fn is_disconnect(&self) -> bool {
        match self {
            StreamError::Closed => true,
            StreamError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
