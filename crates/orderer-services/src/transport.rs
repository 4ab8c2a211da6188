//! TCP transport for broadcast streams.
//!
//! Framing:
//!   request  = u32 BE length | payload
//!   reply    = u16 BE status
//!
//! One reply per request, in request order. A request larger than the
//! configured limit ends the stream before its body is read.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use orderer_core::wire::{BroadcastResponse, Envelope, Status};

use crate::broadcaster::Broadcaster;
use crate::stream::{BroadcastStream, StreamError};

/// A broadcast stream over any byte transport.
pub struct FramedStream<T> {
    io: T,
    peer: String,
    max_frame: usize,
}

impl<T> FramedStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T, peer: impl Into<String>, max_frame: usize) -> Self {
        Self {
            io,
            peer: peer.into(),
            max_frame,
        }
    }
}

impl<T> BroadcastStream for FramedStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn peer(&self) -> String {
        self.peer.clone()
    }

    async fn recv(&mut self) -> Result<Envelope, StreamError> {
        let len = match self.io.read_u32().await {
            Ok(n) => n as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(StreamError::Closed)
            }
            Err(e) => return Err(StreamError::Io(e)),
        };
        if len > self.max_frame {
            return Err(StreamError::FrameTooLarge {
                len,
                max: self.max_frame,
            });
        }
        let mut payload = vec![0u8; len];
        self.io.read_exact(&mut payload).await?;
        Ok(Envelope::new(payload))
    }

    async fn send(&mut self, reply: BroadcastResponse) -> Result<(), StreamError> {
        self.io.write_u16(reply.status.into()).await?;
        self.io.flush().await?;
        Ok(())
    }
}

/// The stream type `serve` hands to the broadcaster.
pub type TcpBroadcastStream = FramedStream<TcpStream>;

/// Accept broadcast connections until shutdown, one handler task each.
pub async fn serve(
    listener: TcpListener,
    broadcaster: Broadcaster,
    max_frame: usize,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "broadcast listener ready");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("broadcast listener shutting down");
                return Ok(());
            }

            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                if let Err(e) = socket.set_nodelay(true) {
                    tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                }

                let broadcaster = broadcaster.clone();
                tokio::spawn(async move {
                    let stream = TcpBroadcastStream::new(socket, peer.to_string(), max_frame);
                    if let Err(e) = broadcaster.handle(stream).await {
                        if e.is_disconnect() {
                            tracing::debug!(%peer, "broadcast client disconnected");
                        } else {
                            tracing::warn!(%peer, error = %e, "broadcast stream terminated");
                        }
                    }
                });
            }
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Client side of a broadcast stream.
pub struct BroadcastClient<T = TcpStream> {
    io: T,
}

impl BroadcastClient<TcpStream> {
    pub async fn connect(addr: SocketAddr) -> Result<Self, StreamError> {
        let io = TcpStream::connect(addr).await?;
        io.set_nodelay(true)?;
        Ok(Self { io })
    }
}

impl<T> BroadcastClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_io(io: T) -> Self {
        Self { io }
    }

    /// Send one payload and wait for its status.
    pub async fn broadcast(&mut self, payload: &[u8]) -> Result<Status, StreamError> {
        let len = u32::try_from(payload.len()).map_err(|_| StreamError::FrameTooLarge {
            len: payload.len(),
            max: u32::MAX as usize,
        })?;
        self.io.write_u32(len).await?;
        self.io.write_all(payload).await?;
        self.io.flush().await?;

        let code = match self.io.read_u16().await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(StreamError::Closed)
            }
            Err(e) => return Err(StreamError::Io(e)),
        };
        Ok(Status::try_from(code)?)
    }
}
