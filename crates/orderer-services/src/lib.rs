//! orderer-services — the ordering pipeline.
//!
//! Envelopes arrive on broadcast streams, are queued on the intake, cut into
//! hash-linked blocks by the batch cutter, and appended to the log sink.

pub mod broadcaster;
pub mod cutter;
pub mod intake;
pub mod sink;
pub mod stream;
pub mod streams;
pub mod transport;

pub use broadcaster::{Broadcaster, CutterHandle};
pub use cutter::{BatchCutter, ChainTip, CutterError, CutterSettings};
pub use intake::{intake, IntakeClosed, IntakeReceiver, IntakeSender};
pub use sink::{read_log, FileLogSink, LogSink, MemoryLogSink, SinkError};
pub use stream::{BroadcastStream, StreamError};
pub use streams::{StreamInfo, StreamRegistry};
pub use transport::{serve, BroadcastClient, FramedStream, TcpBroadcastStream};
