//! orderer-core — block wire format, hashing, chain building, and config.
//! All other orderer crates depend on this one.

pub mod chain;
pub mod config;
pub mod crypto;
pub mod wire;

pub use chain::{ChainError, ChainState};
pub use wire::{Block, BlockHeader, BroadcastResponse, Envelope, Status, WireError};
