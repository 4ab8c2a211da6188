//! CLI command modules.

pub mod send;
pub mod status;
pub mod verify;
