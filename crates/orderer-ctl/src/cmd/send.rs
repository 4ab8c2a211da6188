//! Broadcast messages over one stream and print each reply.

use std::net::SocketAddr;

use anyhow::{Context, Result};

use orderer_core::wire::Status;
use orderer_services::BroadcastClient;

pub async fn cmd_send(broadcast_port: u16, messages: &[&str]) -> Result<()> {
    if messages.is_empty() {
        anyhow::bail!("send requires at least one message");
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], broadcast_port));
    let mut client = BroadcastClient::connect(addr)
        .await
        .with_context(|| format!("failed to connect to ordererd at {}, is it running?", addr))?;

    let mut rejected = 0usize;
    for message in messages {
        let status = client
            .broadcast(message.as_bytes())
            .await
            .with_context(|| format!("broadcast of {:?} failed", message))?;
        println!("  {:<20} {}", message, status);
        if status != Status::Success {
            rejected += 1;
        }
    }

    if rejected > 0 {
        anyhow::bail!("{} of {} messages were not accepted", rejected, messages.len());
    }
    Ok(())
}
