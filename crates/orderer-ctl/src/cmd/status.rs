//! Daemon status, streams, config, shutdown commands.

use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    height: u64,
    last_hash: String,
    messages_ordered: u64,
    halted: Option<String>,
    queued: usize,
    streams: usize,
    batch_size: usize,
    batch_timeout_ms: u64,
}

#[derive(Deserialize)]
struct StreamsResponse {
    streams: Vec<StreamInfo>,
}

#[derive(Deserialize)]
struct StreamInfo {
    id: u64,
    peer: String,
    connected_secs: u64,
    messages: u64,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Call `/api/{path}` on the local daemon and decode the JSON reply.
async fn call<T: DeserializeOwned>(port: u16, method: Method, path: &str) -> Result<T> {
    let url = format!("http://127.0.0.1:{}/api/{}", port, path);
    let resp = reqwest::Client::new()
        .request(method, &url)
        .send()
        .await
        .with_context(|| format!("no ordererd answering at {}", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error", url))?;
    resp.json::<T>()
        .await
        .with_context(|| format!("unexpected reply from {}", url))
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = call(port, Method::GET, "status").await?;

    println!("═══════════════════════════════════════");
    println!("  Orderer Status");
    println!("═══════════════════════════════════════");
    println!("  Height           : {}", resp.height);
    println!("  Last block hash  : {}", short(&resp.last_hash));
    println!("  Messages ordered : {}", resp.messages_ordered);
    println!("  Queued           : {}", resp.queued);
    println!("  Open streams     : {}", resp.streams);
    println!(
        "  Batching         : {} msgs / {} ms",
        resp.batch_size, resp.batch_timeout_ms
    );

    match resp.halted {
        Some(reason) => println!("\n  ✗ HALTED: {}", reason),
        None => println!("\n  ✓ producing blocks"),
    }

    Ok(())
}

pub async fn cmd_streams(port: u16) -> Result<()> {
    let resp: StreamsResponse = call(port, Method::GET, "streams").await?;

    if resp.streams.is_empty() {
        println!("No broadcast streams connected.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Broadcast Streams ({})", resp.streams.len());
    println!("═══════════════════════════════════════");

    for s in &resp.streams {
        println!("  ┌─ #{}", s.id);
        println!("  │  peer     : {}", s.peer);
        println!("  │  messages : {}", s.messages);
        println!("  └─ uptime   : {}s", s.connected_secs);
    }

    Ok(())
}

pub async fn cmd_config(port: u16) -> Result<()> {
    let resp: serde_json::Value = call(port, Method::GET, "config").await?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = call(port, Method::POST, "shutdown").await?;
    println!("{}", resp.message);
    Ok(())
}

fn short(hash: &str) -> &str {
    if hash.is_empty() {
        "-"
    } else {
        &hash[..hash.len().min(16)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_names_the_url_when_no_daemon_answers() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = call::<serde_json::Value>(port, Method::GET, "status")
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(&format!("http://127.0.0.1:{port}/api/status")));
        assert!(msg.contains("no ordererd answering"));
    }

    #[test]
    fn short_truncates_and_marks_empty() {
        assert_eq!(short(""), "-");
        assert_eq!(short("abcd"), "abcd");
        assert_eq!(short(&"f".repeat(64)), "f".repeat(16));
    }
}
