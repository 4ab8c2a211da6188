//! orderer-ctl — command-line interface for the ordering daemon.

mod cmd;

use std::path::Path;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 7051;
const DEFAULT_BROADCAST_PORT: u16 = 7050;

fn print_usage() {
    println!("Usage: orderer-ctl [--port <port>] [--broadcast-port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status              Show chain tip, queue depth, and batching settings");
    println!("  streams             List connected broadcast streams");
    println!("  config              Print the daemon's effective config");
    println!("  send <message>...   Broadcast messages on one stream");
    println!("  verify <log-file>   Check a block log for chain integrity");
    println!("  shutdown            Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>             API port (default: {})", DEFAULT_PORT);
    println!(
        "  --broadcast-port <port>   Broadcast port (default: {})",
        DEFAULT_BROADCAST_PORT
    );
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut broadcast_port = DEFAULT_BROADCAST_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--broadcast-port" => {
                i += 1;
                broadcast_port = args
                    .get(i)
                    .context("--broadcast-port requires a value")?
                    .parse()
                    .context("--broadcast-port must be a number")?;
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["streams"] => cmd::status::cmd_streams(port).await,
        ["config"] => cmd::status::cmd_config(port).await,
        ["shutdown"] => cmd::status::cmd_shutdown(port).await,
        ["send", messages @ ..] => cmd::send::cmd_send(broadcast_port, messages).await,
        ["verify", path] => cmd::verify::cmd_verify(Path::new(path)),
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
