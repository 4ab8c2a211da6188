//! ordererd — solo ordering daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use orderer_core::config::{OrdererConfig, SinkKind};
use orderer_services::{Broadcaster, CutterSettings, FileLogSink, LogSink, MemoryLogSink};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = OrdererConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = OrdererConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        OrdererConfig::default()
    });
    config.validate().context("refusing to start")?;
    let config = Arc::new(config);

    let settings = CutterSettings::from_config(&config.general);
    tracing::info!(
        batch_size = settings.batch_size,
        batch_timeout_ms = config.general.batch_timeout_ms,
        intake_capacity = config.general.intake_capacity(),
        "ordererd starting"
    );

    // Log sink
    let sink: Arc<dyn LogSink> = match config.sink.kind {
        SinkKind::File => Arc::new(
            FileLogSink::open(config.sink.log_path(), config.sink.sync_every_block)
                .context("failed to open block log")?,
        ),
        SinkKind::Memory => {
            tracing::warn!("memory sink selected, blocks will not survive restart");
            Arc::new(MemoryLogSink::new())
        }
    };

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Broadcaster ──────────────────────────────────────────────────────────

    let (broadcaster, mut cutter_task) = Broadcaster::start(
        settings,
        config.general.intake_capacity(),
        sink,
        shutdown_tx.subscribe(),
    )
    .context("failed to send genesis block")?;

    let listener = TcpListener::bind((
        config.network.listen_addr.as_str(),
        config.network.broadcast_port,
    ))
    .await
    .context("failed to bind broadcast listener")?;

    let mut accept_task = tokio::spawn(orderer_services::serve(
        listener,
        broadcaster.clone(),
        config.network.max_message_bytes as usize,
        shutdown_tx.subscribe(),
    ));

    // Status HTTP endpoint
    let _api_server = {
        let state = orderer_api::ApiState {
            broadcaster: broadcaster.clone(),
            config: config.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        let listen_addr = config.network.listen_addr.clone();
        let api_port = config.network.api_port;
        tokio::spawn(async move {
            if let Err(e) = orderer_api::serve(state, &listen_addr, api_port).await {
                tracing::error!(error = %e, "status server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    let mut cutter_finished = false;
    let outcome = tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::info!("shutting down");
            Ok(())
        }
        r = &mut cutter_task => {
            cutter_finished = true;
            match r {
                Ok(Ok(())) => {
                    tracing::info!("batch cutter stopped");
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "batch cutter halted");
                    Err(anyhow::Error::new(e).context("block production stopped"))
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch cutter task failed");
                    Err(anyhow::Error::new(e).context("batch cutter task failed"))
                }
            }
        }
        r = &mut accept_task => {
            tracing::error!("broadcast listener exited: {:?}", r);
            Err(anyhow::anyhow!("broadcast listener exited"))
        }
    };

    // Stop the remaining workers, then close the log.
    let _ = shutdown_tx.send(());
    if !cutter_finished {
        let _ = tokio::time::timeout(Duration::from_secs(2), cutter_task).await;
    }
    if let Err(e) = broadcaster.close() {
        tracing::warn!(error = %e, "failed to close block log");
    }
    let tip = broadcaster.tip();
    tracing::info!(
        height = tip.height,
        messages = tip.messages_ordered,
        "ordererd stopped"
    );

    outcome
}
