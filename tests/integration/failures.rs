use crate::*;

use std::sync::Mutex;

use orderer_core::chain;
use orderer_core::wire::Status;
use orderer_services::{read_log, CutterError, FileLogSink, SinkError};

/// Accepts the first `limit` blocks, then rejects everything.
struct FailingSink {
    limit: usize,
    accepted: Mutex<Vec<Vec<u8>>>,
}

impl FailingSink {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            accepted: Mutex::new(Vec::new()),
        }
    }
}

impl LogSink for FailingSink {
    fn send(&self, block: &[u8]) -> Result<(), SinkError> {
        let mut accepted = self.accepted.lock().unwrap();
        if accepted.len() >= self.limit {
            return Err(SinkError::Closed);
        }
        accepted.push(block.to_vec());
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
//  Sink failures
// ══════════════════════════════════════════════════════════════════════════════

/// The first envelope is acked before its block fails to reach the sink.
/// After the cutter halts, new envelopes are refused but the stream stays up.
#[tokio::test]
async fn test_sink_failure_halts_ordering() {
    let sink = Arc::new(FailingSink::new(1));
    let mut orderer = start_orderer(settings(1, Duration::from_secs(30)), sink.clone(), MAX_FRAME)
        .await
        .unwrap();
    let mut client = orderer.client().await.unwrap();

    assert_eq!(client.broadcast(b"doomed").await.unwrap(), Status::Success);

    let result = tokio::time::timeout(Duration::from_secs(5), &mut orderer.cutter)
        .await
        .expect("cutter should stop")
        .unwrap();
    match result {
        Err(CutterError::Sink { number, .. }) => assert_eq!(number, 1),
        other => panic!("expected sink failure, got {other:?}"),
    }

    let tip = orderer.broadcaster.tip();
    assert_eq!(tip.height, 1);
    assert!(tip.halted.is_some());

    assert_eq!(
        client.broadcast(b"after").await.unwrap(),
        Status::ServiceUnavailable
    );
    assert_eq!(
        client.broadcast(b"again").await.unwrap(),
        Status::ServiceUnavailable
    );
    assert_eq!(sink.accepted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_genesis_failure_prevents_start() {
    let sink = Arc::new(FailingSink::new(0));
    let result = start_orderer(settings(1, Duration::from_secs(1)), sink, MAX_FRAME).await;
    assert!(result.is_err());
}

// ══════════════════════════════════════════════════════════════════════════════
//  Stream failures
// ══════════════════════════════════════════════════════════════════════════════

/// An oversized frame ends that client's stream and nobody else's.
#[tokio::test]
async fn test_oversized_frame_closes_only_that_stream() {
    let sink = Arc::new(MemoryLogSink::new());
    let orderer = start_orderer(settings(1, Duration::from_secs(30)), sink.clone(), 16)
        .await
        .unwrap();

    let mut bad = orderer.client().await.unwrap();
    let mut good = orderer.client().await.unwrap();

    assert!(bad.broadcast(&[0u8; 64]).await.is_err());
    assert_eq!(good.broadcast(b"fine").await.unwrap(), Status::Success);

    wait_for_condition(Duration::from_secs(5), || sink.len() == 2)
        .await
        .unwrap();
    let blocks = decode_blocks(&sink.records()).unwrap();
    assert_eq!(ordered_payloads(&blocks), vec!["fine"]);
}

/// Shutdown stops the cutter without cutting the pending batch.
#[tokio::test]
async fn test_shutdown_drops_pending_batch() {
    let (mut orderer, sink) = start_memory_orderer(settings(10, Duration::from_secs(30)))
        .await
        .unwrap();
    let mut client = orderer.client().await.unwrap();
    for msg in ["p1", "p2", "p3"] {
        assert_eq!(client.broadcast(msg.as_bytes()).await.unwrap(), Status::Success);
    }

    orderer.shutdown.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), &mut orderer.cutter)
        .await
        .expect("cutter should stop")
        .unwrap();
    assert!(result.is_ok());

    orderer.broadcaster.close().unwrap();
    assert_eq!(sink.len(), 1, "only genesis should be in the log");
    assert!(sink.is_closed());
}

// ══════════════════════════════════════════════════════════════════════════════
//  File log
// ══════════════════════════════════════════════════════════════════════════════

/// Blocks written by the file sink read back as a valid chain.
#[tokio::test]
async fn test_file_log_round_trip() {
    let dir = temp_dir("filelog");
    let path = dir.join("orderer.log");
    let sink = Arc::new(FileLogSink::open(&path, true).unwrap());

    let orderer = start_orderer(settings(2, Duration::from_secs(30)), sink, MAX_FRAME)
        .await
        .unwrap();
    let mut client = orderer.client().await.unwrap();
    for msg in ["one", "two", "three", "four"] {
        client.broadcast(msg.as_bytes()).await.unwrap();
    }

    wait_for_condition(Duration::from_secs(5), || {
        orderer.broadcaster.tip().height == 3
    })
    .await
    .unwrap();
    orderer.broadcaster.close().unwrap();

    let blocks = decode_blocks(&read_log(&path).unwrap()).unwrap();
    assert_eq!(blocks.len(), 3);
    chain::verify(&blocks).unwrap();
    assert_eq!(ordered_payloads(&blocks), vec!["one", "two", "three", "four"]);
    assert_eq!(
        hex::encode(blocks[2].header.hash()),
        orderer.broadcaster.tip().last_hash,
        "tip hash must match the last block on disk"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

/// A restart on the same log path appends a second chain. Each run's chain
/// verifies on its own.
#[tokio::test]
async fn test_restart_appends_verifiable_segment() {
    let dir = temp_dir("restart");
    let path = dir.join("orderer.log");

    for run in ["first", "second"] {
        let sink = Arc::new(FileLogSink::open(&path, true).unwrap());
        let orderer = start_orderer(settings(1, Duration::from_secs(30)), sink, MAX_FRAME)
            .await
            .unwrap();
        let mut client = orderer.client().await.unwrap();
        assert_eq!(client.broadcast(run.as_bytes()).await.unwrap(), Status::Success);

        wait_for_condition(Duration::from_secs(5), || {
            orderer.broadcaster.tip().height == 2
        })
        .await
        .unwrap();
        orderer.broadcaster.close().unwrap();
    }

    let blocks = decode_blocks(&read_log(&path).unwrap()).unwrap();
    let numbers: Vec<u64> = blocks.iter().map(|b| b.header.number).collect();
    assert_eq!(numbers, vec![0, 1, 0, 1]);

    assert!(chain::verify(&blocks).is_err());
    assert_eq!(chain::verify_segments(&blocks), Ok(2));

    let runs = chain::segments(&blocks);
    assert_eq!(ordered_payloads(runs[0]), vec!["first"]);
    assert_eq!(ordered_payloads(runs[1]), vec!["second"]);

    let _ = std::fs::remove_dir_all(&dir);
}
