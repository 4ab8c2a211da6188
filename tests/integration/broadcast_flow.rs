use crate::*;

use orderer_core::chain;
use orderer_core::wire::Status;

#[tokio::test]
async fn test_size_cut_over_tcp() {
    let (orderer, sink) = start_memory_orderer(settings(3, Duration::from_secs(30)))
        .await
        .unwrap();
    let mut client = orderer.client().await.unwrap();

    for msg in ["A", "B", "C", "D", "E", "F"] {
        assert_eq!(client.broadcast(msg.as_bytes()).await.unwrap(), Status::Success);
    }

    wait_for_condition(Duration::from_secs(5), || sink.len() == 3)
        .await
        .unwrap();

    let blocks = decode_blocks(&sink.records()).unwrap();
    chain::verify(&blocks).unwrap();
    assert_eq!(blocks[1].data.payloads.len(), 3);
    assert_eq!(blocks[2].data.payloads.len(), 3);
    assert_eq!(ordered_payloads(&blocks), vec!["A", "B", "C", "D", "E", "F"]);
}

#[tokio::test]
async fn test_timeout_cuts_partial_batch() {
    let (orderer, sink) = start_memory_orderer(settings(100, Duration::from_millis(100)))
        .await
        .unwrap();
    let mut client = orderer.client().await.unwrap();

    client.broadcast(b"x").await.unwrap();
    client.broadcast(b"y").await.unwrap();

    wait_for_condition(Duration::from_secs(5), || sink.len() == 2)
        .await
        .unwrap();

    let blocks = decode_blocks(&sink.records()).unwrap();
    chain::verify(&blocks).unwrap();
    assert_eq!(ordered_payloads(&blocks), vec!["x", "y"]);

    // Nothing further arrives, so no empty blocks follow.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn test_concurrent_clients_keep_their_own_order() {
    const CLIENTS: usize = 4;
    const PER_CLIENT: usize = 20;

    let (orderer, sink) = start_memory_orderer(settings(10, Duration::from_millis(50)))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for c in 0..CLIENTS {
        let mut client = orderer.client().await.unwrap();
        tasks.push(tokio::spawn(async move {
            for i in 0..PER_CLIENT {
                let msg = format!("c{c}-{i:03}");
                let status = client.broadcast(msg.as_bytes()).await?;
                assert_eq!(status, Status::Success);
            }
            anyhow::Ok(())
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    let total = (CLIENTS * PER_CLIENT) as u64;
    wait_for_condition(Duration::from_secs(5), || {
        orderer.broadcaster.tip().messages_ordered == total
    })
    .await
    .unwrap();

    let blocks = decode_blocks(&sink.records()).unwrap();
    chain::verify(&blocks).unwrap();
    assert!(blocks.iter().skip(1).all(|b| b.data.payloads.len() <= 10));

    let payloads = ordered_payloads(&blocks);
    assert_eq!(payloads.len(), CLIENTS * PER_CLIENT);
    for c in 0..CLIENTS {
        let prefix = format!("c{c}-");
        let mine: Vec<&String> = payloads.iter().filter(|p| p.starts_with(&prefix)).collect();
        assert_eq!(mine.len(), PER_CLIENT);
        assert!(mine.windows(2).all(|w| w[0] < w[1]), "client {c} reordered");
    }
}

#[tokio::test]
async fn test_stream_registry_tracks_connections() {
    let (orderer, _sink) = start_memory_orderer(settings(10, Duration::from_millis(50)))
        .await
        .unwrap();

    let mut client = orderer.client().await.unwrap();
    client.broadcast(b"hello").await.unwrap();

    let streams = orderer.broadcaster.streams().snapshot();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].messages, 1);
    assert!(streams[0].peer.starts_with("127.0.0.1:"));

    drop(client);
    wait_for_condition(Duration::from_secs(5), || {
        orderer.broadcaster.streams().is_empty()
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_empty_payload_is_ordered() {
    let (orderer, sink) = start_memory_orderer(settings(1, Duration::from_secs(30)))
        .await
        .unwrap();
    let mut client = orderer.client().await.unwrap();

    assert_eq!(client.broadcast(b"").await.unwrap(), Status::Success);
    wait_for_condition(Duration::from_secs(5), || sink.len() == 2)
        .await
        .unwrap();

    let blocks = decode_blocks(&sink.records()).unwrap();
    assert_eq!(blocks[1].data.payloads.len(), 1);
    assert!(blocks[1].data.payloads[0].is_empty());
}
