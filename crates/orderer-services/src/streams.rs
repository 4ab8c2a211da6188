//! Stream registry — which broadcast clients are connected right now.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug)]
struct StreamEntry {
    peer: String,
    connected_at: Instant,
    messages: u64,
}

/// Point-in-time view of one connected stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub id: u64,
    pub peer: String,
    pub connected_secs: u64,
    pub messages: u64,
}

/// Shared across all handler tasks.
#[derive(Clone, Default)]
pub struct StreamRegistry {
    streams: Arc<DashMap<u64, StreamEntry>>,
    next_id: Arc<AtomicU64>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream, returning its id.
    pub fn register(&self, peer: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.streams.insert(
            id,
            StreamEntry {
                peer,
                connected_at: Instant::now(),
                messages: 0,
            },
        );
        id
    }

    /// Count one acknowledged message on a stream.
    pub fn record(&self, id: u64) {
        if let Some(mut entry) = self.streams.get_mut(&id) {
            entry.messages += 1;
        }
    }

    pub fn remove(&self, id: u64) {
        self.streams.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Connected streams ordered by id.
    pub fn snapshot(&self) -> Vec<StreamInfo> {
        let mut infos: Vec<StreamInfo> = self
            .streams
            .iter()
            .map(|e| StreamInfo {
                id: *e.key(),
                peer: e.value().peer.clone(),
                connected_secs: e.value().connected_at.elapsed().as_secs(),
                messages: e.value().messages,
            })
            .collect();
        infos.sort_by_key(|i| i.id);
        infos
    }
}
