//! Chunk manager: split a transfer into ordered chunks, track per-chunk state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024; // 1 MiB
/// Smallest chunk size a configuration may ask for.
pub const MIN_CHUNK_SIZE: u64 = 4 * 1024; // 4 KiB
/// Upper bound on chunks per transfer; larger payloads get proportionally larger chunks.
pub const MAX_CHUNKS_PER_TRANSFER: u64 = 1 << 20;

/// Transfer identifier, unique per admitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(uuid::Uuid);

impl TransferId {
    pub(crate) fn generate() -> Self {
        TransferId(uuid::Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChunkStatus {
    Pending,
    Completed,
}

/// One unit of transfer progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub size_bytes: u64,
    pub status: ChunkStatus,
}

/// Split `total_len` bytes into Pending chunks of `chunk_size`; the last chunk holds the remainder.
/// A zero `chunk_size` falls back to [`DEFAULT_CHUNK_SIZE`].
pub fn split_into_chunks(total_len: u64, chunk_size: u64) -> Vec<Chunk> {
    let size = if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    };
    let mut out = Vec::with_capacity(total_len.div_ceil(size) as usize);
    let mut start = 0u64;
    while start < total_len {
        let end = start.saturating_add(size).min(total_len);
        out.push(Chunk {
            index: out.len(),
            size_bytes: end - start,
            status: ChunkStatus::Pending,
        });
        start = end;
    }
    out
}

/// Derived overall state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    InProgress,
    Completed,
    Cancelled,
}

/// One file-copy operation between two adjacent nodes.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    file_id: TransferId,
    file_name: String,
    source: String,
    target: String,
    total_size_bytes: u64,
    link_bandwidth_bps: u64,
    chunks: Vec<Chunk>,
    cancelled: bool,
}

impl Transfer {
    pub(crate) fn new(
        file_name: &str,
        source: &str,
        target: &str,
        total_size_bytes: u64,
        link_bandwidth_bps: u64,
        chunks: Vec<Chunk>,
    ) -> Self {
        Self {
            file_id: TransferId::generate(),
            file_name: file_name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            total_size_bytes,
            link_bandwidth_bps,
            chunks,
            cancelled: false,
        }
    }

    pub fn file_id(&self) -> TransferId {
        self.file_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    /// Bandwidth of the link the transfer was admitted over.
    pub fn link_bandwidth_bps(&self) -> u64 {
        self.link_bandwidth_bps
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub(crate) fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn completed_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Completed)
            .count()
    }

    pub fn completed_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Completed)
            .map(|c| c.size_bytes)
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| c.status == ChunkStatus::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn status(&self) -> TransferStatus {
        if self.is_complete() {
            TransferStatus::Completed
        } else if self.cancelled {
            TransferStatus::Cancelled
        } else {
            TransferStatus::InProgress
        }
    }

    /// Wall-clock time the whole payload would take at the link's bandwidth.
    /// A pacing hint for the host; the scheduler itself never waits.
    pub fn estimated_duration(&self) -> Duration {
        if self.link_bandwidth_bps == 0 {
            return Duration::ZERO;
        }
        let bits = self.total_size_bytes as f64 * 8.0;
        Duration::try_from_secs_f64(bits / self.link_bandwidth_bps as f64).unwrap_or(Duration::MAX)
    }
}
