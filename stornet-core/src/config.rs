//! Engine configuration.

use serde::Deserialize;

use crate::chunk::{DEFAULT_CHUNK_SIZE, MAX_CHUNKS_PER_TRANSFER, MIN_CHUNK_SIZE};
use crate::node::MBPS;

/// Tunables for a [`VirtualNetwork`](crate::VirtualNetwork).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Chunk size used when splitting admitted transfers (default 1 MiB, at least 4 KiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: u64,
    /// Bandwidth given to nodes that join through registration, which carries none.
    #[serde(default = "default_bandwidth")]
    pub default_bandwidth_bps: u64,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}
fn default_bandwidth() -> u64 {
    100 * MBPS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
            default_bandwidth_bps: default_bandwidth(),
        }
    }
}

impl Config {
    /// Reject values the engine would otherwise have to correct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size_bytes < MIN_CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeTooSmall(self.chunk_size_bytes));
        }
        Ok(())
    }

    /// Chunk size for a payload of `total_size_bytes`: the configured size raised to
    /// [`MIN_CHUNK_SIZE`], and further so the payload splits into at most
    /// [`MAX_CHUNKS_PER_TRANSFER`] chunks.
    pub fn chunk_size_for(&self, total_size_bytes: u64) -> u64 {
        self.chunk_size_bytes
            .max(MIN_CHUNK_SIZE)
            .max(total_size_bytes.div_ceil(MAX_CHUNKS_PER_TRANSFER))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk_size_bytes = {0} is below the {MIN_CHUNK_SIZE} byte minimum")]
    ChunkSizeTooSmall(u64),
}
