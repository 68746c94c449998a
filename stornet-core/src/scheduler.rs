//! Stepwise scheduler: complete pending chunks strictly in index order, a bounded
//! number per call. No pacing; the host decides how often to step.

use serde::Serialize;

use crate::chunk::{ChunkStatus, Transfer};

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub chunks_completed: usize,
    pub fully_completed: bool,
}

impl StepOutcome {
    pub fn as_tuple(&self) -> (usize, bool) {
        (self.chunks_completed, self.fully_completed)
    }
}

/// Complete up to `max_chunks` pending chunks, lowest index first. Returns the sizes of
/// the chunks completed by this call, in order. A complete transfer yields nothing.
///
/// Chunks complete as a prefix: every chunk before the first pending one is completed,
/// so ordering holds as long as chunk state is only changed here.
pub fn advance(transfer: &mut Transfer, max_chunks: usize) -> Vec<u64> {
    let chunks = transfer.chunks_mut();
    let first_pending = chunks
        .iter()
        .position(|c| c.status == ChunkStatus::Pending)
        .unwrap_or(chunks.len());
    let end = first_pending.saturating_add(max_chunks).min(chunks.len());
    chunks[first_pending..end]
        .iter_mut()
        .map(|c| {
            c.status = ChunkStatus::Completed;
            c.size_bytes
        })
        .collect()
}

/// Chunks left to deliver.
pub fn remaining(transfer: &Transfer) -> usize {
    transfer.chunks().len() - transfer.completed_chunks()
}

/// Steps needed to finish at `chunks_per_step` chunks per call (0 for a zero budget).
pub fn steps_to_finish(transfer: &Transfer, chunks_per_step: usize) -> usize {
    if chunks_per_step == 0 {
        return 0;
    }
    remaining(transfer).div_ceil(chunks_per_step)
}
