//! Transfer admission: validate adjacency and destination capacity, reserve, chunk.

use serde::Serialize;

use crate::chunk::{self, Transfer};
use crate::topology::Topology;

/// Why a transfer was not admitted. An expected runtime outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DenyReason {
    /// Zero-byte payloads are not transfers.
    EmptyFile,
    /// Source and target are the same node.
    SameNode,
    UnknownNode(String),
    /// No direct link between source and target.
    NoLink,
    NoCapacity { requested: u64, available: u64 },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::EmptyFile => f.write_str("file is empty"),
            DenyReason::SameNode => f.write_str("source and target are the same node"),
            DenyReason::UnknownNode(n) => write!(f, "unknown node {n:?}"),
            DenyReason::NoLink => f.write_str("no direct link between source and target"),
            DenyReason::NoCapacity {
                requested,
                available,
            } => write!(
                f,
                "insufficient storage at target: requested {requested} bytes, {available} available"
            ),
        }
    }
}

/// Result of an admission attempt.
#[derive(Debug, Clone)]
pub enum Admission {
    Admitted(Transfer),
    Denied(DenyReason),
}

impl Admission {
    pub fn transfer(&self) -> Option<&Transfer> {
        match self {
            Admission::Admitted(t) => Some(t),
            Admission::Denied(_) => None,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Check-and-reserve. On success the full size is reserved at the target, both
/// endpoints count one more active transfer, and the new transfer is returned.
/// On denial nothing in the topology has changed.
pub(crate) fn admit(
    topology: &mut Topology,
    source: &str,
    target: &str,
    file_name: &str,
    total_size_bytes: u64,
    chunk_size: u64,
) -> Result<Transfer, DenyReason> {
    if total_size_bytes == 0 {
        return Err(DenyReason::EmptyFile);
    }
    if source == target {
        return Err(DenyReason::SameNode);
    }
    for name in [source, target] {
        if topology.node(name).is_none() {
            return Err(DenyReason::UnknownNode(name.to_string()));
        }
    }
    let link_bandwidth_bps = topology
        .get_link(source, target)
        .map(|l| l.bandwidth_bps)
        .ok_or(DenyReason::NoLink)?;

    let dst = topology
        .node_mut(target)
        .ok_or_else(|| DenyReason::UnknownNode(target.to_string()))?;
    if !dst.reserve_storage(total_size_bytes) {
        return Err(DenyReason::NoCapacity {
            requested: total_size_bytes,
            available: dst.available_storage_bytes(),
        });
    }
    dst.begin_transfer();
    if let Some(src) = topology.node_mut(source) {
        src.begin_transfer();
    }

    let chunks = chunk::split_into_chunks(total_size_bytes, chunk_size);
    Ok(Transfer::new(
        file_name,
        source,
        target,
        total_size_bytes,
        link_bandwidth_bps,
        chunks,
    ))
}
