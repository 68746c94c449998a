//! Statistics: utilization and performance views derived on demand from node and
//! transfer state. Nothing here is cached, so every call reconciles with the nodes.

use serde::Serialize;

use crate::chunk::{Transfer, TransferStatus};
use crate::node::{percent, ResourceNode};
use crate::topology::Topology;

/// Storage view of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    pub node: String,
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub utilization_percent: f64,
    pub files_stored: usize,
    pub active_transfers: u64,
}

/// Bandwidth view of one node.
///
/// An estimate, not a measurement: the engine does not track instantaneous throughput,
/// so every in-progress transfer touching the node is assumed to run at its link's full
/// bandwidth, and the sum is capped at the node's own bandwidth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkUsage {
    pub node: String,
    pub bandwidth_bps: u64,
    pub estimated_demand_bps: u64,
    pub utilization_percent: f64,
    pub active_transfers: u64,
    pub adjacent_links: usize,
    pub adjacent_capacity_bps: u64,
}

/// Work counters of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceStats {
    pub node: String,
    pub requests_processed: u64,
    pub bytes_transferred: u64,
    pub cpu_capacity: u32,
    pub memory_capacity_bytes: u64,
}

/// Network-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub total_links: usize,
    pub used_storage_bytes: u64,
    pub total_storage_bytes: u64,
    pub storage_utilization: f64,
    /// Sum of capped per-node demand over sum of node bandwidth, in percent.
    pub bandwidth_utilization: f64,
    /// Sum of per-node active transfer counts (each transfer counts at both ends).
    pub active_transfers: u64,
    /// Distinct transfers admitted but neither completed nor cancelled.
    pub transfers_in_progress: usize,
    /// Sum of per-node byte counters.
    pub bytes_transferred: u64,
}

pub fn node_storage_stats(node: &ResourceNode) -> StorageStats {
    StorageStats {
        node: node.name().to_string(),
        used_bytes: node.used_storage_bytes(),
        total_bytes: node.total_storage_bytes(),
        utilization_percent: node.storage_utilization(),
        files_stored: node.stored_files().len(),
        active_transfers: node.active_transfer_count(),
    }
}

pub fn node_performance_stats(node: &ResourceNode) -> PerformanceStats {
    let counters = node.counters();
    PerformanceStats {
        node: node.name().to_string(),
        requests_processed: counters.requests_processed,
        bytes_transferred: counters.bytes_transferred,
        cpu_capacity: node.cpu_capacity(),
        memory_capacity_bytes: node.memory_capacity_bytes(),
    }
}

/// Bandwidth estimate for `node`. `transfers` may include finished or cancelled
/// transfers; only in-progress ones count.
pub fn node_network_stats<'a>(
    topology: &Topology,
    transfers: impl IntoIterator<Item = &'a Transfer>,
    node: &ResourceNode,
) -> NetworkUsage {
    let name = node.name();
    let demand: u64 = transfers
        .into_iter()
        .filter(|t| t.status() == TransferStatus::InProgress)
        .filter(|t| t.source() == name || t.target() == name)
        .map(|t| {
            topology
                .get_link(t.source(), t.target())
                .map(|l| l.bandwidth_bps)
                .unwrap_or(t.link_bandwidth_bps())
        })
        .fold(0u64, u64::saturating_add);
    let capped = demand.min(node.bandwidth_bps());
    let (adjacent_links, adjacent_capacity_bps) = topology
        .neighbors(name)
        .fold((0usize, 0u64), |(n, bw), l| (n + 1, bw.saturating_add(l.bandwidth_bps)));
    NetworkUsage {
        node: name.to_string(),
        bandwidth_bps: node.bandwidth_bps(),
        estimated_demand_bps: capped,
        utilization_percent: percent(capped, node.bandwidth_bps()),
        active_transfers: node.active_transfer_count(),
        adjacent_links,
        adjacent_capacity_bps,
    }
}

pub fn network_stats<'a>(
    topology: &Topology,
    transfers: impl IntoIterator<Item = &'a Transfer> + Clone,
) -> NetworkStats {
    let mut used = 0u64;
    let mut total = 0u64;
    let mut bandwidth = 0u64;
    let mut demand = 0u64;
    let mut active = 0u64;
    let mut bytes = 0u64;
    for node in topology.nodes() {
        used = used.saturating_add(node.used_storage_bytes());
        total = total.saturating_add(node.total_storage_bytes());
        bandwidth = bandwidth.saturating_add(node.bandwidth_bps());
        demand = demand.saturating_add(
            node_network_stats(topology, transfers.clone(), node).estimated_demand_bps,
        );
        active += node.active_transfer_count();
        bytes = bytes.saturating_add(node.counters().bytes_transferred);
    }
    let transfers_in_progress = transfers
        .into_iter()
        .filter(|t| t.status() == TransferStatus::InProgress)
        .count();
    NetworkStats {
        total_nodes: topology.node_count(),
        total_links: topology.link_count(),
        used_storage_bytes: used,
        total_storage_bytes: total,
        storage_utilization: percent(used, total),
        bandwidth_utilization: percent(demand, bandwidth),
        active_transfers: active,
        transfers_in_progress,
        bytes_transferred: bytes,
    }
}
