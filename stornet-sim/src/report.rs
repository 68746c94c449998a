//! Human-readable and JSON renderings of the final network state.

use serde::Serialize;
use stornet_core::{
    NetworkStats, NetworkUsage, PerformanceStats, StorageStats, VirtualNetwork, GIB, MBPS, MIB,
};

use crate::driver::{Outcome, TransferReport};

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub storage: StorageStats,
    pub network: NetworkUsage,
    pub performance: PerformanceStats,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub network: NetworkStats,
    pub nodes: Vec<NodeReport>,
    pub transfers: Vec<TransferReport>,
}

pub fn collect(net: &VirtualNetwork, transfers: Vec<TransferReport>) -> SimulationReport {
    let nodes = net
        .topology()
        .nodes()
        .filter_map(|n| {
            Some(NodeReport {
                storage: net.node_storage_stats(n.name())?,
                network: net.node_network_stats(n.name())?,
                performance: net.node_performance_stats(n.name())?,
            })
        })
        .collect();
    SimulationReport {
        network: net.network_stats(),
        nodes,
        transfers,
    }
}

pub fn render(report: &SimulationReport) -> String {
    let sep = "=".repeat(70);
    let mut out = String::new();
    out.push_str(&format!("{sep}\nTRANSFERS\n"));
    for t in &report.transfers {
        let status = match &t.status {
            Outcome::Completed => "completed".to_string(),
            Outcome::Denied(reason) => format!("denied ({reason})"),
            Outcome::Cancelled => "cancelled".to_string(),
            Outcome::Failed(e) => format!("failed ({e})"),
        };
        out.push_str(&format!(
            "  {} -> {}  {} ({:.2} MB, {} chunks, {} steps): {status}\n",
            t.source,
            t.target,
            t.file_name,
            mb(t.size_bytes),
            t.chunks,
            t.steps,
        ));
    }

    let s = &report.network;
    out.push_str(&format!("{sep}\nNETWORK STATISTICS:\n"));
    out.push_str(&format!("  Total Nodes: {}\n", s.total_nodes));
    out.push_str(&format!("  Total Links: {}\n", s.total_links));
    out.push_str(&format!(
        "  Storage Usage: {:.2} GB / {:.2} GB ({:.2}%)\n",
        s.used_storage_bytes as f64 / GIB as f64,
        s.total_storage_bytes as f64 / GIB as f64,
        s.storage_utilization
    ));
    out.push_str(&format!("  Bandwidth Usage: {:.2}% (estimated)\n", s.bandwidth_utilization));
    out.push_str(&format!("  Active Transfers: {}\n", s.active_transfers));

    out.push_str(&format!("{sep}\nINDIVIDUAL NODE STATISTICS:\n"));
    for n in &report.nodes {
        out.push_str(&format!("\nNode: {}\n", n.storage.node));
        out.push_str(&format!(
            "  Storage: {:.2} MB / {:.2} MB ({:.2}%)\n",
            mb(n.storage.used_bytes),
            mb(n.storage.total_bytes),
            n.storage.utilization_percent
        ));
        out.push_str(&format!("  Files Stored: {}\n", n.storage.files_stored));
        out.push_str(&format!("  Active Transfers: {}\n", n.storage.active_transfers));
        out.push_str(&format!(
            "  Network Usage: {:.2}% of {} Mbps (estimated)\n",
            n.network.utilization_percent,
            n.network.bandwidth_bps / MBPS
        ));
        out.push_str(&format!(
            "  Total Requests Processed: {}\n",
            n.performance.requests_processed
        ));
        out.push_str(&format!(
            "  Total Data Transferred: {:.2} MB\n",
            mb(n.performance.bytes_transferred)
        ));
    }
    out.push_str(&sep);
    out
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}
