//! Host-driven API: VirtualNetwork owns the topology and every admitted transfer.
//! The host builds the network, admits transfers, steps them, and reads statistics.

use std::collections::HashMap;

use crate::admission::{self, Admission};
use crate::chunk::{Transfer, TransferId, TransferStatus};
use crate::config::Config;
use crate::node::{NodeId, NodeSpec, ResourceNode, GIB};
use crate::protocol::{Message, NodeDescriptor, RegistrationAck};
use crate::scheduler::{self, StepOutcome};
use crate::stats::{self, NetworkStats, NetworkUsage, PerformanceStats, StorageStats};
use crate::topology::{Link, Topology, TopologyError};
use crate::wire;

/// Single owner of nodes, links and transfers. All mutation goes through `&mut self`,
/// so one lock around the whole network serializes every node mutation.
#[derive(Debug, Default)]
pub struct VirtualNetwork {
    config: Config,
    topology: Topology,
    transfers: HashMap<TransferId, Transfer>,
}

impl VirtualNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn add_node(&mut self, node: ResourceNode) -> Result<NodeId, TopologyError> {
        let id = node.id();
        self.topology.add_node(node)?;
        Ok(id)
    }

    pub fn connect_nodes(&mut self, a: &str, b: &str, bandwidth_bps: u64) -> Result<(), TopologyError> {
        self.topology.connect_nodes(a, b, bandwidth_bps)
    }

    pub fn link_exists(&self, a: &str, b: &str) -> bool {
        self.topology.link_exists(a, b)
    }

    pub fn get_link(&self, a: &str, b: &str) -> Option<&Link> {
        self.topology.get_link(a, b)
    }

    pub fn node(&self, name: &str) -> Option<&ResourceNode> {
        self.topology.node(name)
    }

    pub fn transfer(&self, file_id: TransferId) -> Option<&Transfer> {
        self.transfers.get(&file_id)
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.values()
    }

    /// Admit a transfer of `size_bytes` from `source` to `target`. On admission the full
    /// size is reserved at the target and a snapshot of the new transfer is returned;
    /// on denial nothing changes.
    pub fn initiate_file_transfer(
        &mut self,
        source: &str,
        target: &str,
        file_name: &str,
        size_bytes: u64,
    ) -> Admission {
        match admission::admit(
            &mut self.topology,
            source,
            target,
            file_name,
            size_bytes,
            self.config.chunk_size_for(size_bytes),
        ) {
            Ok(transfer) => {
                tracing::debug!(
                    file_id = %transfer.file_id(),
                    source,
                    target,
                    file_name,
                    size_bytes,
                    chunks = transfer.chunks().len(),
                    "transfer admitted"
                );
                self.transfers.insert(transfer.file_id(), transfer.clone());
                Admission::Admitted(transfer)
            }
            Err(reason) => {
                tracing::debug!(source, target, file_name, size_bytes, %reason, "transfer denied");
                Admission::Denied(reason)
            }
        }
    }

    /// Step the transfer `file_id` between `source` and `target`. A transfer that exists
    /// but runs between other nodes is reported as not found.
    pub fn process_file_transfer(
        &mut self,
        source: &str,
        target: &str,
        file_id: TransferId,
        max_chunks: usize,
    ) -> Result<StepOutcome, TransferError> {
        match self.transfers.get(&file_id) {
            Some(t) if t.source() == source && t.target() == target => {}
            _ => return Err(TransferError::NotFound(file_id)),
        }
        self.step(file_id, max_chunks)
    }

    /// Complete up to `max_chunks` pending chunks of `file_id`, in index order.
    /// Stepping a completed transfer returns `(0, true)` and changes nothing.
    pub fn step(&mut self, file_id: TransferId, max_chunks: usize) -> Result<StepOutcome, TransferError> {
        let transfer = self
            .transfers
            .get_mut(&file_id)
            .ok_or(TransferError::NotFound(file_id))?;
        if transfer.is_complete() {
            return Ok(StepOutcome {
                chunks_completed: 0,
                fully_completed: true,
            });
        }
        if transfer.is_cancelled() {
            return Err(TransferError::Cancelled(file_id));
        }
        if max_chunks == 0 {
            return Err(TransferError::ZeroChunkBudget);
        }

        let sizes = scheduler::advance(transfer, max_chunks);
        let fully_completed = transfer.is_complete();
        let (source, target) = (transfer.source().to_string(), transfer.target().to_string());
        let (file_name, total) = (transfer.file_name().to_string(), transfer.total_size_bytes());

        for name in [&source, &target] {
            if let Some(node) = self.topology.node_mut(name) {
                for &size in &sizes {
                    node.record_progress(size, 1);
                }
            }
        }
        tracing::debug!(%file_id, chunks = sizes.len(), fully_completed, "transfer stepped");

        if fully_completed {
            if let Some(src) = self.topology.node_mut(&source) {
                src.end_transfer();
            }
            if let Some(dst) = self.topology.node_mut(&target) {
                dst.end_transfer();
                dst.store_file(&file_name, total);
            }
            tracing::info!(%file_id, %source, %target, %file_name, bytes = total, "transfer completed");
        }
        Ok(StepOutcome {
            chunks_completed: sizes.len(),
            fully_completed,
        })
    }

    /// Abandon an in-progress transfer: release its whole reservation at the target and
    /// drop it from both nodes' active counts. Counters for chunks already delivered stay.
    pub fn cancel_transfer(&mut self, file_id: TransferId) -> Result<(), TransferError> {
        let transfer = self
            .transfers
            .get_mut(&file_id)
            .ok_or(TransferError::NotFound(file_id))?;
        match transfer.status() {
            TransferStatus::Completed => return Err(TransferError::AlreadyCompleted(file_id)),
            TransferStatus::Cancelled => return Err(TransferError::Cancelled(file_id)),
            TransferStatus::InProgress => {}
        }
        transfer.mark_cancelled();
        let released = transfer.total_size_bytes();
        let (source, target) = (transfer.source().to_string(), transfer.target().to_string());

        if let Some(src) = self.topology.node_mut(&source) {
            src.end_transfer();
        }
        if let Some(dst) = self.topology.node_mut(&target) {
            dst.end_transfer();
            dst.release_storage(released);
        }
        tracing::info!(%file_id, %source, %target, released, "transfer cancelled");
        Ok(())
    }

    pub fn network_stats(&self) -> NetworkStats {
        stats::network_stats(&self.topology, self.transfers.values())
    }

    pub fn node_storage_stats(&self, name: &str) -> Option<StorageStats> {
        self.topology.node(name).map(stats::node_storage_stats)
    }

    pub fn node_network_stats(&self, name: &str) -> Option<NetworkUsage> {
        let node = self.topology.node(name)?;
        Some(stats::node_network_stats(&self.topology, self.transfers.values(), node))
    }

    pub fn node_performance_stats(&self, name: &str) -> Option<PerformanceStats> {
        self.topology.node(name).map(stats::node_performance_stats)
    }

    /// Add a node announced through registration. Capacities arrive in GB; bandwidth
    /// is not announced, so the configured default applies.
    pub fn register_node(&mut self, descriptor: &NodeDescriptor) -> Result<NodeId, TopologyError> {
        let spec = NodeSpec {
            cpu_capacity: descriptor.cpu_cores,
            memory_capacity_bytes: descriptor.memory.saturating_mul(GIB),
            storage_bytes: descriptor.storage_capacity.saturating_mul(GIB),
            bandwidth_bps: self.config.default_bandwidth_bps,
        };
        if self
            .topology
            .nodes()
            .any(|n| n.announced_id() == Some(descriptor.id.as_str()))
        {
            return Err(TopologyError::DuplicateAnnouncedId(descriptor.id.clone()));
        }
        let mut node = ResourceNode::new(descriptor.name.clone(), spec);
        node.set_announced_id(&descriptor.id);
        let id = self.add_node(node)?;
        tracing::info!(
            node = %descriptor.name,
            announced_id = %descriptor.id,
            %id,
            storage_gb = descriptor.storage_capacity,
            "node registered"
        );
        Ok(id)
    }

    /// Process one framed registration message. Returns the encoded reply frame, if any.
    /// A register message always gets an ack (connected or rejected); heartbeats get none.
    pub fn on_message_received(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, MessageError> {
        let (msg, _consumed) = wire::decode_frame(bytes).map_err(|_| MessageError::DecodeFailed)?;
        match msg {
            Message::Register(descriptor) => {
                let ack = match self.register_node(&descriptor) {
                    Ok(_) => RegistrationAck::connected(),
                    Err(e) => {
                        tracing::debug!(node = %descriptor.name, error = %e, "registration rejected");
                        RegistrationAck::rejected(e.to_string())
                    }
                };
                let frame = wire::encode_frame(&Message::Ack(ack))
                    .map_err(|_| MessageError::EncodeFailed)?;
                Ok(Some(frame))
            }
            Message::Heartbeat(hb) => {
                // Announced ids are unique; nodes added locally can only be addressed by name.
                let name = self
                    .topology
                    .nodes()
                    .find(|n| n.announced_id() == Some(hb.node_id.as_str()))
                    .or_else(|| self.topology.node(&hb.node_id))
                    .map(|n| n.name().to_string())
                    .ok_or_else(|| MessageError::UnknownNode(hb.node_id.clone()))?;
                if let Some(node) = self.topology.node_mut(&name) {
                    node.touch_heartbeat(&hb.timestamp);
                }
                Ok(None)
            }
            Message::Ack(_) => Err(MessageError::UnexpectedMessage),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer {0} not found")]
    NotFound(TransferId),
    #[error("max_chunks must be at least 1")]
    ZeroChunkBudget,
    #[error("transfer {0} was cancelled")]
    Cancelled(TransferId),
    #[error("transfer {0} already completed")]
    AlreadyCompleted(TransferId),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("failed to decode message")]
    DecodeFailed,
    #[error("failed to encode reply")]
    EncodeFailed,
    #[error("heartbeat from unregistered node {0:?}")]
    UnknownNode(String),
    #[error("unexpected message")]
    UnexpectedMessage,
}
