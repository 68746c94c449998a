//! Resource node: storage/bandwidth capacity, file inventory, transfer counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// One megabit per second, in bits per second.
pub const MBPS: u64 = 1_000_000;

/// Node ID: random v4 UUID assigned at creation. Never reused, never changed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(uuid::Uuid);

impl NodeId {
    fn generate() -> Self {
        NodeId(uuid::Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form, like the registration hub prints.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Capacities a node is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    pub cpu_capacity: u32,
    /// Informational only; never enforced.
    pub memory_capacity_bytes: u64,
    pub storage_bytes: u64,
    pub bandwidth_bps: u64,
}

impl NodeSpec {
    /// Spec in the units the demo scenarios use: GB of memory/storage, Mbps of bandwidth.
    pub fn from_gb_mbps(cpu: u32, memory_gb: u64, storage_gb: u64, bandwidth_mbps: u64) -> Self {
        Self {
            cpu_capacity: cpu,
            memory_capacity_bytes: memory_gb.saturating_mul(GIB),
            storage_bytes: storage_gb.saturating_mul(GIB),
            bandwidth_bps: bandwidth_mbps.saturating_mul(MBPS),
        }
    }
}

/// Work counters. Only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeCounters {
    pub requests_processed: u64,
    pub bytes_transferred: u64,
}

/// A simulated storage/compute endpoint.
///
/// Invariant: `used_storage_bytes <= total_storage_bytes`. Used storage grows only
/// through [`reserve_storage`](Self::reserve_storage) and shrinks only through
/// [`release_storage`](Self::release_storage).
#[derive(Debug, Clone)]
pub struct ResourceNode {
    id: NodeId,
    name: String,
    cpu_capacity: u32,
    memory_capacity_bytes: u64,
    total_storage_bytes: u64,
    used_storage_bytes: u64,
    bandwidth_bps: u64,
    stored_files: BTreeMap<String, u64>,
    active_transfer_count: u64,
    counters: NodeCounters,
    last_heartbeat: Option<String>,
    /// Id the node announced when it registered over the wire, if it did.
    announced_id: Option<String>,
}

impl ResourceNode {
    pub fn new(name: impl Into<String>, spec: NodeSpec) -> Self {
        Self {
            id: NodeId::generate(),
            name: name.into(),
            cpu_capacity: spec.cpu_capacity,
            memory_capacity_bytes: spec.memory_capacity_bytes,
            total_storage_bytes: spec.storage_bytes,
            used_storage_bytes: 0,
            bandwidth_bps: spec.bandwidth_bps,
            stored_files: BTreeMap::new(),
            active_transfer_count: 0,
            counters: NodeCounters::default(),
            last_heartbeat: None,
            announced_id: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cpu_capacity(&self) -> u32 {
        self.cpu_capacity
    }

    pub fn memory_capacity_bytes(&self) -> u64 {
        self.memory_capacity_bytes
    }

    pub fn total_storage_bytes(&self) -> u64 {
        self.total_storage_bytes
    }

    pub fn used_storage_bytes(&self) -> u64 {
        self.used_storage_bytes
    }

    pub fn available_storage_bytes(&self) -> u64 {
        self.total_storage_bytes - self.used_storage_bytes
    }

    pub fn bandwidth_bps(&self) -> u64 {
        self.bandwidth_bps
    }

    pub fn stored_files(&self) -> &BTreeMap<String, u64> {
        &self.stored_files
    }

    pub fn active_transfer_count(&self) -> u64 {
        self.active_transfer_count
    }

    pub fn counters(&self) -> NodeCounters {
        self.counters
    }

    pub fn last_heartbeat(&self) -> Option<&str> {
        self.last_heartbeat.as_deref()
    }

    pub fn announced_id(&self) -> Option<&str> {
        self.announced_id.as_deref()
    }

    /// Reserve `bytes` of storage. All or nothing: returns false and changes nothing
    /// if the reservation would exceed total capacity.
    pub fn reserve_storage(&mut self, bytes: u64) -> bool {
        match self.used_storage_bytes.checked_add(bytes) {
            Some(used) if used <= self.total_storage_bytes => {
                self.used_storage_bytes = used;
                true
            }
            _ => false,
        }
    }

    /// Give back previously reserved storage. Floors at zero.
    pub fn release_storage(&mut self, bytes: u64) {
        self.used_storage_bytes = self.used_storage_bytes.saturating_sub(bytes);
    }

    /// Account for delivered data. Called once per completed chunk.
    pub fn record_progress(&mut self, bytes: u64, requests: u64) {
        self.counters.bytes_transferred = self.counters.bytes_transferred.saturating_add(bytes);
        self.counters.requests_processed = self.counters.requests_processed.saturating_add(requests);
    }

    /// Storage utilization in percent (0.0 for a zero-capacity node).
    pub fn storage_utilization(&self) -> f64 {
        percent(self.used_storage_bytes, self.total_storage_bytes)
    }

    pub(crate) fn begin_transfer(&mut self) {
        self.active_transfer_count += 1;
    }

    pub(crate) fn end_transfer(&mut self) {
        self.active_transfer_count = self.active_transfer_count.saturating_sub(1);
    }

    /// Bookkeeping only: the bytes were reserved at admission.
    pub(crate) fn store_file(&mut self, file_name: &str, size_bytes: u64) {
        self.stored_files.insert(file_name.to_string(), size_bytes);
    }

    pub(crate) fn touch_heartbeat(&mut self, timestamp: &str) {
        self.last_heartbeat = Some(timestamp.to_string());
    }

    pub(crate) fn set_announced_id(&mut self, id: &str) {
        self.announced_id = Some(id.to_string());
    }
}

/// `part / whole * 100`, or 0.0 when `whole` is zero.
pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
