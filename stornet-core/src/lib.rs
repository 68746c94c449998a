//! Storage virtual network engine.
//! Host-driven: no I/O, no threads; host builds the network, admits and steps transfers,
//! and reads statistics.

pub mod admission;
pub mod chunk;
pub mod config;
pub mod core;
pub mod node;
pub mod protocol;
pub mod scheduler;
pub mod stats;
pub mod topology;
pub mod wire;

pub use admission::{Admission, DenyReason};
pub use chunk::{
    Chunk, ChunkStatus, Transfer, TransferId, TransferStatus, DEFAULT_CHUNK_SIZE,
    MAX_CHUNKS_PER_TRANSFER, MIN_CHUNK_SIZE,
};
pub use config::{Config, ConfigError};
pub use crate::core::{MessageError, TransferError, VirtualNetwork};
pub use node::{NodeCounters, NodeId, NodeSpec, ResourceNode, GIB, KIB, MBPS, MIB};
pub use protocol::{Heartbeat, Message, NodeDescriptor, RegistrationAck};
pub use scheduler::StepOutcome;
pub use stats::{NetworkStats, NetworkUsage, PerformanceStats, StorageStats};
pub use topology::{Link, LinkKey, Topology, TopologyError};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};
