//! Topology: node registry (unique names) and undirected, bandwidth-rated links.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::node::ResourceNode;

/// Unordered pair of node names. `LinkKey::new("a", "b") == LinkKey::new("b", "a")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkKey(String, String);

impl LinkKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            LinkKey(a.to_string(), b.to_string())
        } else {
            LinkKey(b.to_string(), a.to_string())
        }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }

    pub fn touches(&self, name: &str) -> bool {
        self.0 == name || self.1 == name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub key: LinkKey,
    pub bandwidth_bps: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("node {0:?} is already registered")]
    DuplicateNode(String),
    #[error("unknown node {0:?}")]
    UnknownNode(String),
    #[error("node id {0:?} is already announced")]
    DuplicateAnnouncedId(String),
    #[error("invalid bandwidth {bandwidth_bps} bps for link {a:?} - {b:?}")]
    InvalidBandwidth {
        a: String,
        b: String,
        bandwidth_bps: u64,
    },
    #[error("cannot link node {0:?} to itself")]
    SelfLink(String),
}

/// Owns every node (by name) and every link (by unordered name pair).
#[derive(Debug, Default)]
pub struct Topology {
    nodes: BTreeMap<String, ResourceNode>,
    links: HashMap<LinkKey, Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: ResourceNode) -> Result<(), TopologyError> {
        if self.nodes.contains_key(node.name()) {
            return Err(TopologyError::DuplicateNode(node.name().to_string()));
        }
        self.nodes.insert(node.name().to_string(), node);
        Ok(())
    }

    /// Insert the link, or overwrite the bandwidth of an existing one (last write wins).
    pub fn connect_nodes(&mut self, a: &str, b: &str, bandwidth_bps: u64) -> Result<(), TopologyError> {
        for name in [a, b] {
            if !self.nodes.contains_key(name) {
                return Err(TopologyError::UnknownNode(name.to_string()));
            }
        }
        if a == b {
            return Err(TopologyError::SelfLink(a.to_string()));
        }
        if bandwidth_bps == 0 {
            return Err(TopologyError::InvalidBandwidth {
                a: a.to_string(),
                b: b.to_string(),
                bandwidth_bps,
            });
        }
        let key = LinkKey::new(a, b);
        let link = Link {
            key: key.clone(),
            bandwidth_bps,
        };
        if let Some(old) = self.links.insert(key, link) {
            tracing::debug!(a, b, old = old.bandwidth_bps, new = bandwidth_bps, "link bandwidth overwritten");
        } else {
            tracing::debug!(a, b, bandwidth_bps, "link added");
        }
        Ok(())
    }

    pub fn link_exists(&self, a: &str, b: &str) -> bool {
        self.links.contains_key(&LinkKey::new(a, b))
    }

    pub fn get_link(&self, a: &str, b: &str) -> Option<&Link> {
        self.links.get(&LinkKey::new(a, b))
    }

    /// Links with `name` as one endpoint.
    pub fn neighbors<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.values().filter(move |l| l.key.touches(name))
    }

    pub fn node(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.get(name)
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(name)
    }

    /// Nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeSpec, MBPS, MIB};

    fn node(name: &str) -> ResourceNode {
        ResourceNode::new(
            name,
            NodeSpec {
                cpu_capacity: 4,
                memory_capacity_bytes: 0,
                storage_bytes: 100 * MIB,
                bandwidth_bps: 100 * MBPS,
            },
        )
    }

    fn abc() -> Topology {
        let mut t = Topology::new();
        for n in ["A", "B", "C"] {
            t.add_node(node(n)).unwrap();
        }
        t
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut t = abc();
        assert_eq!(
            t.add_node(node("A")),
            Err(TopologyError::DuplicateNode("A".into()))
        );
        assert_eq!(t.node_count(), 3);
    }

    #[test]
    fn connect_unknown_node() {
        let mut t = abc();
        assert_eq!(
            t.connect_nodes("A", "Z", 10),
            Err(TopologyError::UnknownNode("Z".into()))
        );
        assert!(!t.link_exists("A", "Z"));
    }

    #[test]
    fn connect_zero_bandwidth() {
        let mut t = abc();
        assert!(matches!(
            t.connect_nodes("A", "B", 0),
            Err(TopologyError::InvalidBandwidth { .. })
        ));
        assert!(!t.link_exists("A", "B"));
    }

    #[test]
    fn connect_self_rejected() {
        let mut t = abc();
        assert_eq!(
            t.connect_nodes("A", "A", 10),
            Err(TopologyError::SelfLink("A".into()))
        );
    }

    #[test]
    fn links_are_undirected() {
        let mut t = abc();
        t.connect_nodes("B", "A", 10).unwrap();
        assert!(t.link_exists("A", "B"));
        assert_eq!(t.get_link("A", "B"), t.get_link("B", "A"));
        assert!(!t.link_exists("A", "C"));
    }

    #[test]
    fn reconnect_overwrites_bandwidth() {
        let mut t = abc();
        t.connect_nodes("A", "B", 50).unwrap();
        t.connect_nodes("B", "A", 100).unwrap();
        assert_eq!(t.link_count(), 1);
        assert_eq!(t.get_link("A", "B").map(|l| l.bandwidth_bps), Some(100));
    }

    #[test]
    fn neighbors_of_node() {
        let mut t = abc();
        t.connect_nodes("A", "B", 10).unwrap();
        t.connect_nodes("A", "C", 20).unwrap();
        t.connect_nodes("B", "C", 30).unwrap();
        let sum: u64 = t.neighbors("A").map(|l| l.bandwidth_bps).sum();
        assert_eq!(sum, 30);
        assert_eq!(t.neighbors("C").count(), 2);
    }
}
