//! Precomputed path properties between every pair of in-use graph nodes, plus the
//! inter-host packet counters used for end-of-run statistics.
//!
//! [`RoutingInfo`] is built once, after host registration closes the set of nodes actually in
//! use, and is immutable for the rest of the run except for the packet counters (which are
//! behind a [`RwLock`] since workers increment them concurrently).

use std::collections::HashMap;
use std::sync::RwLock;

use petgraph::graph::NodeIndex;

use crate::network::graph::PathProperties;

/// Path properties and traffic counters between every pair of nodes that have at least one
/// host attached, computed once up front (either via Dijkstra or the direct-mode synthetic
/// link — see [`crate::network::graph::NetworkGraph`]).
#[derive(Debug)]
pub struct RoutingInfo {
    paths: HashMap<(NodeIndex, NodeIndex), PathProperties>,
    packet_counts: RwLock<HashMap<(NodeIndex, NodeIndex), u64>>,
}

impl RoutingInfo {
    pub fn new(paths: HashMap<(NodeIndex, NodeIndex), PathProperties>) -> Self {
        Self {
            paths,
            packet_counts: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_routable(&self, src: NodeIndex, dst: NodeIndex) -> bool {
        self.paths.contains_key(&(src, dst))
    }

    pub fn path(&self, src: NodeIndex, dst: NodeIndex) -> Option<PathProperties> {
        self.paths.get(&(src, dst)).copied()
    }

    pub fn latency_ns(&self, src: NodeIndex, dst: NodeIndex) -> Option<u64> {
        self.path(src, dst).map(|p| p.latency_ns)
    }

    pub fn reliability(&self, src: NodeIndex, dst: NodeIndex) -> Option<f32> {
        self.path(src, dst).map(|p| 1f32 - p.packet_loss)
    }

    /// The smallest latency, in nanoseconds, over every known path. Used to seed the
    /// minimum-possible-latency floor on the runahead window.
    pub fn get_smallest_latency_ns(&self) -> Option<u64> {
        self.paths.values().map(|p| p.latency_ns).min()
    }

    pub fn increment_packet_count(&self, src: NodeIndex, dst: NodeIndex) {
        let mut counts = self.packet_counts.write().unwrap();
        *counts.entry((src, dst)).or_insert(0) += 1;
    }

    /// Emit the accumulated packet counts as `log::info!` lines, one per routed pair with
    /// nonzero traffic. Called once at the end of a run.
    pub fn log_packet_counts(&self) {
        let counts = self.packet_counts.read().unwrap();
        for (&(src, dst), &count) in counts.iter() {
            log::info!(
                "packets sent from node {:?} to node {:?}: {}",
                src,
                dst,
                count
            );
        }
    }
}
