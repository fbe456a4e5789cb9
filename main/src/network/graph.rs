//! The immutable network topology, parsed from a GML document.

use std::collections::HashMap;
use std::error::Error;

use petgraph::graph::NodeIndex;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::network::petgraph_wrapper::GraphWrapper;
use crate::support::units::{self, Unit};

pub type NetGraphError = Box<dyn Error + Send + Sync + 'static>;

/// A graph node.
#[derive(Debug, PartialEq, Eq)]
pub struct ShadowNode {
    pub id: u32,
    pub bandwidth_down: Option<units::BitsPerSec<units::SiPrefixUpper>>,
    pub bandwidth_up: Option<units::BitsPerSec<units::SiPrefixUpper>>,
}

impl TryFrom<gml_parser::gml::Node<'_>> for ShadowNode {
    type Error = String;

    fn try_from(mut gml_node: gml_parser::gml::Node) -> Result<Self, Self::Error> {
        Ok(Self {
            id: gml_node.id.ok_or("Node 'id' was not provided")?,
            bandwidth_down: gml_node
                .other
                .remove("host_bandwidth_down")
                .map(|bandwidth| {
                    bandwidth
                        .as_str()
                        .ok_or("Node 'host_bandwidth_down' is not a string")?
                        .parse()
                        .map_err(|e| format!("Node 'host_bandwidth_down' is not a valid unit: {e}"))
                })
                .transpose()?,
            bandwidth_up: gml_node
                .other
                .remove("host_bandwidth_up")
                .map(|bandwidth| {
                    bandwidth
                        .as_str()
                        .ok_or("Node 'host_bandwidth_up' is not a string")?
                        .parse()
                        .map_err(|e| format!("Node 'host_bandwidth_up' is not a valid unit: {e}"))
                })
                .transpose()?,
        })
    }
}

/// A graph edge.
#[derive(Debug, PartialEq)]
pub struct ShadowEdge {
    pub source: u32,
    pub target: u32,
    pub latency: units::Time<units::TimePrefix>,
    pub jitter: units::Time<units::TimePrefix>,
    pub packet_loss: f32,
    pub bandwidth_down: Option<units::BitsPerSec<units::SiPrefixUpper>>,
    pub bandwidth_up: Option<units::BitsPerSec<units::SiPrefixUpper>>,
}

impl TryFrom<gml_parser::gml::Edge<'_>> for ShadowEdge {
    type Error = String;

    fn try_from(mut gml_edge: gml_parser::gml::Edge) -> Result<Self, Self::Error> {
        let rv = Self {
            source: gml_edge.source,
            target: gml_edge.target,
            latency: gml_edge
                .other
                .remove("latency")
                .ok_or("Edge 'latency' was not provided")?
                .as_str()
                .ok_or("Edge 'latency' is not a string")?
                .parse()
                .map_err(|e| format!("Edge 'latency' is not a valid unit: {e}"))?,
            jitter: match gml_edge.other.remove("jitter") {
                Some(x) => x
                    .as_str()
                    .ok_or("Edge 'jitter' is not a string")?
                    .parse()
                    .map_err(|e| format!("Edge 'jitter' is not a valid unit: {e}"))?,
                None => units::Time::new(0, units::TimePrefix::Milli),
            },
            packet_loss: match gml_edge.other.remove("packet_loss") {
                Some(x) => x.as_float().ok_or("Edge 'packet_loss' is not a float")?,
                None => 0.0,
            },
            bandwidth_down: gml_edge
                .other
                .remove("edge_bandwidth_down")
                .map(|bandwidth| {
                    bandwidth
                        .as_str()
                        .ok_or("Edge 'edge_bandwidth_down' is not a string")?
                        .parse()
                        .map_err(|e| format!("Edge 'edge_bandwidth_down' is not a valid unit: {e}"))
                })
                .transpose()?,
            bandwidth_up: gml_edge
                .other
                .remove("edge_bandwidth_up")
                .map(|bandwidth| {
                    bandwidth
                        .as_str()
                        .ok_or("Edge 'edge_bandwidth_up' is not a string")?
                        .parse()
                        .map_err(|e| format!("Edge 'edge_bandwidth_up' is not a valid unit: {e}"))
                })
                .transpose()?,
        };

        if rv.packet_loss < 0f32 || rv.packet_loss > 1f32 {
            return Err("Edge 'packet_loss' is not in the range [0,1]".into());
        }

        if rv.latency.value() == 0 {
            return Err("Edge 'latency' must not be 0".into());
        }

        Ok(rv)
    }
}

/// A network graph containing the petgraph graph and a map from GML node ids to petgraph node
/// indexes.
#[derive(Debug)]
pub struct NetworkGraph {
    graph: GraphWrapper<ShadowNode, ShadowEdge, u32>,
    node_id_to_index_map: HashMap<u32, NodeIndex>,
}

impl NetworkGraph {
    pub fn node_id_to_index(&self, id: u32) -> Option<&NodeIndex> {
        self.node_id_to_index_map.get(&id)
    }

    pub fn node_index_to_id(&self, index: NodeIndex) -> Option<u32> {
        self.graph.node_weight(index).map(|w| w.id)
    }

    pub fn node_exists(&self, id: u32) -> bool {
        self.node_id_to_index_map.contains_key(&id)
    }

    pub fn bandwidth_down(&self, id: u32) -> Option<units::BitsPerSec<units::SiPrefixUpper>> {
        let index = *self.node_id_to_index_map.get(&id)?;
        self.graph.node_weight(index)?.bandwidth_down
    }

    pub fn bandwidth_up(&self, id: u32) -> Option<units::BitsPerSec<units::SiPrefixUpper>> {
        let index = *self.node_id_to_index_map.get(&id)?;
        self.graph.node_weight(index)?.bandwidth_up
    }

    /// Parse a GML document into a network graph. Fails with a description of the problem if any
    /// edge has non-positive latency, references a nonexistent node, or otherwise violates the
    /// GML/unit grammar.
    pub fn parse(graph_text: &str) -> Result<Self, NetGraphError> {
        let gml_graph = gml_parser::parse(graph_text)?;

        let mut g = match gml_graph.directed {
            true => GraphWrapper::Directed(
                petgraph::graph::Graph::<_, _, petgraph::Directed, _>::with_capacity(
                    gml_graph.nodes.len(),
                    gml_graph.edges.len(),
                ),
            ),
            false => GraphWrapper::Undirected(
                petgraph::graph::Graph::<_, _, petgraph::Undirected, _>::with_capacity(
                    gml_graph.nodes.len(),
                    gml_graph.edges.len(),
                ),
            ),
        };

        // map from GML id to petgraph id
        let mut id_map = HashMap::new();

        for x in gml_graph.nodes.into_iter() {
            let x: ShadowNode = x.try_into()?;
            let gml_id = x.id;
            let petgraph_id = g.add_node(x);
            id_map.insert(gml_id, petgraph_id);
        }

        for x in gml_graph.edges.into_iter() {
            let x: ShadowEdge = x.try_into()?;

            let source = *id_map
                .get(&x.source)
                .ok_or(format!("Edge source {} doesn't exist", x.source))?;
            let target = *id_map
                .get(&x.target)
                .ok_or(format!("Edge target {} doesn't exist", x.target))?;

            g.add_edge(source, target, x);
        }

        Ok(Self {
            graph: g,
            node_id_to_index_map: id_map,
        })
    }

    /// Run Dijkstra's algorithm from every node in `nodes`, restricted to destinations also in
    /// `nodes`. Fails if the graph is not connected across `nodes` (every pair must have a
    /// computed path, including the self-pair via an explicit self-loop edge).
    pub fn compute_shortest_paths(
        &self,
        nodes: &[NodeIndex],
    ) -> Result<HashMap<(NodeIndex, NodeIndex), PathProperties>, NetGraphError> {
        let start = std::time::Instant::now();

        let mut paths: HashMap<(_, _), PathProperties> = nodes
            .into_par_iter()
            .flat_map(|src| {
                match &self.graph {
                    GraphWrapper::Directed(graph) => {
                        petgraph::algo::dijkstra(&graph, *src, None, |e| e.weight().into())
                    }
                    GraphWrapper::Undirected(graph) => {
                        petgraph::algo::dijkstra(&graph, *src, None, |e| e.weight().into())
                    }
                }
                .into_iter()
                // ignore nodes that aren't in use
                .filter(|(dst, _)| nodes.contains(dst))
                .map(|(dst, path)| ((*src, dst), path))
                .collect::<HashMap<(_, _), _>>()
            })
            .collect();

        for node in nodes {
            // the self-loop edge (required, not synthesized) takes precedence over the
            // zero-weight dijkstra self-path
            paths.insert((*node, *node), self.get_edge_weight(node, node)?.into());
        }

        for src in nodes {
            for dst in nodes {
                if !paths.contains_key(&(*src, *dst)) {
                    let src_id = self.node_index_to_id(*src).unwrap();
                    let dst_id = self.node_index_to_id(*dst).unwrap();
                    return Err(format!(
                        "Graph is not connected: no path from node {src_id} to node {dst_id}"
                    )
                    .into());
                }
            }
        }

        log::debug!(
            "Finished computing shortest paths: {} seconds, {} entries",
            (std::time::Instant::now() - start).as_secs(),
            paths.len()
        );

        Ok(paths)
    }

    /// Build direct-mode paths: every pair of in-use nodes is connected by a single synthetic
    /// edge at the graph's global minimum latency, regardless of whether an edge between them
    /// actually exists.
    pub fn get_direct_paths(
        &self,
        nodes: &[NodeIndex],
    ) -> Result<HashMap<(NodeIndex, NodeIndex), PathProperties>, NetGraphError> {
        let start = std::time::Instant::now();

        let synthetic = self.global_minimum_path()?;

        let paths: HashMap<_, _> = nodes
            .iter()
            .flat_map(|src| nodes.iter().map(move |dst| (*src, *dst)))
            .map(|(src, dst)| ((src, dst), synthetic))
            .collect();

        log::debug!(
            "Finished computing direct paths: {} seconds, {} entries",
            (std::time::Instant::now() - start).as_secs(),
            paths.len()
        );

        Ok(paths)
    }

    /// The graph's global minimum edge latency and the reliability obtained by surviving every
    /// edge's loss — the synthetic link used by direct mode.
    fn global_minimum_path(&self) -> Result<PathProperties, NetGraphError> {
        let edges = self.edges();
        if edges.is_empty() {
            return Err("Graph has no edges; direct routing mode is undefined".into());
        }

        let min_latency = edges
            .iter()
            .map(|e| PathProperties::from(*e).latency_ns)
            .min()
            .unwrap();

        let reliability: f32 = edges
            .iter()
            .fold(1f32, |acc, e| acc * (1f32 - e.packet_loss));

        Ok(PathProperties {
            latency_ns: min_latency,
            packet_loss: 1f32 - reliability,
        })
    }

    fn edges(&self) -> Vec<&ShadowEdge> {
        match &self.graph {
            GraphWrapper::Directed(graph) => graph.edge_weights().collect(),
            GraphWrapper::Undirected(graph) => graph.edge_weights().collect(),
        }
    }

    /// Get the weight for the edge between two nodes. Returns an error if there is not exactly
    /// one edge between them.
    fn get_edge_weight(
        &self,
        src: &NodeIndex,
        dst: &NodeIndex,
    ) -> Result<&ShadowEdge, NetGraphError> {
        let src_id = self.node_index_to_id(*src).unwrap();
        let dst_id = self.node_index_to_id(*dst).unwrap();
        let mut edges = match &self.graph {
            GraphWrapper::Directed(graph) => graph.edges_connecting(*src, *dst),
            GraphWrapper::Undirected(_) => {
                return self.get_edge_weight_undirected(src, dst, src_id, dst_id);
            }
        };
        let edge = edges
            .next()
            .ok_or(format!("No edge connecting node {src_id} to {dst_id}"))?;
        if edges.next().is_some() {
            return Err(format!("More than one edge connecting node {src_id} to {dst_id}").into());
        }
        Ok(edge.weight())
    }

    fn get_edge_weight_undirected(
        &self,
        src: &NodeIndex,
        dst: &NodeIndex,
        src_id: u32,
        dst_id: u32,
    ) -> Result<&ShadowEdge, NetGraphError> {
        let GraphWrapper::Undirected(graph) = &self.graph else {
            unreachable!()
        };
        let mut edges = graph.edges_connecting(*src, *dst);
        let edge = edges
            .next()
            .ok_or(format!("No edge connecting node {src_id} to {dst_id}"))?;
        if edges.next().is_some() {
            return Err(format!("More than one edge connecting node {src_id} to {dst_id}").into());
        }
        Ok(edge.weight())
    }
}

/// Network characteristics for a path between two nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathProperties {
    /// Latency in nanoseconds.
    pub latency_ns: u64,
    /// Packet loss as a fraction.
    pub packet_loss: f32,
}

impl PartialOrd for PathProperties {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.latency_ns.cmp(&other.latency_ns) {
            std::cmp::Ordering::Equal => self.packet_loss.partial_cmp(&other.packet_loss),
            x => Some(x),
        }
    }
}

impl PartialEq for PathProperties {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(std::cmp::Ordering::Equal)
    }
}

impl core::ops::Add for PathProperties {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self {
            latency_ns: self.latency_ns + other.latency_ns,
            packet_loss: 1f32 - (1f32 - self.packet_loss) * (1f32 - other.packet_loss),
        }
    }
}

impl std::convert::From<&ShadowEdge> for PathProperties {
    fn from(e: &ShadowEdge) -> Self {
        Self {
            latency_ns: e.latency.convert(units::TimePrefix::Nano).unwrap().value(),
            packet_loss: e.packet_loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_add() {
        let p1 = PathProperties {
            latency_ns: 23,
            packet_loss: 0.35,
        };
        let p2 = PathProperties {
            latency_ns: 11,
            packet_loss: 0.85,
        };

        let p3 = p1 + p2;
        assert_eq!(p3.latency_ns, 34);
        assert!((p3.packet_loss - 0.9025).abs() < 0.01);
    }

    #[test]
    fn test_nonexistent_id() {
        for id in &[2, 3] {
            let graph = format!(
                r#"graph [
                node [
                  id 1
                ]
                node [
                  id 3
                ]
                edge [
                  source 1
                  target {id}
                  latency "1 ns"
                ]
            ]"#,
            );

            if *id == 3 {
                NetworkGraph::parse(&graph).unwrap();
            } else {
                NetworkGraph::parse(&graph).unwrap_err();
            }
        }
    }

    #[test]
    fn test_zero_latency_rejected() {
        let graph = r#"graph [
            node [ id 0 ]
            node [ id 1 ]
            edge [ source 0 target 1 latency "0 ns" ]
        ]"#;
        assert!(NetworkGraph::parse(graph).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_shortest_path() {
        for directed in &[true, false] {
            let graph = format!(
                r#"graph [
                  directed {}
                  node [
                    id 0
                  ]
                  node [
                    id 1
                  ]
                  node [
                    id 2
                  ]
                  edge [
                    source 0
                    target 0
                    latency "3333 ns"
                  ]
                  edge [
                    source 1
                    target 1
                    latency "5555 ns"
                  ]
                  edge [
                    source 2
                    target 2
                    latency "7777 ns"
                  ]
                  edge [
                    source 0
                    target 1
                    latency "3 ns"
                  ]
                  edge [
                    source 1
                    target 0
                    latency "5 ns"
                  ]
                  edge [
                    source 0
                    target 2
                    latency "7 ns"
                  ]
                  edge [
                    source 2
                    target 1
                    latency "11 ns"
                  ]
                ]"#,
                if *directed { 1 } else { 0 }
            );
            let graph = NetworkGraph::parse(&graph).unwrap();
            let node_0 = *graph.node_id_to_index(0).unwrap();
            let node_1 = *graph.node_id_to_index(1).unwrap();
            let node_2 = *graph.node_id_to_index(2).unwrap();

            let shortest_paths = graph
                .compute_shortest_paths(&[node_0, node_1, node_2])
                .unwrap();

            let lookup_latency = |a, b| shortest_paths.get(&(a, b)).unwrap().latency_ns;

            if *directed {
                assert_eq!(lookup_latency(node_0, node_0), 3333);
                assert_eq!(lookup_latency(node_0, node_1), 3);
                assert_eq!(lookup_latency(node_0, node_2), 7);
                assert_eq!(lookup_latency(node_1, node_0), 5);
                assert_eq!(lookup_latency(node_1, node_1), 5555);
                assert_eq!(lookup_latency(node_1, node_2), 12);
                assert_eq!(lookup_latency(node_2, node_0), 16);
                assert_eq!(lookup_latency(node_2, node_1), 11);
                assert_eq!(lookup_latency(node_2, node_2), 7777);
            } else {
                assert_eq!(lookup_latency(node_0, node_0), 3333);
                assert_eq!(lookup_latency(node_0, node_1), 3);
                assert_eq!(lookup_latency(node_0, node_2), 7);
                assert_eq!(lookup_latency(node_1, node_0), 3);
                assert_eq!(lookup_latency(node_1, node_1), 5555);
                assert_eq!(lookup_latency(node_1, node_2), 10);
                assert_eq!(lookup_latency(node_2, node_0), 7);
                assert_eq!(lookup_latency(node_2, node_1), 10);
                assert_eq!(lookup_latency(node_2, node_2), 7777);
            }
        }
    }

    #[test]
    fn test_disconnected_graph_rejected_for_shortest_path() {
        let graph = r#"graph [
            node [ id 0 ]
            node [ id 1 ]
            edge [ source 0 target 0 latency "1 ns" ]
            edge [ source 1 target 1 latency "1 ns" ]
        ]"#;
        let graph = NetworkGraph::parse(graph).unwrap();
        let node_0 = *graph.node_id_to_index(0).unwrap();
        let node_1 = *graph.node_id_to_index(1).unwrap();
        assert!(graph.compute_shortest_paths(&[node_0, node_1]).is_err());
    }

    #[test]
    fn test_direct_paths_use_global_minimum() {
        let graph = r#"graph [
            node [ id 0 ]
            node [ id 1 ]
            node [ id 2 ]
            edge [ source 0 target 1 latency "10 ms" packet_loss 0.0 ]
            edge [ source 1 target 2 latency "20 ms" packet_loss 0.1 ]
        ]"#;
        let graph = NetworkGraph::parse(graph).unwrap();
        let node_0 = *graph.node_id_to_index(0).unwrap();
        let node_2 = *graph.node_id_to_index(2).unwrap();

        let paths = graph.get_direct_paths(&[node_0, node_2]).unwrap();
        let path = paths.get(&(node_0, node_2)).unwrap();
        assert_eq!(path.latency_ns, 10_000_000);
    }
}
