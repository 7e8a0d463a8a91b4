//! Graph view of a converted network for connectivity analysis.
//!
//! The component tables are flat; checks like "is the grid a single
//! synchronous island" need an adjacency structure, so this module builds a
//! transient petgraph over buses and lines on demand.

use crate::PypsaNetwork;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet, VecDeque};

/// Undirected bus/line graph built from a [`PypsaNetwork`]. Lines whose
/// endpoints are missing from the bus table are skipped; reference errors are
/// reported by validation, not here.
pub struct BusGraph {
    graph: UnGraph<String, ()>,
}

impl BusGraph {
    pub fn from_network(network: &PypsaNetwork) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for bus in &network.buses {
            let idx = graph.add_node(bus.name.clone());
            index.insert(bus.name.as_str(), idx);
        }
        for line in &network.lines {
            if let (Some(&a), Some(&b)) =
                (index.get(line.bus0.as_str()), index.get(line.bus1.as_str()))
            {
                graph.add_edge(a, b, ());
            }
        }
        BusGraph { graph }
    }

    /// Degree-and-density statistics over the bus/line graph.
    pub fn stats(&self) -> TopologyStats {
        let node_count = self.graph.node_count();
        let edge_count = self.graph.edge_count();
        let mut degrees = Vec::with_capacity(node_count);
        for node in self.graph.node_indices() {
            degrees.push(self.graph.neighbors(node).count());
        }
        let min_degree = *degrees.iter().min().unwrap_or(&0);
        let max_degree = *degrees.iter().max().unwrap_or(&0);
        let avg_degree = if node_count == 0 {
            0.0
        } else {
            degrees.iter().copied().sum::<usize>() as f64 / node_count as f64
        };
        let density = if node_count < 2 {
            0.0
        } else {
            2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        };
        TopologyStats {
            node_count,
            edge_count,
            connected_components: connected_components(&self.graph),
            min_degree,
            avg_degree,
            max_degree,
            density,
        }
    }

    /// Labels connected components by breadth-first search and returns the
    /// bus membership of each, largest first.
    pub fn islands(&self) -> Vec<Island> {
        let mut visited = HashSet::new();
        let mut islands = Vec::new();
        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(start);
            let mut buses = Vec::new();
            while let Some(node) = queue.pop_front() {
                if !visited.insert(node) {
                    continue;
                }
                buses.push(self.graph[node].clone());
                for neighbor in self.graph.neighbors(node) {
                    if !visited.contains(&neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            if !buses.is_empty() {
                buses.sort();
                islands.push(Island { buses });
            }
        }
        islands.sort_by(|a, b| b.buses.len().cmp(&a.buses.len()));
        islands
    }

    pub fn is_connected(&self) -> bool {
        self.graph.node_count() <= 1 || connected_components(&self.graph) == 1
    }
}

/// Summary statistics of the bus/line graph (classic network science measures).
#[derive(Debug)]
pub struct TopologyStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// One synchronous island: the buses of a connected component.
#[derive(Debug)]
pub struct Island {
    pub buses: Vec<String>,
}
