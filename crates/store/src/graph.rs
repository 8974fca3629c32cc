use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use protocol::ClassRecord;
use std::collections::HashMap;
use tracing::info;

/// Class-to-base edges for fast inheritance traversals
#[derive(Debug, Default)]
pub struct InheritanceGraph {
    graph: DiGraph<String, ()>,
    class_to_node: HashMap<String, NodeIndex>,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build graph from class records, one edge per declared base
    pub fn build_from_records(records: &[ClassRecord]) -> Self {
        let mut graph = Self::new();

        for record in records {
            graph.add_class(&record.name);
            for base in &record.bases {
                graph.add_base(&record.name, base);
            }
        }

        info!(
            "Built inheritance graph with {} classes and {} edges",
            graph.class_to_node.len(),
            graph.graph.edge_count()
        );

        graph
    }

    pub fn add_class(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.class_to_node.get(name) {
            return node;
        }

        let node = self.graph.add_node(name.to_string());
        self.class_to_node.insert(name.to_string(), node);
        node
    }

    pub fn add_base(&mut self, class: &str, base: &str) {
        let from = self.add_class(class);
        let to = self.add_class(base);
        self.graph.add_edge(from, to, ());
    }

    /// Direct bases in declaration order
    pub fn bases(&self, name: &str) -> Vec<String> {
        let Some(&node) = self.class_to_node.get(name) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges
            .into_iter()
            .map(|(_, target)| self.graph[target].clone())
            .collect()
    }

    /// Classes in the same strongly connected component, i.e. an
    /// inheritance cycle
    pub fn find_cycles_containing(&self, name: &str) -> Vec<Vec<String>> {
        use petgraph::algo::kosaraju_scc;

        let Some(&node) = self.class_to_node.get(name) else {
            return Vec::new();
        };

        kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 && scc.contains(&node))
            .map(|scc| {
                let mut cycle: Vec<String> =
                    scc.iter().map(|&n| self.graph[n].clone()).collect();
                cycle.sort();
                cycle
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            is_cyclic: petgraph::algo::is_cyclic_directed(&self.graph),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub is_cyclic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, bases: &[&str]) -> ClassRecord {
        ClassRecord {
            name: name.to_string(),
            bases: bases.iter().map(|b| b.to_string()).collect(),
            template_params: Vec::new(),
            header: format!("{name}.h"),
        }
    }

    #[test]
    fn test_build_graph() {
        let records = vec![record("A", &[]), record("B", &["A"]), record("C", &["B"])];
        let graph = InheritanceGraph::build_from_records(&records);

        let stats = graph.stats();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 2);
        assert!(!stats.is_cyclic);
    }

    #[test]
    fn test_bases_keep_declaration_order() {
        let graph = InheritanceGraph::build_from_records(&[record("D", &["Z", "A", "M"])]);
        assert_eq!(graph.bases("D"), vec!["Z", "A", "M"]);
        assert!(graph.bases("A").is_empty());
    }

    #[test]
    fn test_detect_cycle() {
        let records = vec![record("A", &["B"]), record("B", &["C"]), record("C", &["A"])];
        let graph = InheritanceGraph::build_from_records(&records);

        assert!(graph.stats().is_cyclic);
        let cycles = graph.find_cycles_containing("A");
        assert_eq!(cycles, vec![vec!["A", "B", "C"]]);
        assert!(graph.find_cycles_containing("Z").is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let graph = InheritanceGraph::new();

        let stats = graph.stats();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
        assert!(!stats.is_cyclic);
        assert_eq!(graph.find_cycles_containing("nonexistent"), Vec::<Vec<String>>::new());
    }

    #[test]
    fn test_idempotent_class_addition() {
        let mut graph = InheritanceGraph::new();
        let first = graph.add_class("test");
        let second = graph.add_class("test");
        assert_eq!(first, second);
        assert_eq!(graph.stats().node_count, 1);
    }
}
