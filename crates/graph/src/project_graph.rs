use crate::error::{GraphError, Result};
use crate::types::{ProjectEdge, ProjectNode, RelationshipType};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Directed graph of projects with typed, weighted edges. Only `Dependency`
/// edges are required to form a DAG; the rest (imports, api_client,
/// shared_database, event_driven, semantic_similarity) may cycle.
///
/// The reachability and semantic-similarity caches are invalidated
/// conservatively on every write, per the spec's "correct implementation
/// MAY invalidate all caches on any write" allowance.
pub struct RelationshipGraph {
    graph: DiGraph<ProjectNode, ProjectEdge>,
    index: HashMap<String, NodeIndex>,
    reachability_cache: HashMap<(String, usize), HashSet<String>>,
    similarity_cache: HashMap<(String, String), f32>,
}

impl Default for RelationshipGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationshipGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            reachability_cache: HashMap::new(),
            similarity_cache: HashMap::new(),
        }
    }

    fn invalidate_caches(&mut self) {
        self.reachability_cache.clear();
    }

    fn node_index(&self, project_id: &str) -> Result<NodeIndex> {
        self.index
            .get(project_id)
            .copied()
            .ok_or_else(|| GraphError::ProjectNotFound(project_id.to_string()))
    }

    pub fn add_node(&mut self, project_id: impl Into<String>) -> NodeIndex {
        let project_id = project_id.into();
        if let Some(&idx) = self.index.get(&project_id) {
            return idx;
        }
        let idx = self.graph.add_node(ProjectNode {
            project_id: project_id.clone(),
        });
        self.index.insert(project_id, idx);
        self.invalidate_caches();
        idx
    }

    /// Removes a project and every edge touching it. No-op if absent.
    pub fn remove_node(&mut self, project_id: &str) {
        if let Some(idx) = self.index.remove(project_id) {
            self.graph.remove_node(idx);
            self.invalidate_caches();
            self.similarity_cache
                .retain(|(a, b), _| a != project_id && b != project_id);
            // removing a node shifts every NodeIndex after it; rebuild the index map.
            self.index.clear();
            for idx in self.graph.node_indices() {
                let id = self.graph[idx].project_id.clone();
                self.index.insert(id, idx);
            }
        }
    }

    pub fn add_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
        relationship: RelationshipType,
        weight: f32,
    ) -> Result<()> {
        if from_id == to_id {
            return Err(GraphError::SelfReferential(from_id.to_string()));
        }
        let from = self.node_index(from_id)?;
        let to = self.node_index(to_id)?;

        if relationship.is_dependency() {
            if let Some(path) = self.would_create_cycle(from, to) {
                return Err(GraphError::CyclicDependency(path));
            }
        }

        self.graph.update_edge(from, to, ProjectEdge { relationship, weight });
        self.invalidate_caches();
        Ok(())
    }

    pub fn remove_edge(&mut self, from_id: &str, to_id: &str, relationship: RelationshipType) -> Result<()> {
        let from = self.node_index(from_id)?;
        let to = self.node_index(to_id)?;
        if let Some(edge) = self
            .graph
            .edges_connecting(from, to)
            .find(|e| e.weight().relationship == relationship)
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
            self.invalidate_caches();
        }
        Ok(())
    }

    /// Edges out of `from_id`, optionally filtered by relationship type.
    pub fn edges_from(&self, from_id: &str, relationship: Option<RelationshipType>) -> Result<Vec<(String, ProjectEdge)>> {
        let from = self.node_index(from_id)?;
        Ok(self
            .graph
            .edges(from)
            .filter(|e| relationship.map(|r| r == e.weight().relationship).unwrap_or(true))
            .map(|e| (self.graph[e.target()].project_id.clone(), *e.weight()))
            .collect())
    }

    /// Edges into `to_id`, optionally filtered by relationship type.
    pub fn edges_to(&self, to_id: &str, relationship: Option<RelationshipType>) -> Result<Vec<(String, ProjectEdge)>> {
        let to = self.node_index(to_id)?;
        Ok(self
            .graph
            .edges_directed(to, petgraph::Direction::Incoming)
            .filter(|e| relationship.map(|r| r == e.weight().relationship).unwrap_or(true))
            .map(|e| (self.graph[e.source()].project_id.clone(), *e.weight()))
            .collect())
    }

    /// Shortest path (by edge count) between two projects, via BFS.
    pub fn shortest_path(&self, from_id: &str, to_id: &str) -> Result<Option<Vec<String>>> {
        let from = self.node_index(from_id)?;
        let to = self.node_index(to_id)?;

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(&p) = parent.get(&cursor) {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return Ok(Some(
                    path.into_iter().map(|idx| self.graph[idx].project_id.clone()).collect(),
                ));
            }
            for edge in self.graph.edges(current) {
                let target = edge.target();
                if visited.insert(target) {
                    parent.insert(target, current);
                    queue.push_back(target);
                }
            }
        }
        Ok(None)
    }

    /// All simple paths from `from_id` to `to_id`, depth-first, stopping
    /// paths once they exceed `max_len` hops.
    pub fn all_simple_paths(&self, from_id: &str, to_id: &str, max_len: usize) -> Result<Vec<Vec<String>>> {
        let from = self.node_index(from_id)?;
        let to = self.node_index(to_id)?;
        let mut paths = Vec::new();
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        self.dfs_paths(from, to, max_len, &mut stack, &mut visited, &mut paths);
        Ok(paths)
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs_paths(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        max_len: usize,
        stack: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
        paths: &mut Vec<Vec<String>>,
    ) {
        if current == target && stack.len() > 1 {
            paths.push(stack.iter().map(|&idx| self.graph[idx].project_id.clone()).collect());
            return;
        }
        if stack.len() > max_len {
            return;
        }
        visited.insert(current);
        for edge in self.graph.edges(current) {
            let next = edge.target();
            if !visited.contains(&next) {
                stack.push(next);
                self.dfs_paths(next, target, max_len, stack, visited, paths);
                stack.pop();
            }
        }
        visited.remove(&current);
    }

    /// Kahn's algorithm over `Dependency` edges only. Returns `None` if the
    /// dependency subgraph has a cycle (it shouldn't, since `add_edge`
    /// rejects cycle-forming dependency edges, but removal ordering or a
    /// freshly-deserialized graph could still be inconsistent).
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self.graph.node_indices().map(|idx| (idx, 0)).collect();
        for edge in self.graph.edge_references_dependency() {
            *in_degree.entry(edge.1).or_insert(0) += 1;
        }

        let mut queue: VecDeque<NodeIndex> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&idx, _)| idx)
            .collect();
        let mut order = Vec::new();

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for edge in self.graph.edges(node) {
                if edge.weight().relationship != RelationshipType::Dependency {
                    continue;
                }
                let target = edge.target();
                if let Some(deg) = in_degree.get_mut(&target) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(target);
                    }
                }
            }
        }

        if order.len() == self.graph.node_count() {
            Some(order.into_iter().map(|idx| self.graph[idx].project_id.clone()).collect())
        } else {
            None
        }
    }

    /// Finds one cycle in the `Dependency` subgraph via DFS with a
    /// recursion stack. Returns the cycle as `a -> b -> c -> a`.
    #[must_use]
    pub fn find_dependency_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut stack = Vec::new();

        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            if let Some(cycle) = self.dfs_find_cycle(start, &mut visited, &mut on_stack, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_find_cycle(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        stack: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_stack.insert(node);
        stack.push(node);

        for edge in self.graph.edges(node) {
            if edge.weight().relationship != RelationshipType::Dependency {
                continue;
            }
            let target = edge.target();
            if on_stack.contains(&target) {
                let start = stack.iter().position(|&idx| idx == target).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|&idx| self.graph[idx].project_id.clone()).collect();
                cycle.push(self.graph[target].project_id.clone());
                return Some(cycle);
            }
            if !visited.contains(&target) {
                if let Some(cycle) = self.dfs_find_cycle(target, visited, on_stack, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        on_stack.remove(&node);
        None
    }

    /// Transitively reachable project ids from `project_id` via any edge
    /// type, up to `depth` hops. Cached keyed by `(project_id, depth)`.
    pub fn reachable(&mut self, project_id: &str, depth: usize) -> Result<HashSet<String>> {
        let key = (project_id.to_string(), depth);
        if let Some(cached) = self.reachability_cache.get(&key) {
            return Ok(cached.clone());
        }
        let start = self.node_index(project_id)?;
        let mut visited = HashSet::new();
        let mut queue = vec![(start, 0usize)];
        while let Some((node, d)) = queue.pop() {
            if d >= depth {
                continue;
            }
            for edge in self.graph.edges(node) {
                let target = edge.target();
                let id = self.graph[target].project_id.clone();
                if visited.insert(id) {
                    queue.push((target, d + 1));
                }
            }
        }
        self.reachability_cache.insert(key, visited.clone());
        Ok(visited)
    }

    /// Cached cosine similarity between two projects' embedding centroids.
    /// The caller supplies the similarity on first computation; subsequent
    /// calls return the cached value until either project re-indexes.
    pub fn cached_similarity(&self, a: &str, b: &str) -> Option<f32> {
        let key = Self::similarity_key(a, b);
        self.similarity_cache.get(&key).copied()
    }

    pub fn set_cached_similarity(&mut self, a: &str, b: &str, similarity: f32) {
        self.similarity_cache.insert(Self::similarity_key(a, b), similarity);
    }

    /// Drops any cached similarity entries involving `project_id`, called
    /// when that project finishes re-indexing.
    pub fn invalidate_similarity_for(&mut self, project_id: &str) {
        self.similarity_cache.retain(|(a, b), _| a != project_id && b != project_id);
    }

    fn similarity_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    fn would_create_cycle(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![self.graph[from].project_id.clone()]);
        }
        // A dependency edge from -> to creates a cycle iff `to` can already reach `from`.
        let mut visited = HashSet::new();
        let mut stack = vec![(to, vec![self.graph[to].project_id.clone()])];
        while let Some((node, path)) = stack.pop() {
            if node == from {
                let mut cycle = path;
                cycle.push(self.graph[to].project_id.clone());
                return Some(cycle);
            }
            if !visited.insert(node) {
                continue;
            }
            for edge in self.graph.edges(node) {
                if edge.weight().relationship != RelationshipType::Dependency {
                    continue;
                }
                let next = edge.target();
                let mut next_path = path.clone();
                next_path.push(self.graph[next].project_id.clone());
                stack.push((next, next_path));
            }
        }
        None
    }

    #[must_use]
    pub fn project_ids(&self) -> Vec<String> {
        self.graph.node_indices().map(|idx| self.graph[idx].project_id.clone()).collect()
    }

    #[must_use]
    pub fn contains(&self, project_id: &str) -> bool {
        self.index.contains_key(project_id)
    }

    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        (self.graph.node_count(), self.graph.edge_count())
    }

    pub fn to_document(&self) -> GraphDocument {
        let nodes = self.project_ids();
        let mut edges = Vec::new();
        for edge in self.graph.edge_references() {
            edges.push(GraphDocumentEdge {
                from_id: self.graph[edge.source()].project_id.clone(),
                to_id: self.graph[edge.target()].project_id.clone(),
                relationship: edge.weight().relationship,
                weight: edge.weight().weight,
            });
        }
        edges.sort_by(|a, b| {
            (a.from_id.as_str(), a.to_id.as_str(), a.relationship.as_str())
                .cmp(&(b.from_id.as_str(), b.to_id.as_str(), b.relationship.as_str()))
        });
        GraphDocument {
            version: GRAPH_DOCUMENT_VERSION,
            nodes,
            edges,
        }
    }

    pub fn from_document(doc: &GraphDocument) -> Result<Self> {
        let mut graph = Self::new();
        for node in &doc.nodes {
            graph.add_node(node.clone());
        }
        for edge in &doc.edges {
            graph.add_edge(&edge.from_id, &edge.to_id, edge.relationship, edge.weight)?;
        }
        Ok(graph)
    }

    /// DOT format, for visualization tooling. Not used by the hard-core
    /// traversal paths.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph workspace {\n");
        for idx in self.graph.node_indices() {
            out.push_str(&format!("  \"{}\";\n", self.graph[idx].project_id));
        }
        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                self.graph[edge.source()].project_id,
                self.graph[edge.target()].project_id,
                edge.weight().relationship.as_str()
            ));
        }
        out.push_str("}\n");
        out
    }
}

const GRAPH_DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocumentEdge {
    pub from_id: String,
    pub to_id: String,
    pub relationship: RelationshipType,
    pub weight: f32,
}

/// JSON-serializable snapshot of a `RelationshipGraph`, used for
/// persistence and round-tripping through the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: u32,
    pub nodes: Vec<String>,
    pub edges: Vec<GraphDocumentEdge>,
}

trait DependencyEdgeRefs {
    fn edge_references_dependency(&self) -> Vec<(NodeIndex, NodeIndex)>;
}

impl DependencyEdgeRefs for DiGraph<ProjectNode, ProjectEdge> {
    fn edge_references_dependency(&self) -> Vec<(NodeIndex, NodeIndex)> {
        self.edge_references()
            .filter(|e| e.weight().relationship == RelationshipType::Dependency)
            .map(|e| (e.source(), e.target()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RelationshipGraph {
        let mut g = RelationshipGraph::new();
        g.add_node("a");
        g.add_node("b");
        g.add_node("c");
        g
    }

    #[test]
    fn add_dependency_edges_and_topological_order() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Dependency, 1.0).unwrap();
        g.add_edge("b", "c", RelationshipType::Dependency, 1.0).unwrap();
        let order = g.topological_order().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn cyclic_dependency_is_rejected_with_path() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Dependency, 1.0).unwrap();
        g.add_edge("b", "c", RelationshipType::Dependency, 1.0).unwrap();
        let err = g.add_edge("c", "a", RelationshipType::Dependency, 1.0).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("a -> b -> c -> a"), "{message}");
    }

    #[test]
    fn non_dependency_edges_may_cycle() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Imports, 1.0).unwrap();
        g.add_edge("b", "a", RelationshipType::Imports, 1.0).unwrap();
        assert_eq!(g.stats().1, 2);
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut g = sample();
        let err = g.add_edge("a", "a", RelationshipType::Imports, 1.0).unwrap_err();
        assert!(matches!(err, GraphError::SelfReferential(_)));
    }

    #[test]
    fn shortest_path_follows_bfs() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Imports, 1.0).unwrap();
        g.add_edge("b", "c", RelationshipType::Imports, 1.0).unwrap();
        let path = g.shortest_path("a", "c").unwrap().unwrap();
        assert_eq!(path, vec!["a", "b", "c"]);
    }

    #[test]
    fn reachable_respects_depth_and_is_cached() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Imports, 1.0).unwrap();
        g.add_edge("b", "c", RelationshipType::Imports, 1.0).unwrap();
        let depth1 = g.reachable("a", 1).unwrap();
        assert_eq!(depth1, HashSet::from(["b".to_string()]));
        let depth2 = g.reachable("a", 2).unwrap();
        assert_eq!(depth2, HashSet::from(["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn document_round_trips() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Dependency, 0.5).unwrap();
        let doc = g.to_document();
        let restored = RelationshipGraph::from_document(&doc).unwrap();
        assert_eq!(restored.stats(), g.stats());
        assert_eq!(restored.to_document().nodes, doc.nodes);
    }

    #[test]
    fn remove_node_drops_its_edges() {
        let mut g = sample();
        g.add_edge("a", "b", RelationshipType::Imports, 1.0).unwrap();
        g.remove_node("b");
        assert!(!g.contains("b"));
        assert_eq!(g.stats(), (2, 0));
    }
}
