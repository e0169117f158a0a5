//! Simple-path enumeration over the token graph.

use std::fmt;

use itertools::Itertools;
use petgraph::prelude::NodeIndex;
use serde::Serialize;
use tracing::debug;

use crate::engine::graph::TokenGraph;

/// An ordered, cycle-free sequence of token symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path {
    pub tokens: Vec<String>,
}

impl Path {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn hop_count(&self) -> usize {
        self.tokens.len().saturating_sub(1)
    }

    /// Directed `(token_in, token_out)` pairs along the path.
    pub fn hops(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tokens.iter().map(String::as_str).tuple_windows()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" -> "))
    }
}

/// Main pathfinding struct, operates on TokenGraph.
pub struct Pathfinder<'a> {
    pub graph: &'a TokenGraph,
}

/// Per-call search state; never shared between searches.
struct Dfs {
    target: NodeIndex,
    max_tokens: usize,
    visited: Vec<bool>,
    current: Vec<NodeIndex>,
    found: Vec<Vec<NodeIndex>>,
}

impl<'a> Pathfinder<'a> {
    pub fn new(graph: &'a TokenGraph) -> Self {
        Self { graph }
    }

    /// Enumerate all simple paths from `source` to `destination`.
    ///
    /// With `allow_multihop == false` only direct (2-token) paths are returned, otherwise
    /// paths of at most `max_hops + 1` tokens, so `max_hops == 0` finds nothing. Results are
    /// sorted by ascending length, discovery order preserved within a length. An empty
    /// result means no route exists.
    pub fn enumerate_paths(
        &self,
        source: &str,
        destination: &str,
        allow_multihop: bool,
        max_hops: usize,
    ) -> Vec<Path> {
        let (source_idx, target_idx) = match (
            self.graph.get_node_index(source),
            self.graph.get_node_index(destination),
        ) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                debug!(source, destination, "Source or destination token not found in graph");
                return vec![];
            }
        };
        if source_idx == target_idx {
            return vec![];
        }

        let max_tokens = if allow_multihop { max_hops.saturating_add(1) } else { 2 };
        let mut dfs = Dfs {
            target: target_idx,
            max_tokens,
            visited: vec![false; self.graph.get_node_count()],
            current: Vec::with_capacity(max_tokens),
            found: Vec::new(),
        };
        self.visit(source_idx, &mut dfs);

        let mut paths: Vec<Path> = dfs
            .found
            .into_iter()
            .map(|nodes| {
                Path::new(
                    nodes
                        .into_iter()
                        .filter_map(|idx| self.graph.symbol(idx).map(str::to_string))
                        .collect(),
                )
            })
            .collect();
        // stable: equal-length paths keep discovery order
        paths.sort_by_key(Path::len);

        debug!(source, destination, max_tokens, num_paths_found = paths.len(), "Finished DFS path search");
        paths
    }

    fn visit(&self, node: NodeIndex, dfs: &mut Dfs) {
        dfs.current.push(node);
        dfs.visited[node.index()] = true;

        if node == dfs.target {
            // The destination stays a leaf: every extension would revisit it.
            dfs.found.push(dfs.current.clone());
        } else if dfs.current.len() < dfs.max_tokens {
            for next in self.graph.neighbors(node) {
                if !dfs.visited[next.index()] {
                    self.visit(next, dfs);
                }
            }
        }

        dfs.visited[node.index()] = false;
        dfs.current.pop();
    }
}
