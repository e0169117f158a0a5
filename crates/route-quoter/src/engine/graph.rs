//! Token/pool graph model built from a registry snapshot.

use indexmap::IndexMap;
use petgraph::graph::UnGraph;
use petgraph::prelude::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::registry::{Pool, PoolKey, PoolRegistry, Token};

/// Represents a token node in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenNode {
    pub symbol: String,
    pub decimals: u32,
}

/// Represents a pool edge in the graph.
#[derive(Debug, Clone)]
pub struct PoolEdge {
    pub key: PoolKey,
    pub address: String,
}

/// Immutable token graph: one node per token, one undirected edge per pool.
///
/// Built once from a [`PoolRegistry`] and shared read-only by every quote computation.
#[derive(Debug, Clone)]
pub struct TokenGraph {
    pub graph: UnGraph<TokenNode, PoolEdge>,
    pub token_indices: IndexMap<String, NodeIndex>,
    registry: PoolRegistry,
}

impl TokenGraph {
    pub fn new(registry: PoolRegistry) -> Self {
        let mut graph = UnGraph::with_capacity(registry.tokens.len(), registry.pools.len());
        let mut token_indices = IndexMap::with_capacity(registry.tokens.len());

        for token in registry.tokens.values() {
            let idx = graph.add_node(TokenNode {
                symbol: token.symbol.clone(),
                decimals: token.decimals,
            });
            token_indices.insert(token.symbol.clone(), idx);
        }

        for pool in registry.pools.values() {
            let (a, b) = match (token_indices.get(&pool.token1), token_indices.get(&pool.token2)) {
                (Some(&a), Some(&b)) => (a, b),
                _ => continue,
            };
            graph.update_edge(a, b, PoolEdge { key: pool.key.clone(), address: pool.address.clone() });
        }

        debug!(tokens = graph.node_count(), pools = graph.edge_count(), "Built token graph");
        Self { graph, token_indices, registry }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn token(&self, symbol: &str) -> Option<&Token> {
        self.registry.token(symbol)
    }

    /// Order-independent pool lookup: `pool(a, b) == pool(b, a)`.
    pub fn pool(&self, a: &str, b: &str) -> Option<&Pool> {
        self.registry.pool(a, b)
    }

    pub fn contains_token(&self, symbol: &str) -> bool {
        self.token_indices.contains_key(symbol)
    }

    /// Get a node index by its token symbol
    pub fn get_node_index(&self, symbol: &str) -> Option<NodeIndex> {
        self.token_indices.get(symbol).copied()
    }

    pub fn symbol(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(|n| n.symbol.as_str())
    }

    /// Neighbours of `idx` in registry order: edges were added pool by pool, so sorting
    /// by edge index follows the order pools appear in the feed.
    pub fn neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges(idx)
            .map(|e| (e.id(), if e.source() == idx { e.target() } else { e.source() }))
            .collect();
        edges.sort_unstable_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, next)| next).collect()
    }

    pub fn get_edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get_node_count(&self) -> usize {
        self.graph.node_count()
    }
}
