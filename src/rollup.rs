// 🏆 Rollup Aggregator - Ranked child performance lists
//
// Ranking must be stable: the UI renders positional ranks ("#1", "#2"),
// so equal totals keep their original child-listing order.

use serde::{Deserialize, Serialize};

// ============================================================================
// CHILD PERFORMANCE
// ============================================================================

/// One direct child and its own total collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPerformance {
    pub name: String,
    pub total: f64,
}

impl ChildPerformance {
    pub fn new(name: &str, total: f64) -> Self {
        ChildPerformance {
            name: name.to_string(),
            total,
        }
    }
}

// ============================================================================
// ROLLUP
// ============================================================================

/// Aggregated view of a node's direct children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    /// All children, in canonical listing order (never sorted)
    pub child_performances: Vec<ChildPerformance>,

    /// Highest totals first, ties by original order
    pub top_performing: Vec<ChildPerformance>,

    /// Lowest totals first, ties by original order
    pub worst_performing: Vec<ChildPerformance>,

    /// Sum of all child totals
    pub combined_total: f64,
}

impl Rollup {
    /// The rollup for a node with no children (leaf types always get this).
    pub fn empty() -> Self {
        Rollup {
            child_performances: Vec::new(),
            top_performing: Vec::new(),
            worst_performing: Vec::new(),
            combined_total: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.child_performances.is_empty()
    }
}

// ============================================================================
// ROLLUP AGGREGATOR
// ============================================================================

pub struct RollupAggregator {
    /// How many entries the top/worst lists carry (default 5)
    pub rank_depth: usize,
}

impl RollupAggregator {
    pub fn new() -> Self {
        RollupAggregator { rank_depth: 5 }
    }

    pub fn with_rank_depth(rank_depth: usize) -> Self {
        RollupAggregator {
            rank_depth: rank_depth.max(1),
        }
    }

    /// Build the ranked rollup from children in canonical listing order.
    pub fn rollup(&self, children: Vec<ChildPerformance>) -> Rollup {
        if children.is_empty() {
            return Rollup::empty();
        }

        let combined_total = children.iter().map(|c| c.total).sum();

        // sort_by is stable, so equal totals keep first-seen order
        let mut descending = children.clone();
        descending.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));

        let mut ascending = children.clone();
        ascending.sort_by(|a, b| a.total.partial_cmp(&b.total).unwrap_or(std::cmp::Ordering::Equal));

        Rollup {
            top_performing: descending.into_iter().take(self.rank_depth).collect(),
            worst_performing: ascending.into_iter().take(self.rank_depth).collect(),
            child_performances: children,
            combined_total,
        }
    }
}

impl Default for RollupAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
