// 📋 Report Assembler - One immutable collection report per (node, year)
//
// The assembler owns no state and performs no I/O itself: it asks the
// store for a series snapshot and child totals, runs the pure engines,
// and returns a fresh document. Same inputs, byte-identical output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hierarchy::{HierarchyError, Node, NodeType};
use crate::metrics::{MetricsEngine, MonthlySeries, SeriesStats};
use crate::rollup::{ChildPerformance, Rollup, RollupAggregator};

// ============================================================================
// STORE BOUNDARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The node (or year) has no record at all. Series fetches map this
    /// to zero data; node lookups surface it.
    #[error("not found: {0}")]
    NotFound(String),

    /// Delete confirmation failed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A write carried data the store cannot accept (bad amount, wrong
    /// branch kind, malformed date).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store could not be asked. Retryable, and must never be
    /// conflated with legitimately empty data.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Node placement violated the hierarchy chain.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// What the store supplies for one (node, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub monthly: MonthlySeries,
    pub total_members: u64,
    pub collections_today: f64,
    /// Authoritative year total, supplied alongside the series
    pub independent_total: f64,
}

impl SeriesSnapshot {
    /// The snapshot for a (node, year) with no ledger rows.
    pub fn zeroed() -> Self {
        SeriesSnapshot {
            monthly: MonthlySeries::zeroed(),
            total_members: 0,
            collections_today: 0.0,
            independent_total: 0.0,
        }
    }
}

/// Collaborator boundary consumed by the assembler. Transport is the
/// implementor's business; the SQLite store in this crate is one of them.
pub trait CollectionStore {
    fn fetch_monthly_series(&self, node_id: &str, year: i32) -> Result<SeriesSnapshot, StoreError>;

    fn fetch_direct_children(&self, node_id: &str) -> Result<Vec<Node>, StoreError>;

    /// The child's own year total (recursively aggregated over its subtree).
    fn fetch_child_total(&self, node_id: &str, year: i32) -> Result<f64, StoreError>;
}

// ============================================================================
// COLLECTION REPORT
// ============================================================================

/// Read-only aggregate for one (node, year). Serializes to the camelCase
/// wire document the dashboard consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub node_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub year: i32,
    pub total_collection: f64,
    pub average_collection_per_user: f64,
    pub total_members: u64,
    pub collections_today: f64,
    pub monthly_collection: MonthlySeries,
    pub child_performances: Vec<ChildPerformance>,
    pub top_performing_children: Vec<ChildPerformance>,
    pub worst_performing_children: Vec<ChildPerformance>,
}

impl CollectionReport {
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) {}: total {:.2} across {} members, {} children",
            self.name,
            self.node_type,
            self.year,
            self.total_collection,
            self.total_members,
            self.child_performances.len()
        )
    }
}

// ============================================================================
// REPORT ASSEMBLER
// ============================================================================

pub struct ReportAssembler {
    metrics: MetricsEngine,
    rollup: RollupAggregator,
}

impl ReportAssembler {
    pub fn new() -> Self {
        ReportAssembler {
            metrics: MetricsEngine::new(),
            rollup: RollupAggregator::new(),
        }
    }

    pub fn with_rank_depth(rank_depth: usize) -> Self {
        ReportAssembler {
            metrics: MetricsEngine::new(),
            rollup: RollupAggregator::with_rank_depth(rank_depth),
        }
    }

    /// Assemble the report for one (node, year).
    ///
    /// A `NotFound` series becomes all-zero data (statistics stay
    /// defined); `Unavailable` propagates untouched so callers can retry.
    pub fn assemble(
        &self,
        store: &dyn CollectionStore,
        node: &Node,
        year: i32,
    ) -> Result<CollectionReport, StoreError> {
        let snapshot = match store.fetch_monthly_series(&node.id, year) {
            Ok(snapshot) => snapshot,
            Err(StoreError::NotFound(_)) => SeriesSnapshot::zeroed(),
            Err(e) => return Err(e),
        };

        // Leaf types never have children by construction; skip the store
        // entirely so a misbehaving upstream cannot smuggle any in.
        let rollup = if node.node_type.can_have_children() {
            self.child_rollup(store, &node.id, year)?
        } else {
            Rollup::empty()
        };

        let average_collection_per_user = if snapshot.total_members > 0 {
            snapshot.independent_total / snapshot.total_members as f64
        } else {
            0.0
        };

        Ok(CollectionReport {
            node_id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type,
            year,
            total_collection: snapshot.independent_total,
            average_collection_per_user,
            total_members: snapshot.total_members,
            collections_today: snapshot.collections_today,
            monthly_collection: snapshot.monthly,
            child_performances: rollup.child_performances,
            top_performing_children: rollup.top_performing,
            worst_performing_children: rollup.worst_performing,
        })
    }

    /// Fetch children in canonical order and total each one.
    fn child_rollup(
        &self,
        store: &dyn CollectionStore,
        node_id: &str,
        year: i32,
    ) -> Result<Rollup, StoreError> {
        let children = store.fetch_direct_children(node_id)?;

        let mut performances = Vec::with_capacity(children.len());
        for child in &children {
            let total = match store.fetch_child_total(&child.id, year) {
                Ok(total) => total,
                Err(StoreError::NotFound(_)) => 0.0,
                Err(e) => return Err(e),
            };
            performances.push(ChildPerformance {
                name: child.name.clone(),
                total,
            });
        }

        Ok(self.rollup.rollup(performances))
    }

    /// Derived statistics for an already-assembled report. Consumers
    /// recompute these identically from the monthly series; nothing is
    /// persisted.
    pub fn stats(&self, report: &CollectionReport) -> SeriesStats {
        self.metrics
            .analyze(&report.monthly_collection, report.total_collection)
    }
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory store fixture. `fail_series` simulates an outage.
    struct FakeStore {
        snapshots: HashMap<(String, i32), SeriesSnapshot>,
        children: HashMap<String, Vec<Node>>,
        totals: HashMap<(String, i32), f64>,
        fail_series: bool,
    }

    impl FakeStore {
        fn new() -> Self {
            FakeStore {
                snapshots: HashMap::new(),
                children: HashMap::new(),
                totals: HashMap::new(),
                fail_series: false,
            }
        }
    }

    impl CollectionStore for FakeStore {
        fn fetch_monthly_series(
            &self,
            node_id: &str,
            year: i32,
        ) -> Result<SeriesSnapshot, StoreError> {
            if self.fail_series {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.snapshots
                .get(&(node_id.to_string(), year))
                .cloned()
                .ok_or_else(|| StoreError::NotFound(node_id.to_string()))
        }

        fn fetch_direct_children(&self, node_id: &str) -> Result<Vec<Node>, StoreError> {
            Ok(self.children.get(node_id).cloned().unwrap_or_default())
        }

        fn fetch_child_total(&self, node_id: &str, year: i32) -> Result<f64, StoreError> {
            self.totals
                .get(&(node_id.to_string(), year))
                .copied()
                .ok_or_else(|| StoreError::NotFound(node_id.to_string()))
        }
    }

    fn district_node() -> Node {
        Node::new("Central District", NodeType::District, Some("parent".to_string()))
    }

    #[test]
    fn test_assemble_full_report() {
        let node = district_node();
        let mut store = FakeStore::new();

        let mut slots = [0.0; 12];
        slots[0] = 400.0;
        slots[1] = 600.0;
        store.snapshots.insert(
            (node.id.clone(), 2025),
            SeriesSnapshot {
                monthly: MonthlySeries(slots),
                total_members: 10,
                collections_today: 50.0,
                independent_total: 1000.0,
            },
        );

        let city_a = Node::new("City A", NodeType::City, Some(node.id.clone()));
        let city_b = Node::new("City B", NodeType::City, Some(node.id.clone()));
        store.totals.insert((city_a.id.clone(), 2025), 700.0);
        store.totals.insert((city_b.id.clone(), 2025), 300.0);
        store
            .children
            .insert(node.id.clone(), vec![city_a.clone(), city_b.clone()]);

        let assembler = ReportAssembler::new();
        let report = assembler.assemble(&store, &node, 2025).unwrap();

        assert_eq!(report.total_collection, 1000.0);
        assert_eq!(report.average_collection_per_user, 100.0);
        assert_eq!(report.collections_today, 50.0);
        assert_eq!(report.child_performances.len(), 2);
        // Listing order preserved, ranking by total
        assert_eq!(report.child_performances[0].name, "City A");
        assert_eq!(report.top_performing_children[0].name, "City A");
        assert_eq!(report.worst_performing_children[0].name, "City B");

        let stats = assembler.stats(&report);
        assert_eq!(stats.cumulative[11], 1000.0);
        assert!(stats.sum_matches_total);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let node = district_node();
        let mut store = FakeStore::new();
        store.snapshots.insert(
            (node.id.clone(), 2025),
            SeriesSnapshot {
                monthly: MonthlySeries::from_partial(&[10.0, 20.0]),
                total_members: 2,
                collections_today: 0.0,
                independent_total: 30.0,
            },
        );

        let assembler = ReportAssembler::new();
        let first = assembler.assemble(&store, &node, 2025).unwrap();
        let second = assembler.assemble(&store, &node, 2025).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_series_becomes_zero_data() {
        let node = district_node();
        let store = FakeStore::new();

        let assembler = ReportAssembler::new();
        let report = assembler.assemble(&store, &node, 1999).unwrap();

        assert_eq!(report.total_collection, 0.0);
        assert_eq!(report.average_collection_per_user, 0.0);
        assert_eq!(report.monthly_collection, MonthlySeries::zeroed());

        // Statistics stay defined over the zero-filled data
        let stats = assembler.stats(&report);
        assert_eq!(stats.mom_percent, 0.0);
        assert_eq!(stats.run_rate, 0.0);
    }

    #[test]
    fn test_unavailable_store_propagates() {
        let node = district_node();
        let mut store = FakeStore::new();
        store.fail_series = true;

        let assembler = ReportAssembler::new();
        let err = assembler.assemble(&store, &node, 2025).unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_leaf_node_ignores_erroneous_children() {
        let branch = Node::new("Riverside Branch", NodeType::Branch, Some("sector".to_string()));
        let mut store = FakeStore::new();

        // A buggy upstream claims the leaf has children
        let bogus = Node::new("Bogus", NodeType::Branch, Some(branch.id.clone()));
        store.children.insert(branch.id.clone(), vec![bogus]);

        let assembler = ReportAssembler::new();
        let report = assembler.assemble(&store, &branch, 2025).unwrap();

        assert!(report.child_performances.is_empty());
        assert!(report.top_performing_children.is_empty());
        assert!(report.worst_performing_children.is_empty());
    }

    #[test]
    fn test_child_without_ledger_counts_as_zero() {
        let node = district_node();
        let mut store = FakeStore::new();
        let city = Node::new("Quiet City", NodeType::City, Some(node.id.clone()));
        store.children.insert(node.id.clone(), vec![city]);
        // No total recorded for the city

        let assembler = ReportAssembler::new();
        let report = assembler.assemble(&store, &node, 2025).unwrap();

        assert_eq!(report.child_performances[0].total, 0.0);
    }

    #[test]
    fn test_report_serializes_to_wire_shape() {
        let node = district_node();
        let store = FakeStore::new();
        let assembler = ReportAssembler::new();
        let report = assembler.assemble(&store, &node, 2025).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("nodeId").is_some());
        assert!(json.get("totalCollection").is_some());
        assert!(json.get("monthlyCollection").is_some());
        assert!(json.get("topPerformingChildren").is_some());
        assert_eq!(json.get("type").unwrap(), "District");
        assert_eq!(
            json.get("monthlyCollection").unwrap().as_array().unwrap().len(),
            12
        );
    }
}
