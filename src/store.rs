// 🗄️ SQLite Store - Nodes, members and the raw payment ledger
//
// One concrete implementation of the `CollectionStore` boundary. All
// hierarchy validation runs before any write; a rejected create leaves
// no partial state. Subtree aggregation walks the tree explicitly, which
// the fixed 8-level chain keeps bounded.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::hierarchy::{validate_create, Node, NodeType};
use crate::metrics::MonthlySeries;
use crate::report::{CollectionStore, SeriesSnapshot, StoreError};

// ============================================================================
// MEMBER & PAYMENT
// ============================================================================

/// A person attached to a Branch node. Payments hang off members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub branch_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Upi,
    Cheque,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Upi => "upi",
            PaymentMode::Cheque => "cheque",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentMode> {
        match s {
            "cash" => Some(PaymentMode::Cash),
            "upi" => Some(PaymentMode::Upi),
            "cheque" => Some(PaymentMode::Cheque),
            _ => None,
        }
    }
}

/// One ledger row. Recording a payment is a trivial insert; it only
/// matters downstream as the source feeding monthly totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub member_id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub mode: PaymentMode,
    pub description: String,
}

/// Node lookup result: the node, its ancestor path (root first), its
/// direct children in canonical order, and the subtree member count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetails {
    pub node: Node,
    pub path: Vec<Node>,
    pub children: Vec<Node>,
    pub total_members: u64,
}

/// Dashboard headline numbers for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub total_collection: f64,
    pub total_members: u64,
    pub collections_today: f64,
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        let store = SqliteStore { conn };
        store.setup()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = SqliteStore { conn };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<(), StoreError> {
        // WAL for crash recovery
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS nodes (
                    id TEXT PRIMARY KEY,
                    node_code TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    node_type TEXT NOT NULL,
                    parent_id TEXT,
                    plain_password TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )
            .map_err(db_err)?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS members (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    phone TEXT NOT NULL,
                    branch_id TEXT NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )
            .map_err(db_err)?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS payments (
                    id TEXT PRIMARY KEY,
                    member_id TEXT NOT NULL,
                    amount REAL NOT NULL,
                    date TEXT NOT NULL,
                    mode TEXT NOT NULL,
                    description TEXT NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )
            .map_err(db_err)?;

        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
            "CREATE INDEX IF NOT EXISTS idx_nodes_code ON nodes(node_code)",
            "CREATE INDEX IF NOT EXISTS idx_members_branch ON members(branch_id)",
            "CREATE INDEX IF NOT EXISTS idx_payments_member ON payments(member_id)",
            "CREATE INDEX IF NOT EXISTS idx_payments_date ON payments(date)",
        ] {
            self.conn.execute(stmt, []).map_err(db_err)?;
        }

        Ok(())
    }

    // ========================================================================
    // NODE OPERATIONS
    // ========================================================================

    /// Create the single Country root. There is no API for any other
    /// parentless node, so the root-has-no-parent invariant holds
    /// structurally.
    pub fn create_root(&self, name: &str) -> Result<Node, StoreError> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM nodes WHERE node_type = ?1",
                params![NodeType::Country.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        if existing.is_some() {
            return Err(StoreError::InvalidInput(
                "a root node already exists".to_string(),
            ));
        }

        let node = Node::new(name, NodeType::Country, None);
        self.insert_node(&node)?;
        Ok(node)
    }

    /// Create a node of an explicitly proposed type under a parent.
    ///
    /// The hierarchy check runs first; a `TypeMismatch` is rejected
    /// before any write.
    pub fn create_node(
        &self,
        parent_id: &str,
        name: &str,
        proposed: NodeType,
    ) -> Result<Node, StoreError> {
        let parent = self.node_by_id(parent_id)?;
        validate_create(parent.node_type, proposed)?;

        let node = Node::new(name, proposed, Some(parent.id));
        self.insert_node(&node)?;
        Ok(node)
    }

    /// Create a child with its type derived from the parent's level.
    pub fn create_child(&self, parent_id: &str, name: &str) -> Result<Node, StoreError> {
        let parent = self.node_by_id(parent_id)?;
        let child_type = parent.node_type.child_type().ok_or_else(|| {
            StoreError::InvalidInput(format!(
                "{} nodes hold members, not child regions",
                parent.node_type
            ))
        })?;
        self.create_node(parent_id, name, child_type)
    }

    pub fn node_by_id(&self, id: &str) -> Result<Node, StoreError> {
        self.conn
            .query_row(
                "SELECT id, node_code, name, node_type, parent_id, plain_password, password_hash
                 FROM nodes WHERE id = ?1",
                params![id],
                row_to_node,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound(format!("node {}", id)))
    }

    /// Resolve a node by its human code, with ancestor path, children in
    /// canonical order and subtree member count.
    pub fn node_by_code(&self, code: &str) -> Result<NodeDetails, StoreError> {
        let node = self
            .conn
            .query_row(
                "SELECT id, node_code, name, node_type, parent_id, plain_password, password_hash
                 FROM nodes WHERE node_code = ?1",
                params![code],
                row_to_node,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound(format!("node code {}", code)))?;

        let path = self.ancestor_path(&node)?;
        let children = self.children_of(&node.id)?;
        let total_members = self.subtree_member_count(&node.id)?;

        Ok(NodeDetails {
            node,
            path,
            children,
            total_members,
        })
    }

    /// Ancestors root-first, ending with the node itself. The walk is
    /// bounded by the 8-level chain.
    fn ancestor_path(&self, node: &Node) -> Result<Vec<Node>, StoreError> {
        let mut path = vec![node.clone()];
        let mut current = node.clone();

        while let Some(parent_id) = current.parent_id.clone() {
            if path.len() > NodeType::ALL.len() {
                break; // corrupt parent chain; never valid data
            }
            match self.node_by_id(&parent_id) {
                Ok(parent) => {
                    path.push(parent.clone());
                    current = parent;
                }
                Err(StoreError::NotFound(_)) => break, // orphaned subtree
                Err(e) => return Err(e),
            }
        }

        path.reverse();
        Ok(path)
    }

    /// Direct children in canonical (insertion) order. Report child lists
    /// must follow this order, not ranking order.
    pub fn children_of(&self, node_id: &str) -> Result<Vec<Node>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, node_code, name, node_type, parent_id, plain_password, password_hash
                 FROM nodes WHERE parent_id = ?1 ORDER BY rowid",
            )
            .map_err(db_err)?;

        let nodes = stmt
            .query_map(params![node_id], row_to_node)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(nodes)
    }

    pub fn rename_node(&self, id: &str, name: &str) -> Result<Node, StoreError> {
        let changed = self
            .conn
            .execute("UPDATE nodes SET name = ?1 WHERE id = ?2", params![name, id])
            .map_err(db_err)?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("node {}", id)));
        }
        self.node_by_id(id)
    }

    /// Delete exactly one node after password re-confirmation.
    ///
    /// No cascade: descendants keep their rows and stay resolvable by
    /// code, they just drop out of the root's listing.
    pub fn delete_node(&self, id: &str, confirm_password: &str) -> Result<(), StoreError> {
        let node = self.node_by_id(id)?;

        if !node.verify_password(confirm_password) {
            return Err(StoreError::AuthFailed(format!(
                "wrong password for node {}",
                node.node_code
            )));
        }

        self.conn
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    fn insert_node(&self, node: &Node) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO nodes (id, node_code, name, node_type, parent_id, plain_password, password_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    node.id,
                    node.node_code,
                    node.name,
                    node.node_type.as_str(),
                    node.parent_id,
                    node.plain_password,
                    node.password_hash,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    // ========================================================================
    // MEMBER & PAYMENT OPERATIONS
    // ========================================================================

    /// Members attach to Branch nodes only.
    pub fn add_member(&self, branch_id: &str, name: &str, phone: &str) -> Result<Member, StoreError> {
        let branch = self.node_by_id(branch_id)?;
        if branch.node_type != NodeType::Branch {
            return Err(StoreError::InvalidInput(format!(
                "members attach to Branch nodes, not {}",
                branch.node_type
            )));
        }

        let member = Member {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            branch_id: branch_id.to_string(),
        };

        self.conn
            .execute(
                "INSERT INTO members (id, name, phone, branch_id) VALUES (?1, ?2, ?3, ?4)",
                params![member.id, member.name, member.phone, member.branch_id],
            )
            .map_err(db_err)?;

        Ok(member)
    }

    pub fn record_payment(
        &self,
        member_id: &str,
        amount: f64,
        date: NaiveDate,
        mode: PaymentMode,
        description: &str,
    ) -> Result<Payment, StoreError> {
        if amount.is_nan() || amount < 0.0 {
            return Err(StoreError::InvalidInput(format!(
                "payment amount must be non-negative, got {}",
                amount
            )));
        }

        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM members WHERE id = ?1",
                params![member_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("member {}", member_id)));
        }

        let payment = Payment {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: member_id.to_string(),
            amount,
            date,
            mode,
            description: description.to_string(),
        };

        self.conn
            .execute(
                "INSERT INTO payments (id, member_id, amount, date, mode, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    payment.id,
                    payment.member_id,
                    payment.amount,
                    payment.date.format("%Y-%m-%d").to_string(),
                    payment.mode.as_str(),
                    payment.description,
                ],
            )
            .map_err(db_err)?;

        Ok(payment)
    }

    pub fn branch_members(&self, branch_id: &str) -> Result<Vec<Member>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, phone, branch_id FROM members
                 WHERE branch_id = ?1 ORDER BY rowid",
            )
            .map_err(db_err)?;

        let members = stmt
            .query_map(params![branch_id], |row| {
                Ok(Member {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    branch_id: row.get(3)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(members)
    }

    // ========================================================================
    // AGGREGATION
    // ========================================================================

    /// Every Branch id in the node's subtree (the node itself if it is
    /// one). Recursion depth is capped by the 8-level chain.
    fn subtree_branch_ids(&self, node_id: &str) -> Result<Vec<String>, StoreError> {
        let node = self.node_by_id(node_id)?;
        if node.node_type.is_leaf() {
            return Ok(vec![node.id]);
        }

        let mut branches = Vec::new();
        for child in self.children_of(&node.id)? {
            branches.extend(self.subtree_branch_ids(&child.id)?);
        }
        Ok(branches)
    }

    fn subtree_member_count(&self, node_id: &str) -> Result<u64, StoreError> {
        let branches = self.subtree_branch_ids(node_id)?;
        if branches.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM members WHERE branch_id IN ({})",
            placeholders(branches.len())
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(branches.iter()), |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as u64)
    }

    /// Per-month payment sums for the subtree, dense and zero-filled.
    fn subtree_monthly(&self, branches: &[String], year: i32) -> Result<MonthlySeries, StoreError> {
        let mut series = MonthlySeries::zeroed();
        if branches.is_empty() {
            return Ok(series);
        }

        let sql = format!(
            "SELECT CAST(strftime('%m', p.date) AS INTEGER), SUM(p.amount)
             FROM payments p JOIN members m ON m.id = p.member_id
             WHERE m.branch_id IN ({}) AND strftime('%Y', p.date) = ?
             GROUP BY 1",
            placeholders(branches.len())
        );

        let mut args: Vec<String> = branches.to_vec();
        args.push(format!("{:04}", year));

        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        for (month, total) in rows {
            if (1..=12).contains(&month) {
                series.0[(month - 1) as usize] = total;
            }
        }
        Ok(series)
    }

    fn subtree_sum_where(
        &self,
        branches: &[String],
        date_clause: &str,
        extra_arg: Option<String>,
    ) -> Result<f64, StoreError> {
        if branches.is_empty() {
            return Ok(0.0);
        }

        let sql = format!(
            "SELECT COALESCE(SUM(p.amount), 0)
             FROM payments p JOIN members m ON m.id = p.member_id
             WHERE m.branch_id IN ({}) {}",
            placeholders(branches.len()),
            date_clause
        );

        let mut args: Vec<String> = branches.to_vec();
        if let Some(arg) = extra_arg {
            args.push(arg);
        }

        self.conn
            .query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))
            .map_err(db_err)
    }

    /// Year total for a node's subtree. Computed from the same ledger as
    /// the monthly series, so the two always agree.
    pub fn year_total(&self, node_id: &str, year: i32) -> Result<f64, StoreError> {
        let branches = self.subtree_branch_ids(node_id)?;
        self.subtree_sum_where(
            &branches,
            "AND strftime('%Y', p.date) = ?",
            Some(format!("{:04}", year)),
        )
    }

    /// All-time total for a node's subtree (dashboard headline figure;
    /// never feeds the per-year report).
    pub fn node_total_collection(&self, node_id: &str) -> Result<f64, StoreError> {
        let branches = self.subtree_branch_ids(node_id)?;
        self.subtree_sum_where(&branches, "", None)
    }

    fn collections_on(&self, branches: &[String], date: NaiveDate) -> Result<f64, StoreError> {
        self.subtree_sum_where(
            branches,
            "AND p.date = ?",
            Some(date.format("%Y-%m-%d").to_string()),
        )
    }

    /// Headline numbers for one node.
    pub fn summary(&self, node_id: &str) -> Result<NodeSummary, StoreError> {
        let branches = self.subtree_branch_ids(node_id)?;
        Ok(NodeSummary {
            total_collection: self.subtree_sum_where(&branches, "", None)?,
            total_members: self.subtree_member_count(node_id)?,
            collections_today: self.collections_on(&branches, Utc::now().date_naive())?,
        })
    }
}

// ============================================================================
// COLLECTION STORE IMPL
// ============================================================================

impl CollectionStore for SqliteStore {
    fn fetch_monthly_series(&self, node_id: &str, year: i32) -> Result<SeriesSnapshot, StoreError> {
        // A missing node is NotFound; a node with no ledger rows for the
        // year is legitimately zero data.
        let branches = self.subtree_branch_ids(node_id)?;

        Ok(SeriesSnapshot {
            monthly: self.subtree_monthly(&branches, year)?,
            total_members: self.subtree_member_count(node_id)?,
            collections_today: self.collections_on(&branches, Utc::now().date_naive())?,
            independent_total: self.subtree_sum_where(
                &branches,
                "AND strftime('%Y', p.date) = ?",
                Some(format!("{:04}", year)),
            )?,
        })
    }

    fn fetch_direct_children(&self, node_id: &str) -> Result<Vec<Node>, StoreError> {
        self.children_of(node_id)
    }

    fn fetch_child_total(&self, node_id: &str, year: i32) -> Result<f64, StoreError> {
        self.year_total(node_id, year)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
    let type_str: String = row.get(3)?;
    let node_type = NodeType::parse(&type_str).ok_or(rusqlite::Error::InvalidQuery)?;

    Ok(Node {
        id: row.get(0)?,
        node_code: row.get(1)?,
        name: row.get(2)?,
        node_type,
        parent_id: row.get(4)?,
        plain_password: row.get(5)?,
        password_hash: row.get(6)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportAssembler;

    /// Root -> ... -> Branch chain, returning every node root-first.
    fn seed_chain(store: &SqliteStore) -> Vec<Node> {
        let mut nodes = vec![store.create_root("Nation").unwrap()];
        for i in 1..8 {
            let parent_id = nodes[i - 1].id.clone();
            let node = store
                .create_child(&parent_id, &format!("Level {}", i))
                .unwrap();
            nodes.push(node);
        }
        nodes
    }

    fn pay(store: &SqliteStore, member: &Member, amount: f64, date: &str) {
        store
            .record_payment(
                &member.id,
                amount,
                NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                PaymentMode::Cash,
                "dues",
            )
            .unwrap();
    }

    #[test]
    fn test_chain_creation_walks_all_levels() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);

        assert_eq!(nodes.len(), 8);
        assert_eq!(nodes[0].node_type, NodeType::Country);
        assert_eq!(nodes[7].node_type, NodeType::Branch);
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.node_type.depth(), i);
        }
    }

    #[test]
    fn test_create_node_rejects_wrong_type_before_write() {
        let store = SqliteStore::open_in_memory().unwrap();
        let root = store.create_root("Nation").unwrap();

        // Skipping a level is a TypeMismatch
        let err = store
            .create_node(&root.id, "Bad", NodeType::Region)
            .unwrap_err();
        assert!(matches!(err, StoreError::Hierarchy(_)));

        // Nothing was written
        assert!(store.children_of(&root.id).unwrap().is_empty());
    }

    #[test]
    fn test_only_one_root() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_root("Nation").unwrap();
        let err = store.create_root("Second Nation").unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_node_by_code_with_ancestor_path() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);
        let branch = &nodes[7];

        let details = store.node_by_code(&branch.node_code).unwrap();

        assert_eq!(details.node.id, branch.id);
        assert_eq!(details.path.len(), 8);
        assert_eq!(details.path[0].node_type, NodeType::Country);
        assert_eq!(details.path[7].id, branch.id);
        assert!(details.children.is_empty());
    }

    #[test]
    fn test_rename_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);

        let renamed = store.rename_node(&nodes[3].id, "Renamed Division").unwrap();
        assert_eq!(renamed.name, "Renamed Division");
        assert_eq!(renamed.id, nodes[3].id);
        assert_eq!(renamed.node_code, nodes[3].node_code);
    }

    #[test]
    fn test_delete_requires_password_and_does_not_cascade() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);
        let zone = &nodes[1];
        let region = &nodes[2];

        let err = store.delete_node(&zone.id, "nope").unwrap_err();
        assert!(matches!(err, StoreError::AuthFailed(_)));

        store
            .delete_node(&zone.id, &zone.plain_password)
            .unwrap();

        // Gone from lookups, but its subtree rows survive
        assert!(matches!(
            store.node_by_id(&zone.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(store.node_by_id(&region.id).is_ok());
    }

    #[test]
    fn test_members_attach_to_branches_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);

        let err = store.add_member(&nodes[4].id, "Asha", "555-0101").unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let member = store.add_member(&nodes[7].id, "Asha", "555-0101").unwrap();
        assert_eq!(store.branch_members(&nodes[7].id).unwrap(), vec![member]);
    }

    #[test]
    fn test_payment_validation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);
        let member = store.add_member(&nodes[7].id, "Ravi", "555-0102").unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let err = store
            .record_payment(&member.id, -5.0, date, PaymentMode::Cash, "")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = store
            .record_payment("missing", 5.0, date, PaymentMode::Upi, "")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_payments_aggregate_into_month_slots_up_the_tree() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);
        let branch = &nodes[7];
        let member = store.add_member(&branch.id, "Ravi", "555-0102").unwrap();

        pay(&store, &member, 100.0, "2025-01-15");
        pay(&store, &member, 50.0, "2025-01-20");
        pay(&store, &member, 75.0, "2025-06-01");
        pay(&store, &member, 999.0, "2024-06-01"); // different year

        // The branch itself
        let snapshot = store.fetch_monthly_series(&branch.id, 2025).unwrap();
        assert_eq!(snapshot.monthly.get(0), 150.0);
        assert_eq!(snapshot.monthly.get(5), 75.0);
        assert_eq!(snapshot.monthly.get(11), 0.0);
        assert_eq!(snapshot.independent_total, 225.0);
        assert_eq!(snapshot.total_members, 1);

        // Same numbers all the way up at the root
        let root_snapshot = store.fetch_monthly_series(&nodes[0].id, 2025).unwrap();
        assert_eq!(root_snapshot.monthly.get(0), 150.0);
        assert_eq!(root_snapshot.independent_total, 225.0);

        // Year scoping
        assert_eq!(store.year_total(&branch.id, 2024).unwrap(), 999.0);
        assert_eq!(store.node_total_collection(&branch.id).unwrap(), 1224.0);
    }

    #[test]
    fn test_collections_today() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);
        let member = store.add_member(&nodes[7].id, "Ravi", "555-0102").unwrap();

        let today = Utc::now().date_naive();
        store
            .record_payment(&member.id, 42.0, today, PaymentMode::Cheque, "")
            .unwrap();
        pay(&store, &member, 100.0, "2020-01-01");

        let summary = store.summary(&nodes[0].id).unwrap();
        assert_eq!(summary.collections_today, 42.0);
        assert_eq!(summary.total_collection, 142.0);
        assert_eq!(summary.total_members, 1);
    }

    #[test]
    fn test_missing_node_is_not_found_not_zero() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.fetch_monthly_series("ghost", 2025).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_end_to_end_report_through_assembler() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nodes = seed_chain(&store);
        let sector = &nodes[6];
        let first_branch = &nodes[7];

        // A second branch under the same sector
        let second_branch = store.create_child(&sector.id, "Second Branch").unwrap();
        let m1 = store.add_member(&first_branch.id, "A", "1").unwrap();
        let m2 = store.add_member(&second_branch.id, "B", "2").unwrap();

        pay(&store, &m1, 100.0, "2025-02-10");
        pay(&store, &m2, 300.0, "2025-02-11");

        let assembler = ReportAssembler::new();
        let report = assembler.assemble(&store, sector, 2025).unwrap();

        assert_eq!(report.total_collection, 400.0);
        assert_eq!(report.total_members, 2);
        assert_eq!(report.monthly_collection.get(1), 400.0);
        // Children listed in creation order, ranked by total
        assert_eq!(report.child_performances[0].name, "Level 7");
        assert_eq!(report.child_performances[1].name, "Second Branch");
        assert_eq!(report.top_performing_children[0].name, "Second Branch");
        assert_eq!(report.worst_performing_children[0].name, "Level 7");
    }
}
