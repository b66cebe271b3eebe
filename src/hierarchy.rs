// 🌳 Hierarchy Model - The 8-level organizational chain
//
// Every node type has exactly one legal child type (or none, for the leaf).
// The chain is linear and strictly descending, so cycles and level-skipping
// are unrepresentable rather than merely rejected at runtime.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// NODE TYPE
// ============================================================================

/// The 8 ordered levels, outermost to innermost.
///
/// `child_type()` is the single source of truth for what may be created
/// under what: a `Region` can only ever hold `Division`s, a `Branch`
/// holds members and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Country,
    Zone,
    Region,
    Division,
    District,
    City,
    Sector,
    Branch,
}

impl NodeType {
    /// All levels in hierarchy order (index == depth).
    pub const ALL: [NodeType; 8] = [
        NodeType::Country,
        NodeType::Zone,
        NodeType::Region,
        NodeType::Division,
        NodeType::District,
        NodeType::City,
        NodeType::Sector,
        NodeType::Branch,
    ];

    /// The one legal child type, or None for the leaf.
    pub fn child_type(&self) -> Option<NodeType> {
        match self {
            NodeType::Country => Some(NodeType::Zone),
            NodeType::Zone => Some(NodeType::Region),
            NodeType::Region => Some(NodeType::Division),
            NodeType::Division => Some(NodeType::District),
            NodeType::District => Some(NodeType::City),
            NodeType::City => Some(NodeType::Sector),
            NodeType::Sector => Some(NodeType::Branch),
            NodeType::Branch => None,
        }
    }

    /// The one legal parent type, or None for the root.
    pub fn parent_type(&self) -> Option<NodeType> {
        match self {
            NodeType::Country => None,
            NodeType::Zone => Some(NodeType::Country),
            NodeType::Region => Some(NodeType::Zone),
            NodeType::Division => Some(NodeType::Region),
            NodeType::District => Some(NodeType::Division),
            NodeType::City => Some(NodeType::District),
            NodeType::Sector => Some(NodeType::City),
            NodeType::Branch => Some(NodeType::Sector),
        }
    }

    pub fn can_have_children(&self) -> bool {
        self.child_type().is_some()
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeType::Country)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeType::Branch)
    }

    /// Depth in the chain: Country = 0 .. Branch = 7.
    pub fn depth(&self) -> usize {
        match self {
            NodeType::Country => 0,
            NodeType::Zone => 1,
            NodeType::Region => 2,
            NodeType::Division => 3,
            NodeType::District => 4,
            NodeType::City => 5,
            NodeType::Sector => 6,
            NodeType::Branch => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Country => "Country",
            NodeType::Zone => "Zone",
            NodeType::Region => "Region",
            NodeType::Division => "Division",
            NodeType::District => "District",
            NodeType::City => "City",
            NodeType::Sector => "Sector",
            NodeType::Branch => "Branch",
        }
    }

    /// Parse a level label (as produced by `as_str`).
    pub fn parse(s: &str) -> Option<NodeType> {
        NodeType::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// The proposed child type is not what the parent's level produces.
    #[error("a {parent} may not hold a {proposed}; expected {}",
            .expected.map(|t| t.as_str()).unwrap_or("no children at all"))]
    TypeMismatch {
        parent: NodeType,
        proposed: NodeType,
        expected: Option<NodeType>,
    },
}

/// Reject any creation that is not exactly one step down the chain.
///
/// This runs before any write: a failed validation leaves no partial state.
pub fn validate_create(parent: NodeType, proposed: NodeType) -> Result<(), HierarchyError> {
    let expected = parent.child_type();
    if expected == Some(proposed) {
        Ok(())
    } else {
        Err(HierarchyError::TypeMismatch {
            parent,
            proposed,
            expected,
        })
    }
}

// ============================================================================
// NODE ENTITY
// ============================================================================

/// A position in the hierarchy.
///
/// Identity: uuid `id` (never changes). The `node_code` is the short
/// human-facing handle used for lookups and login; `plain_password` is
/// kept alongside its hash because operators hand credentials out on
/// paper when a node is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identity (UUID) - never changes
    pub id: String,

    /// Short human-facing code, unique across the tree
    pub node_code: String,

    pub name: String,

    pub node_type: NodeType,

    /// None only for the Country root
    pub parent_id: Option<String>,

    /// Operational credentials consumed by downstream auth
    pub plain_password: String,
    pub password_hash: String,
}

impl Node {
    /// Create a node with generated id, code and credentials.
    ///
    /// Does NOT validate placement - callers go through `validate_create`
    /// (the store does this before any insert).
    pub fn new(name: &str, node_type: NodeType, parent_id: Option<String>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let node_code = Self::generate_code(node_type, &id);
        let plain_password = Self::generate_password(&id);
        let password_hash = Self::hash_password(&plain_password);

        Node {
            id,
            node_code,
            name: name.to_string(),
            node_type,
            parent_id,
            plain_password,
            password_hash,
        }
    }

    /// Code shape: level prefix + first uuid segment, e.g. "BRA-9f1c24ab".
    /// Three letters keep Division/District prefixes distinct.
    fn generate_code(node_type: NodeType, id: &str) -> String {
        let prefix: String = node_type
            .as_str()
            .chars()
            .take(3)
            .collect::<String>()
            .to_uppercase();
        let segment = id.split('-').next().unwrap_or(id);
        format!("{}-{}", prefix, segment)
    }

    fn generate_password(id: &str) -> String {
        // Last uuid segment is random enough for an initial credential
        let segment = id.rsplit('-').next().unwrap_or(id);
        segment.chars().take(8).collect()
    }

    pub fn hash_password(plain: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plain.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn verify_password(&self, plain: &str) -> bool {
        Self::hash_password(plain) == self.password_hash
    }

    pub fn can_have_children(&self) -> bool {
        self.node_type.can_have_children()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_linear_and_strictly_descending() {
        // Walking child_type from the root visits every level exactly once
        let mut current = NodeType::Country;
        let mut visited = vec![current];

        while let Some(next) = current.child_type() {
            assert_eq!(next.depth(), current.depth() + 1);
            visited.push(next);
            current = next;
        }

        assert_eq!(visited, NodeType::ALL.to_vec());
        assert_eq!(current, NodeType::Branch);
        assert!(!current.can_have_children());
    }

    #[test]
    fn test_parent_type_is_inverse_of_child_type() {
        for t in NodeType::ALL {
            if let Some(child) = t.child_type() {
                assert_eq!(child.parent_type(), Some(t));
            }
        }
        assert_eq!(NodeType::Country.parent_type(), None);
    }

    #[test]
    fn test_validate_create_all_64_combinations() {
        // Only the 7 one-step-down pairs are legal
        let mut accepted = 0;

        for parent in NodeType::ALL {
            for proposed in NodeType::ALL {
                let result = validate_create(parent, proposed);
                if parent.child_type() == Some(proposed) {
                    assert!(result.is_ok(), "{} -> {} should be legal", parent, proposed);
                    accepted += 1;
                } else {
                    assert!(
                        matches!(result, Err(HierarchyError::TypeMismatch { .. })),
                        "{} -> {} should be rejected",
                        parent,
                        proposed
                    );
                }
            }
        }

        assert_eq!(accepted, 7);
    }

    #[test]
    fn test_leaf_parent_rejects_everything() {
        for proposed in NodeType::ALL {
            let err = validate_create(NodeType::Branch, proposed).unwrap_err();
            let HierarchyError::TypeMismatch { expected, .. } = err;
            assert_eq!(expected, None);
        }
    }

    #[test]
    fn test_type_labels_round_trip() {
        for t in NodeType::ALL {
            assert_eq!(NodeType::parse(t.as_str()), Some(t));
        }
        assert_eq!(NodeType::parse("Galaxy"), None);
    }

    #[test]
    fn test_node_creation_and_credentials() {
        let node = Node::new("North Zone", NodeType::Zone, Some("parent-id".to_string()));

        assert_eq!(node.node_type, NodeType::Zone);
        assert!(node.node_code.starts_with("ZON-"));
        assert_eq!(node.plain_password.len(), 8);
        assert!(node.verify_password(&node.plain_password));
        assert!(!node.verify_password("wrong"));
    }

    #[test]
    fn test_node_codes_differ_across_nodes() {
        let a = Node::new("A", NodeType::Branch, Some("p".to_string()));
        let b = Node::new("B", NodeType::Branch, Some("p".to_string()));
        assert_ne!(a.node_code, b.node_code);
        assert_ne!(a.id, b.id);
    }
}
