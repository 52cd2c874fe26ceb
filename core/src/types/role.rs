use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The tier a node serves in the deployed store.
///
/// Ordering follows deployment order: the transaction node first, since it is
/// the seed every other node's config points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    #[serde(rename = "txn", alias = "transaction")]
    Transaction,
    Memory,
    Log,
}

impl NodeRole {
    pub const ALL: [NodeRole; 3] = [NodeRole::Transaction, NodeRole::Memory, NodeRole::Log];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Transaction => "txn",
            NodeRole::Memory => "memory",
            NodeRole::Log => "log",
        }
    }

    /// Whether this role's node is the cluster seed.
    pub fn is_seed(self) -> bool {
        self == NodeRole::Transaction
    }

    /// Top-level key of the role's server block in the rendered config.
    pub fn server_key(self) -> &'static str {
        if self.is_seed() {
            "txn-server"
        } else {
            "server"
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txn" | "transaction" => Ok(NodeRole::Transaction),
            "memory" | "mem" => Ok(NodeRole::Memory),
            "log" => Ok(NodeRole::Log),
            other => Err(format!(
                "unknown role '{}' (expected txn, memory or log)",
                other
            )),
        }
    }
}
