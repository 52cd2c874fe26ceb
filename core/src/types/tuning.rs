//! Deployment-wide constants written into every node's config.
//!
//! None of these come from instance metadata. Field names serialize to the
//! exact keys the Anna config loader expects (`selective-rep`, `txn-cap`, ...),
//! so the same structs feed both the deploy config file and the rendered
//! documents.

use serde::{Deserialize, Serialize};

use super::role::NodeRole;

/// Static tuning parameters shared by all roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParams {
    pub policy: Policy,
    /// Local storage root for the EBS tier.
    pub ebs: String,
    pub capacities: Capacities,
    pub threads: Threads,
    pub replication: Replication,
    /// Hostnames of benchmark clients.
    pub benchmark: Vec<String>,
}

impl Default for TuningParams {
    fn default() -> Self {
        TuningParams {
            policy: Policy::default(),
            ebs: "./".into(),
            capacities: Capacities::default(),
            threads: Threads::default(),
            replication: Replication::default(),
            benchmark: vec!["localhost".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Policy {
    pub elasticity: bool,
    pub selective_rep: bool,
    pub tiering: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            elasticity: false,
            selective_rep: false,
            tiering: true,
        }
    }
}

/// Per-tier storage capacities, in GB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Capacities {
    pub txn_cap: u32,
    pub memory_cap: u32,
    pub ebs_cap: u32,
    pub log_cap: u32,
}

impl Default for Capacities {
    fn default() -> Self {
        Capacities {
            txn_cap: 1,
            memory_cap: 1,
            ebs_cap: 0,
            log_cap: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Threads {
    pub txn: u32,
    pub memory: u32,
    pub ebs: u32,
    pub log: u32,
    pub routing: u32,
    pub benchmark: u32,
}

impl Threads {
    /// Worker thread count of the tier a role runs.
    pub fn for_role(&self, role: NodeRole) -> u32 {
        match role {
            NodeRole::Transaction => self.txn,
            NodeRole::Memory => self.memory,
            NodeRole::Log => self.log,
        }
    }
}

impl Default for Threads {
    fn default() -> Self {
        Threads {
            txn: 1,
            memory: 6,
            ebs: 1,
            log: 6,
            routing: 1,
            benchmark: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Replication {
    pub txn: u32,
    pub memory: u32,
    pub ebs: u32,
    pub log: u32,
    pub minimum: u32,
    pub local: u32,
}

impl Default for Replication {
    fn default() -> Self {
        Replication {
            txn: 1,
            memory: 1,
            ebs: 0,
            log: 1,
            minimum: 1,
            local: 1,
        }
    }
}
