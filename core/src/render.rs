//! Per-role config rendering.
//!
//! Rendering happens in two steps: [`ConfigDocument::assemble`] resolves
//! every field into a plain record, then [`render`] serializes that record
//! with `serde_yaml`. Field order in the output follows the struct order.

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::types::{Capacities, InstanceRecord, NodeRole, Policy, Replication, Threads, TuningParams};

/// Placeholder the Anna loader reads as "no management node".
pub const NULL_MGMT_IP: &str = "NULL";


// ---------------------------------------------------------------------------
// Document sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub mgmt_ip: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSection {
    pub monitoring: Vec<String>,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSection {
    pub monitoring: Vec<String>,
    pub routing: Vec<String>,
    pub ip: String,
}

/// The configured node's own block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBlock {
    pub monitoring: Vec<String>,
    pub routing: Vec<String>,
    pub seed_ip: String,
    pub public_ip: String,
    pub private_ip: String,
    pub mgmt_ip: String,
}

/// Fully resolved config for one node.
///
/// Exactly one of `txn_server` / `server` is set, depending on the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub monitoring: MonitoringSection,
    pub routing: RoutingSection,
    pub user: UserSection,
    #[serde(rename = "txn-server", default, skip_serializing_if = "Option::is_none")]
    pub txn_server: Option<ServerBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerBlock>,
    pub policy: Policy,
    pub ebs: String,
    pub capacities: Capacities,
    pub threads: Threads,
    pub replication: Replication,
    pub benchmark: Vec<String>,
}

impl ConfigDocument {
    /// Build the document for `role`. `seed` is always the transaction node;
    /// `target` is the node being configured (the seed itself for the
    /// transaction role).
    pub fn assemble(
        role: NodeRole,
        seed: &InstanceRecord,
        target: &InstanceRecord,
        tuning: &TuningParams,
    ) -> Result<Self> {
        check_address(seed, "public address", &seed.public_address)?;
        check_address(seed, "private address", &seed.private_address)?;
        check_address(target, "public address", &target.public_address)?;
        check_address(target, "private address", &target.private_address)?;

        let seed_public = seed.public_address.clone();
        let seed_private = seed.private_address.clone();

        let block = ServerBlock {
            monitoring: vec![seed_private.clone()],
            routing: vec![seed_private.clone()],
            seed_ip: seed_private,
            public_ip: target.public_address.clone(),
            private_ip: target.private_address.clone(),
            mgmt_ip: NULL_MGMT_IP.to_string(),
        };
        let (txn_server, server) = if role.is_seed() {
            (Some(block), None)
        } else {
            (None, Some(block))
        };

        Ok(ConfigDocument {
            monitoring: MonitoringSection {
                mgmt_ip: seed_public.clone(),
                ip: seed_public.clone(),
            },
            routing: RoutingSection {
                monitoring: vec![seed_public.clone()],
                ip: seed_public.clone(),
            },
            user: UserSection {
                monitoring: vec![seed_public.clone()],
                routing: vec![seed_public.clone()],
                ip: seed_public,
            },
            txn_server,
            server,
            policy: tuning.policy.clone(),
            ebs: tuning.ebs.clone(),
            capacities: tuning.capacities.clone(),
            threads: tuning.threads.clone(),
            replication: tuning.replication.clone(),
            benchmark: tuning.benchmark.clone(),
        })
    }
}


// ---------------------------------------------------------------------------
// RenderedConfig
// ---------------------------------------------------------------------------

/// YAML text ready to be pushed to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub role: NodeRole,
    pub text: String,
}

impl RenderedConfig {
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Render `role`'s config document.
pub fn render(
    role: NodeRole,
    seed: &InstanceRecord,
    target: &InstanceRecord,
    tuning: &TuningParams,
) -> Result<RenderedConfig> {
    let document = ConfigDocument::assemble(role, seed, target, tuning)?;
    let text = serde_yaml::to_string(&document).map_err(|e| DeployError::Render(e.to_string()))?;
    tracing::debug!(%role, bytes = text.len(), "rendered config");
    Ok(RenderedConfig { role, text })
}

/// Addresses are interpolated unescaped, so only IPv4/IPv6 literals and
/// hostnames pass.
fn check_address(record: &InstanceRecord, field: &'static str, value: &str) -> Result<()> {
    let well_formed = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_'));
    if well_formed {
        Ok(())
    } else {
        Err(DeployError::InvalidAddress {
            instance_id: record.identifier.clone(),
            field,
            value: value.to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn tx() -> InstanceRecord {
        InstanceRecord::new("i-tx", "1.2.3.4", "10.0.0.1")
    }

    fn mem() -> InstanceRecord {
        InstanceRecord::new("i-mem", "5.6.7.8", "10.0.0.2")
    }

    fn log() -> InstanceRecord {
        InstanceRecord::new("i-log", "9.10.11.12", "10.0.0.3")
    }

    fn render_for(role: NodeRole) -> Value {
        let target = match role {
            NodeRole::Transaction => tx(),
            NodeRole::Memory => mem(),
            NodeRole::Log => log(),
        };
        let rendered = render(role, &tx(), &target, &TuningParams::default()).unwrap();
        serde_yaml::from_str(&rendered.text).unwrap()
    }

    fn s(v: &Value) -> &str {
        v.as_str().unwrap()
    }

    #[test]
    fn memory_document_scenario() {
        let doc = render_for(NodeRole::Memory);
        assert_eq!(s(&doc["monitoring"]["ip"]), "1.2.3.4");
        assert_eq!(s(&doc["server"]["public_ip"]), "5.6.7.8");
        assert_eq!(s(&doc["server"]["private_ip"]), "10.0.0.2");
        assert_eq!(s(&doc["server"]["seed_ip"]), "10.0.0.1");
        assert!(doc.get("server").is_some());
        assert!(doc.get("txn-server").is_none());
    }

    #[test]
    fn seed_fields_always_point_at_transaction_node() {
        for role in NodeRole::ALL {
            let doc = render_for(role);
            assert_eq!(s(&doc["monitoring"]["mgmt_ip"]), "1.2.3.4", "{}", role);
            assert_eq!(s(&doc["monitoring"]["ip"]), "1.2.3.4", "{}", role);
            assert_eq!(s(&doc["routing"]["ip"]), "1.2.3.4", "{}", role);
            assert_eq!(s(&doc["routing"]["monitoring"][0]), "1.2.3.4", "{}", role);
            assert_eq!(s(&doc["user"]["ip"]), "1.2.3.4", "{}", role);
            assert_eq!(s(&doc["user"]["monitoring"][0]), "1.2.3.4", "{}", role);
            assert_eq!(s(&doc["user"]["routing"][0]), "1.2.3.4", "{}", role);
            let block = &doc[role.server_key()];
            assert_eq!(s(&block["monitoring"][0]), "10.0.0.1", "{}", role);
            assert_eq!(s(&block["routing"][0]), "10.0.0.1", "{}", role);
        }
    }

    #[test]
    fn server_key_depends_on_role() {
        let doc = render_for(NodeRole::Transaction);
        assert!(doc.get("txn-server").is_some());
        assert!(doc.get("server").is_none());
        assert_eq!(s(&doc["txn-server"]["public_ip"]), "1.2.3.4");

        let doc = render_for(NodeRole::Log);
        assert!(doc.get("server").is_some());
        assert!(doc.get("txn-server").is_none());
        assert_eq!(s(&doc["server"]["private_ip"]), "10.0.0.3");
    }

    #[test]
    fn static_sections_carry_tuning() {
        let doc = render_for(NodeRole::Log);
        assert_eq!(s(&doc["server"]["mgmt_ip"]), "NULL");
        assert_eq!(doc["policy"]["elasticity"].as_bool(), Some(false));
        assert_eq!(doc["policy"]["selective-rep"].as_bool(), Some(false));
        assert_eq!(doc["policy"]["tiering"].as_bool(), Some(true));
        assert_eq!(s(&doc["ebs"]), "./");
        assert_eq!(doc["capacities"]["txn-cap"].as_u64(), Some(1));
        assert_eq!(doc["capacities"]["ebs-cap"].as_u64(), Some(0));
        assert_eq!(doc["threads"]["memory"].as_u64(), Some(6));
        assert_eq!(doc["threads"]["benchmark"].as_u64(), Some(6));
        assert_eq!(doc["replication"]["minimum"].as_u64(), Some(1));
        assert_eq!(s(&doc["benchmark"][0]), "localhost");
    }

    #[test]
    fn top_level_key_order() {
        let rendered = render(NodeRole::Memory, &tx(), &mem(), &TuningParams::default()).unwrap();
        let keys: Vec<&str> = rendered
            .text
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.starts_with('-') && l.contains(':'))
            .map(|l| l.split(':').next().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec![
                "monitoring",
                "routing",
                "user",
                "server",
                "policy",
                "ebs",
                "capacities",
                "threads",
                "replication",
                "benchmark"
            ]
        );
    }

    #[test]
    fn render_is_deterministic() {
        let tuning = TuningParams::default();
        let a = render(NodeRole::Memory, &tx(), &mem(), &tuning).unwrap();
        let b = render(NodeRole::Memory, &tx(), &mem(), &tuning).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn document_parses_back() {
        let rendered = render(NodeRole::Transaction, &tx(), &tx(), &TuningParams::default()).unwrap();
        let doc: ConfigDocument = serde_yaml::from_str(&rendered.text).unwrap();
        assert_eq!(doc.server, None);
        assert_eq!(doc.txn_server.unwrap().seed_ip, "10.0.0.1");
        assert_eq!(doc.threads, Threads::default());
    }

    #[test]
    fn custom_thread_counts_flow_through() {
        let mut tuning = TuningParams::default();
        tuning.threads.memory = 12;
        let rendered = render(NodeRole::Memory, &tx(), &mem(), &tuning).unwrap();
        let doc: Value = serde_yaml::from_str(&rendered.text).unwrap();
        assert_eq!(doc["threads"]["memory"].as_u64(), Some(12));
    }

    #[test]
    fn empty_target_address_rejected() {
        let target = InstanceRecord::new("i-mem", "", "10.0.0.2");
        let err = render(NodeRole::Memory, &tx(), &target, &TuningParams::default()).unwrap_err();
        assert_eq!(
            err,
            DeployError::InvalidAddress {
                instance_id: "i-mem".into(),
                field: "public address",
                value: String::new(),
            }
        );
    }

    #[test]
    fn empty_seed_address_rejected() {
        let seed = InstanceRecord::new("i-tx", "1.2.3.4", "");
        let err = render(NodeRole::Log, &seed, &log(), &TuningParams::default()).unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");
    }

    #[test]
    fn malformed_address_rejected() {
        for bad in ["1.2.3.4 # x", "a: b", "[1.2.3.4]", " 1.2.3.4", "host\nname"] {
            let target = InstanceRecord::new("i-mem", bad, "10.0.0.2");
            assert!(
                render(NodeRole::Memory, &tx(), &target, &TuningParams::default()).is_err(),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn hostnames_and_ipv6_accepted() {
        let target = InstanceRecord::new("i-mem", "ec2-5-6-7-8.compute.amazonaws.com", "fd00::2");
        assert!(render(NodeRole::Memory, &tx(), &target, &TuningParams::default()).is_ok());
    }
}
