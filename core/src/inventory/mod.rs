//! Instance inventory: one describe-instances call, resolved to the roles'
//! addresses.
//!
//! The provider answers with instances grouped by reservation. Each
//! reservation's first instance is the one that matters here; the rest are
//! ignored.

pub mod aws;
pub mod fixture;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::types::{InstanceRecord, NodeRole};

pub use aws::AwsCliProvider;
pub use fixture::StaticProvider;


// ---------------------------------------------------------------------------
// Provider wire types
// ---------------------------------------------------------------------------

/// Top-level shape of `describe-instances` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesOutput {
    #[serde(default)]
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reservation {
    #[serde(default)]
    pub instances: Vec<InstanceDescriptor>,
}

/// The subset of an instance description the resolver reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceDescriptor {
    pub instance_id: String,
    /// Absent for stopped instances and instances without a public IP.
    #[serde(default)]
    pub public_ip_address: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
}

impl InstanceDescriptor {
    fn to_record(&self) -> InstanceRecord {
        InstanceRecord {
            identifier: self.instance_id.clone(),
            public_address: self.public_ip_address.clone().unwrap_or_default(),
            private_address: self.private_ip_address.clone().unwrap_or_default(),
        }
    }
}


// ---------------------------------------------------------------------------
// InstanceProvider
// ---------------------------------------------------------------------------

/// Source of instance descriptions. Implementations make at most one call per
/// invocation and never retry.
pub trait InstanceProvider {
    fn describe_instances(&self) -> Result<Vec<Reservation>>;
}


// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Flattened snapshot of one describe-instances call.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    instances: Vec<InstanceDescriptor>,
}

impl Inventory {
    /// Query the provider once and flatten its reservations.
    pub fn fetch(provider: &dyn InstanceProvider) -> Result<Self> {
        let reservations = provider.describe_instances()?;
        let inventory = Self::from_reservations(reservations);
        tracing::info!(instances = inventory.len(), "fetched instance inventory");
        Ok(inventory)
    }

    /// Keep the first instance of every reservation; skip empty ones.
    pub fn from_reservations(reservations: Vec<Reservation>) -> Self {
        let instances = reservations
            .into_iter()
            .filter_map(|r| r.instances.into_iter().next())
            .collect();
        Inventory { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Find an instance by exact ID.
    pub fn lookup(&self, instance_id: &str) -> Result<InstanceRecord> {
        self.instances
            .iter()
            .find(|i| i.instance_id == instance_id)
            .map(InstanceDescriptor::to_record)
            .ok_or_else(|| DeployError::NotFound {
                instance_id: instance_id.to_string(),
            })
    }
}

/// Resolve every requested role to its instance's addresses.
///
/// Returns exactly the requested roles. Fails on the first ID the provider
/// did not report. `Deployer::run` uses `Inventory::fetch` and `lookup`
/// directly instead, so one missing instance fails only its own role.
pub fn resolve(
    provider: &dyn InstanceProvider,
    role_to_id: &BTreeMap<NodeRole, String>,
) -> Result<BTreeMap<NodeRole, InstanceRecord>> {
    let inventory = Inventory::fetch(provider)?;
    role_to_id
        .iter()
        .map(|(role, id)| inventory.lookup(id).map(|record| (*role, record)))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn three_nodes() -> StaticProvider {
        StaticProvider::from_records(&[
            InstanceRecord::new("i-tx", "1.2.3.4", "10.0.0.1"),
            InstanceRecord::new("i-mem", "5.6.7.8", "10.0.0.2"),
            InstanceRecord::new("i-log", "9.10.11.12", "10.0.0.3"),
            InstanceRecord::new("i-other", "13.14.15.16", "10.0.0.4"),
        ])
    }

    fn request(pairs: &[(NodeRole, &str)]) -> BTreeMap<NodeRole, String> {
        pairs.iter().map(|(r, id)| (*r, id.to_string())).collect()
    }

    #[test]
    fn resolve_returns_requested_subset() {
        let provider = three_nodes();
        let wanted = request(&[
            (NodeRole::Transaction, "i-tx"),
            (NodeRole::Memory, "i-mem"),
            (NodeRole::Log, "i-log"),
        ]);
        let resolved = resolve(&provider, &wanted).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[&NodeRole::Memory].public_address, "5.6.7.8");
        assert_eq!(resolved[&NodeRole::Log].private_address, "10.0.0.3");
        assert!(resolved.values().all(|r| r.identifier != "i-other"));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn resolve_missing_id_is_not_found() {
        let provider = three_nodes();
        let wanted = request(&[
            (NodeRole::Transaction, "i-tx"),
            (NodeRole::Memory, "i-gone"),
        ]);
        let err = resolve(&provider, &wanted).unwrap_err();
        assert_eq!(
            err,
            DeployError::NotFound {
                instance_id: "i-gone".into()
            }
        );
    }

    #[test]
    fn resolve_propagates_provider_failure() {
        let provider = StaticProvider::failing("throttled");
        let wanted = request(&[(NodeRole::Transaction, "i-tx")]);
        let err = resolve(&provider, &wanted).unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
        assert!(err.to_string().contains("throttled"));
    }

    #[test]
    fn only_first_instance_of_reservation_counts() {
        let reservations = vec![
            Reservation {
                instances: vec![
                    InstanceDescriptor {
                        instance_id: "i-first".into(),
                        public_ip_address: Some("1.1.1.1".into()),
                        private_ip_address: Some("10.1.1.1".into()),
                    },
                    InstanceDescriptor {
                        instance_id: "i-second".into(),
                        public_ip_address: Some("2.2.2.2".into()),
                        private_ip_address: Some("10.2.2.2".into()),
                    },
                ],
            },
            Reservation { instances: vec![] },
        ];
        let inventory = Inventory::from_reservations(reservations);
        assert_eq!(inventory.len(), 1);
        assert!(inventory.lookup("i-first").is_ok());
        assert!(inventory.lookup("i-second").is_err());
    }

    #[test]
    fn lookup_is_exact_match() {
        let inventory = Inventory::from_reservations(three_nodes().reservations().to_vec());
        assert!(inventory.lookup("i-t").is_err());
        assert!(inventory.lookup("I-TX").is_err());
        assert_eq!(inventory.lookup("i-tx").unwrap().public_address, "1.2.3.4");
    }

    #[test]
    fn missing_addresses_become_empty() {
        let inventory = Inventory::from_reservations(vec![Reservation {
            instances: vec![InstanceDescriptor {
                instance_id: "i-stopped".into(),
                public_ip_address: None,
                private_ip_address: Some("10.0.0.9".into()),
            }],
        }]);
        let record = inventory.lookup("i-stopped").unwrap();
        assert_eq!(record.public_address, "");
        assert_eq!(record.private_address, "10.0.0.9");
    }
}
