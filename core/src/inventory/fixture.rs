//! In-memory provider for tests and offline runs.

use std::cell::Cell;

use super::{InstanceDescriptor, InstanceProvider, Reservation};
use crate::error::{DeployError, Result};
use crate::types::InstanceRecord;

/// Serves a fixed set of reservations, or a fixed failure, and counts calls.
pub struct StaticProvider {
    reservations: Vec<Reservation>,
    failure: Option<String>,
    calls: Cell<usize>,
}

impl StaticProvider {
    pub fn new(reservations: Vec<Reservation>) -> Self {
        StaticProvider {
            reservations,
            failure: None,
            calls: Cell::new(0),
        }
    }

    /// One single-instance reservation per record.
    pub fn from_records(records: &[InstanceRecord]) -> Self {
        let reservations = records
            .iter()
            .map(|r| Reservation {
                instances: vec![InstanceDescriptor {
                    instance_id: r.identifier.clone(),
                    public_ip_address: Some(r.public_address.clone()),
                    private_ip_address: Some(r.private_address.clone()),
                }],
            })
            .collect();
        Self::new(reservations)
    }

    /// A provider whose every call fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        StaticProvider {
            reservations: Vec::new(),
            failure: Some(reason.to_string()),
            calls: Cell::new(0),
        }
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// Number of describe calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl InstanceProvider for StaticProvider {
    fn describe_instances(&self) -> Result<Vec<Reservation>> {
        self.calls.set(self.calls.get() + 1);
        match &self.failure {
            Some(reason) => Err(DeployError::Provider(reason.clone())),
            None => Ok(self.reservations.clone()),
        }
    }
}
