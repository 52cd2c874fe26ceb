//! Deploy driver: resolve once, then render and push each role in turn.
//!
//! `Deployer` is the only component that sequences the resolver, renderer and
//! pusher. Every role's outcome is independent: a missing instance, a bad
//! address or an unreachable host fails that role only, and the remaining
//! roles are still attempted. Failures that hit every role (the provider
//! call, a missing seed node) are reported against each of them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DeployConfig;
use crate::error::Result;
use crate::inventory::{InstanceProvider, Inventory};
use crate::push::{PushReceipt, Pusher, RemoteTarget};
use crate::render::{render, RenderedConfig};
use crate::types::{InstanceRecord, NodeRole};


// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Roles to deploy. Empty means all of them.
    pub roles: Vec<NodeRole>,
    /// Render but do not push.
    pub dry_run: bool,
}

impl DeployOptions {
    /// Selected roles, deduplicated, in deployment order.
    pub fn selected_roles(&self) -> Vec<NodeRole> {
        NodeRole::ALL
            .into_iter()
            .filter(|r| self.roles.is_empty() || self.roles.contains(r))
            .collect()
    }
}


// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What happened to one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleStatus {
    Pushed {
        address: String,
        remote_path: String,
        bytes: usize,
        chunks: usize,
    },
    /// Dry run: the document that would have been pushed.
    Rendered {
        address: String,
        remote_path: String,
        document: String,
    },
    Failed {
        kind: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReport {
    pub role: NodeRole,
    pub instance_id: String,
    #[serde(flatten)]
    pub status: RoleStatus,
}

impl RoleReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, RoleStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    pub roles: Vec<RoleReport>,
}

impl DeployReport {
    pub fn success(&self) -> bool {
        !self.roles.iter().any(RoleReport::is_failure)
    }

    pub fn failed(&self) -> Vec<&RoleReport> {
        self.roles.iter().filter(|r| r.is_failure()).collect()
    }

    pub fn get(&self, role: NodeRole) -> Option<&RoleReport> {
        self.roles.iter().find(|r| r.role == role)
    }
}

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.roles {
            match &report.status {
                RoleStatus::Pushed {
                    address,
                    remote_path,
                    bytes,
                    ..
                } => writeln!(
                    f,
                    "ok      {:<6} {} -> {}:{} ({} bytes)",
                    report.role, report.instance_id, address, remote_path, bytes
                )?,
                RoleStatus::Rendered {
                    address,
                    remote_path,
                    ..
                } => writeln!(
                    f,
                    "render  {:<6} {} -> {}:{} (dry run)",
                    report.role, report.instance_id, address, remote_path
                )?,
                RoleStatus::Failed { kind, message } => writeln!(
                    f,
                    "FAILED  {:<6} {} [{}] {}",
                    report.role, report.instance_id, kind, message
                )?,
            }
        }
        Ok(())
    }
}


// ---------------------------------------------------------------------------
// Deployer
// ---------------------------------------------------------------------------

/// Runs a deployment against injected provider and transport.
pub struct Deployer {
    config: DeployConfig,
    provider: Box<dyn InstanceProvider>,
    pusher: Pusher,
}

impl Deployer {
    /// Validates `config` up front; nothing is contacted until `run`.
    pub fn new(
        config: DeployConfig,
        provider: Box<dyn InstanceProvider>,
        pusher: Pusher,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Deployer {
            config,
            provider,
            pusher,
        })
    }

    /// Run the deployment. Never aborts early: every selected role gets a
    /// report entry.
    pub fn run(&mut self, options: &DeployOptions) -> DeployReport {
        let roles = options.selected_roles();
        tracing::info!(roles = ?roles, dry_run = options.dry_run, "starting deploy");

        let inventory = Inventory::fetch(self.provider.as_ref());
        let seed = inventory.as_ref().map_err(Clone::clone).and_then(|inv| {
            inv.lookup(self.seed_id())
        });

        let mut report = DeployReport::default();
        for role in roles {
            let instance_id = self.instance_id(role);
            let status = match self.deploy_role(role, &inventory, &seed, options.dry_run) {
                Ok(status) => {
                    tracing::info!(%role, %instance_id, "role done");
                    status
                }
                Err(e) => {
                    tracing::warn!(%role, %instance_id, kind = e.kind(), error = %e, "role failed");
                    RoleStatus::Failed {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    }
                }
            };
            report.roles.push(RoleReport {
                role,
                instance_id,
                status,
            });
        }
        report
    }

    /// Resolve, render and (unless dry) push one role.
    fn deploy_role(
        &mut self,
        role: NodeRole,
        inventory: &Result<Inventory>,
        seed: &Result<InstanceRecord>,
        dry_run: bool,
    ) -> Result<RoleStatus> {
        let inventory = inventory.as_ref().map_err(Clone::clone)?;
        let seed = seed.as_ref().map_err(Clone::clone)?;
        let target = if role.is_seed() {
            seed.clone()
        } else {
            inventory.lookup(&self.instance_id(role))?
        };

        let rendered = render(role, seed, &target, &self.config.tuning)?;
        let remote_path = self.config.remote_path_for(role).to_string();
        let remote = RemoteTarget::for_instance(role, &target, &self.config.remote);

        if dry_run {
            return Ok(RoleStatus::Rendered {
                address: remote.host,
                remote_path,
                document: rendered.text,
            });
        }

        let receipt = self.push(&remote, &remote_path, &rendered)?;
        Ok(RoleStatus::Pushed {
            address: receipt.address,
            remote_path: receipt.remote_path,
            bytes: receipt.bytes,
            chunks: receipt.chunks,
        })
    }

    fn push(
        &mut self,
        remote: &RemoteTarget,
        remote_path: &str,
        rendered: &RenderedConfig,
    ) -> Result<PushReceipt> {
        tracing::info!(
            role = %rendered.role,
            target = %remote.user_at_host(),
            remote_path,
            bytes = rendered.len(),
            "pushing config"
        );
        self.pusher.push(remote, remote_path, rendered)
    }

    fn seed_id(&self) -> &str {
        self.config
            .instance_id(NodeRole::Transaction)
            .unwrap_or_default()
    }

    fn instance_id(&self, role: NodeRole) -> String {
        self.config.instance_id(role).unwrap_or_default().to_string()
    }
}
