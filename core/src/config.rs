//! Deployment configuration.
//!
//! `DeployConfig::default()` is the compiled-in deployment: three fixed
//! instances in the west region, pushed as `ubuntu` with the region key. A
//! YAML file may override any section; omitted sections keep their defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::push::DEFAULT_CHUNK_SIZE;
use crate::types::{NodeRole, TuningParams};

pub const DEFAULT_REMOTE_PATH: &str = "anna/conf/anna-config.yml";

/// Everything a deploy run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Which instance plays which role.
    pub nodes: BTreeMap<NodeRole, NodeSpec>,
    pub tuning: TuningParams,
    pub remote: RemoteSettings,
    pub provider: ProviderSettings,
}

/// One role's instance and, optionally, where its config lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub instance_id: String,
    /// Overrides `remote.remote_path` for this role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
}

impl NodeSpec {
    pub fn new(instance_id: &str) -> Self {
        NodeSpec {
            instance_id: instance_id.to_string(),
            remote_path: None,
        }
    }
}

/// How ssh treats host keys it has not seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Trust on first use, reject changed keys.
    AcceptNew,
    /// Only connect to hosts already in `known_hosts`.
    Strict,
    /// Never verify.
    Off,
}

impl HostKeyPolicy {
    /// Value for ssh's `StrictHostKeyChecking` option.
    pub fn ssh_option(self) -> &'static str {
        match self {
            HostKeyPolicy::AcceptNew => "accept-new",
            HostKeyPolicy::Strict => "yes",
            HostKeyPolicy::Off => "no",
        }
    }
}

/// Longest accepted connect or session timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Remote session settings shared by every push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub user: String,
    /// Private key handed to ssh with `-i`. ssh expands a leading `~`.
    pub key_path: String,
    pub port: u16,
    /// Destination of the config, relative to the user's home.
    pub remote_path: String,
    pub host_key_policy: HostKeyPolicy,
    pub connect_timeout_secs: u64,
    /// Upper bound on one whole push (connect + write + remote exit).
    pub session_timeout_secs: u64,
    pub chunk_size: usize,
    pub ssh_program: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            user: "ubuntu".into(),
            key_path: "~/west-region-key.pem".into(),
            port: 22,
            remote_path: DEFAULT_REMOTE_PATH.into(),
            host_key_policy: HostKeyPolicy::AcceptNew,
            connect_timeout_secs: 10,
            session_timeout_secs: 60,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ssh_program: "ssh".into(),
        }
    }
}

/// Cloud provider coordinates. Unset values fall back to the aws CLI's own
/// environment and profile resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub aws_program: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            region: None,
            profile: None,
            aws_program: "aws".into(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodeRole::Transaction, NodeSpec::new("i-096b191e5f3c0e94e"));
        nodes.insert(NodeRole::Memory, NodeSpec::new("i-02a968d7be0607695"));
        nodes.insert(NodeRole::Log, NodeSpec::new("i-005f739d8615dd7d2"));
        DeployConfig {
            nodes,
            tuning: TuningParams::default(),
            remote: RemoteSettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

impl DeployConfig {
    /// Load a config from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a config from a YAML string and validate it.
    pub fn parse(content: &str) -> Result<Self> {
        let config: DeployConfig = serde_yaml::from_str(content)
            .map_err(|e| DeployError::Config(format!("invalid deploy config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| DeployError::Config(e.to_string()))
    }

    /// Reject configs that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        for role in NodeRole::ALL {
            match self.nodes.get(&role) {
                None => {
                    return Err(DeployError::Config(format!(
                        "no instance configured for role '{}'",
                        role
                    )))
                }
                Some(spec) if spec.instance_id.trim().is_empty() => {
                    return Err(DeployError::Config(format!(
                        "empty instance_id for role '{}'",
                        role
                    )))
                }
                Some(_) => {}
            }
        }
        if self.remote.user.trim().is_empty() {
            return Err(DeployError::Config("remote.user is empty".into()));
        }
        if self.remote.chunk_size == 0 {
            return Err(DeployError::Config("remote.chunk_size must be positive".into()));
        }
        if self.remote.connect_timeout_secs == 0 || self.remote.session_timeout_secs == 0 {
            return Err(DeployError::Config("remote timeouts must be positive".into()));
        }
        if self.remote.connect_timeout_secs > MAX_TIMEOUT_SECS
            || self.remote.session_timeout_secs > MAX_TIMEOUT_SECS
        {
            return Err(DeployError::Config(format!(
                "remote timeouts must not exceed {}s",
                MAX_TIMEOUT_SECS
            )));
        }
        Ok(())
    }

    /// The role → instance ID mapping handed to the resolver.
    pub fn role_to_id(&self) -> BTreeMap<NodeRole, String> {
        self.nodes
            .iter()
            .map(|(role, spec)| (*role, spec.instance_id.clone()))
            .collect()
    }

    pub fn instance_id(&self, role: NodeRole) -> Option<&str> {
        self.nodes.get(&role).map(|s| s.instance_id.as_str())
    }

    /// Where `role`'s config is written on its instance.
    pub fn remote_path_for(&self, role: NodeRole) -> &str {
        self.nodes
            .get(&role)
            .and_then(|s| s.remote_path.as_deref())
            .unwrap_or(&self.remote.remote_path)
    }
}
