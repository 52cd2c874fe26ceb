//! Error taxonomy shared by the resolver, renderer, and pusher.

use thiserror::Error;

/// Everything that can go wrong while deploying one role's config.
///
/// Values are `Clone` so a failure that affects several roles (the provider
/// call, a missing seed node) can be reported against each of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    /// A requested instance ID has no matching descriptor.
    #[error("instance '{instance_id}' not found in provider response")]
    NotFound { instance_id: String },

    /// The describe-instances call failed or returned garbage.
    #[error("provider error: {0}")]
    Provider(String),

    /// An address that would be interpolated into a config is unusable.
    #[error("invalid {field} for instance '{instance_id}': {value:?}")]
    InvalidAddress {
        instance_id: String,
        field: &'static str,
        value: String,
    },

    /// The remote session could not be established.
    #[error("{address} unreachable: {reason}")]
    RemoteUnreachable { address: String, reason: String },

    /// The stream broke or the remote command reported failure.
    #[error("write to {address}:{remote_path} failed: {reason}")]
    RemoteWrite {
        address: String,
        remote_path: String,
        reason: String,
    },

    /// The config document could not be serialized.
    #[error("render error: {0}")]
    Render(String),

    /// The deployment config file is unreadable or inconsistent.
    #[error("config error: {0}")]
    Config(String),
}

impl DeployError {
    /// Stable name of the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::NotFound { .. } => "NotFound",
            DeployError::Provider(_) => "ProviderError",
            DeployError::InvalidAddress { .. } => "InvalidAddress",
            DeployError::RemoteUnreachable { .. } => "RemoteUnreachable",
            DeployError::RemoteWrite { .. } => "RemoteWriteError",
            DeployError::Render(_) => "RenderError",
            DeployError::Config(_) => "ConfigError",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
