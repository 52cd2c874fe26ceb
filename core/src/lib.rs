//! Anna deployment core: resolve the cluster's instances, render each node's
//! YAML config, and push it over ssh.
//!
//! The library never reads global state. Everything the run needs arrives in a
//! [`config::DeployConfig`] plus the injected collaborators
//! ([`inventory::InstanceProvider`], [`push::Transport`]), so tests substitute
//! fixtures for the cloud API and the remote hosts.

pub mod config;
pub mod deploy;
pub mod error;
pub mod infrastructure;
pub mod inventory;
pub mod push;
pub mod render;
pub mod types;

pub use error::{DeployError, Result};
