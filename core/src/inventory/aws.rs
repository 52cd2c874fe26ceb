//! Provider backed by the aws CLI.
//!
//! Runs `aws ec2 describe-instances --output json` and parses the JSON.
//! Credentials and, unless configured, the region come from the CLI's usual
//! environment and profile chain.

use super::{DescribeInstancesOutput, InstanceProvider, Reservation};
use crate::config::ProviderSettings;
use crate::error::{DeployError, Result};
use crate::infrastructure::CommandRunner;

pub struct AwsCliProvider {
    runner: Box<dyn CommandRunner>,
    settings: ProviderSettings,
}

impl AwsCliProvider {
    pub fn new(runner: Box<dyn CommandRunner>, settings: ProviderSettings) -> Self {
        AwsCliProvider { runner, settings }
    }

    /// Arguments passed to the aws program.
    pub fn describe_args(&self) -> Vec<String> {
        let mut args = vec![
            "ec2".to_string(),
            "describe-instances".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        if let Some(ref region) = self.settings.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(ref profile) = self.settings.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }
}

/// Parse raw describe-instances JSON.
pub fn parse_describe_output(json: &str) -> Result<Vec<Reservation>> {
    let output: DescribeInstancesOutput = serde_json::from_str(json).map_err(|e| {
        DeployError::Provider(format!("malformed describe-instances output: {}", e))
    })?;
    Ok(output.reservations)
}

impl InstanceProvider for AwsCliProvider {
    fn describe_instances(&self) -> Result<Vec<Reservation>> {
        let stdout = self
            .runner
            .run(&self.settings.aws_program, &self.describe_args())
            .map_err(DeployError::Provider)?;
        parse_describe_output(&stdout)
    }
}
