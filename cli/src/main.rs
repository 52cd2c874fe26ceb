//! anna-deploy: push per-node config to the Anna cluster's instances.
//!
//! # Usage
//!
//! ```text
//! anna-deploy                         # resolve, render and push all roles
//! anna-deploy --dry-run               # print the rendered configs instead
//! anna-deploy --role memory --role log
//! anna-deploy --config deploy.yml --json
//! anna-deploy --print-default-config > deploy.yml
//! ```
//!
//! With no arguments every setting comes from the compiled-in defaults.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use anna_deploy_core::config::DeployConfig;
use anna_deploy_core::deploy::{DeployOptions, DeployReport, Deployer, RoleStatus};
use anna_deploy_core::infrastructure::ShellRunner;
use anna_deploy_core::inventory::AwsCliProvider;
use anna_deploy_core::push::{Pusher, SshTransport};
use anna_deploy_core::types::NodeRole;


/// Render and push Anna node configs to the cluster's instances.
#[derive(Debug, Parser)]
#[command(name = "anna-deploy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Deploy config (YAML). Defaults to the compiled-in deployment.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolve and render, print the documents, push nothing
    #[arg(long)]
    dry_run: bool,

    /// Only deploy this role (txn, memory, log); repeatable
    #[arg(short, long = "role")]
    roles: Vec<NodeRole>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Print the default deploy config as YAML and exit
    #[arg(long)]
    print_default_config: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}


fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.print_default_config {
        print!("{}", DeployConfig::default().to_yaml()?);
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    tracing::debug!(config_path = ?cli.config, "loaded deploy config");
    let options = DeployOptions {
        roles: cli.roles.clone(),
        dry_run: cli.dry_run,
    };

    let provider = AwsCliProvider::new(Box::new(ShellRunner), config.provider.clone());
    let pusher = Pusher::new(Box::new(SshTransport::new(&config.remote)), &config.remote);
    let mut deployer =
        Deployer::new(config, Box::new(provider), pusher).context("invalid deploy config")?;

    let report = deployer.run(&options);
    print_report(&report, cli.json, cli.dry_run)?;

    if !report.success() {
        let failed: Vec<String> = report.failed().iter().map(|r| r.role.to_string()).collect();
        eprintln!("anna-deploy: failed roles: {}", failed.join(", "));
        process::exit(1);
    }
    Ok(())
}


fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}


fn load_config(path: Option<&PathBuf>) -> Result<DeployConfig> {
    match path {
        Some(path) => DeployConfig::load(path)
            .with_context(|| format!("loading deploy config {}", path.display())),
        None => Ok(DeployConfig::default()),
    }
}


fn print_report(report: &DeployReport, json: bool, dry_run: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if dry_run {
        for role in &report.roles {
            if let RoleStatus::Rendered { document, remote_path, address } = &role.status {
                println!("# {} ({}) -> {}:{}", role.role, role.instance_id, address, remote_path);
                println!("{}", yaml_document(document));
            }
        }
    }
    print!("{}", report);
    Ok(())
}


/// Prefix a document with `---` so concatenated dry-run output stays a valid
/// multi-document YAML stream.
fn yaml_document(document: &str) -> String {
    format!("---\n{}", document)
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_means_full_deploy() {
        let cli = Cli::try_parse_from(["anna-deploy"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.dry_run);
        assert!(cli.roles.is_empty());
        assert!(!cli.json);
    }

    #[test]
    fn parses_roles_and_flags() {
        let cli = Cli::try_parse_from([
            "anna-deploy",
            "--role",
            "memory",
            "-r",
            "txn",
            "--dry-run",
            "--json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.roles, vec![NodeRole::Memory, NodeRole::Transaction]);
        assert!(cli.dry_run);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Cli::try_parse_from(["anna-deploy", "--role", "ebs"]).is_err());
    }

    #[test]
    fn default_config_without_path() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, DeployConfig::default());
    }

    #[test]
    fn missing_config_file_errors() {
        let path = PathBuf::from("/tmp/nonexistent_anna_deploy_cli.yml");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("cannot read"));
    }

    #[test]
    fn dry_run_documents_are_separated() {
        assert_eq!(yaml_document("a: 1\n"), "---\na: 1\n");
    }
}
