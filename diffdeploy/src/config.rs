use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::sync::backend::Credentials;
use crate::sync::run::RunOptions;
use crate::sync::signature::DEFAULT_HASH_CONCURRENCY;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_REMOTE_BASE: &str = ".";

/// Deploy a local directory onto a remote file store, transferring only what changed
#[derive(Parser, Debug)]
#[command(name = "diffdeploy", version, about, long_about = None)]
pub struct DeployArgs {
    /// Local directory to deploy
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Remote host, with or without scheme
    #[arg(long, env = "DIFFDEPLOY_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Remote directory the tree is deployed into
    #[arg(long, env = "DIFFDEPLOY_REMOTE_BASE", default_value = DEFAULT_REMOTE_BASE)]
    pub remote_base: String,

    #[arg(long, env = "DIFFDEPLOY_USERNAME")]
    pub username: String,

    #[arg(long, env = "DIFFDEPLOY_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Never change remote permission bits
    #[arg(long, env = "DIFFDEPLOY_DISABLE_PERMISSIONS")]
    pub disable_permissions: bool,

    /// Maximum number of files hashed at once
    #[arg(long, env = "DIFFDEPLOY_HASH_CONCURRENCY", default_value_t = DEFAULT_HASH_CONCURRENCY)]
    pub hash_concurrency: usize,

    /// Plan and print operations without touching the remote
    #[arg(long)]
    pub dry_run: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("hash concurrency must be at least 1")]
    ZeroConcurrency,
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub source: PathBuf,
    pub host: String,
    pub credentials: Credentials,
    pub options: RunOptions,
    pub verbose: bool,
}

impl DeployConfig {
    pub fn from_args(args: DeployArgs) -> Result<Self, ConfigError> {
        let config = Self {
            source: args.source,
            host: args.host.trim().to_string(),
            credentials: Credentials::new(args.username, args.password),
            options: RunOptions {
                remote_base: args.remote_base,
                disable_permissions: args.disable_permissions,
                hash_concurrency: args.hash_concurrency,
                dry_run: args.dry_run,
            },
            verbose: args.verbose,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.credentials.username.trim().is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if self.options.hash_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}
