// Configuration - CLI flags layered over environment and an optional settings file
use crate::infrastructure::github_client::DEFAULT_API_URL;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const GRAFANA_USERNAME_ENV: &str = "GRAFANA_USERNAME";
pub const GRAFANA_PASSWORD_ENV: &str = "GRAFANA_PASSWORD";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

const ENV_PREFIX: &str = "DASHBOARD_SYNC";
const DEFAULT_CONFIG_FILE: &str = "config/dashboard-sync";

/// Sync Grafana dashboards into a GitHub repository through a pull request
#[derive(Debug, Clone, Default, Parser)]
#[command(version, about)]
pub struct CliArgs {
    /// Grafana base URL
    #[arg(long, value_name = "url")]
    pub grafana: Option<String>,

    /// GitHub repository owner
    #[arg(long, value_name = "name")]
    pub owner: Option<String>,

    /// GitHub repository name
    #[arg(long, value_name = "name")]
    pub repo: Option<String>,

    /// Directory inside the repository holding the dashboards
    #[arg(long, value_name = "path")]
    pub dir: Option<String>,

    /// Branch to create for the pull request
    #[arg(long, value_name = "name")]
    pub branch: Option<String>,

    /// Append a UTC timestamp to the branch name
    #[arg(long)]
    pub unique_branch: bool,

    /// Branch the pull request targets
    #[arg(long, value_name = "name")]
    pub base: Option<String>,

    /// GitHub API root
    #[arg(long, value_name = "url")]
    pub github_api: Option<String>,

    /// Maximum number of dashboards fetched at once (unlimited when unset)
    #[arg(long, value_name = "n")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "secs")]
    pub timeout_secs: Option<u64>,

    /// Report changed dashboards without publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Settings file (toml, yaml or json)
    #[arg(long, value_name = "path")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--{0} is required")]
    MissingFlag(&'static str),

    #[error("{0} must be set")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub grafana: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub dir: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub unique_branch: bool,
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_github_api")]
    pub github_api: String,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_branch() -> String {
    "update-grafana-dashboards".to_string()
}

fn default_base() -> String {
    "main".to_string()
}

fn default_github_api() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grafana: None,
            owner: None,
            repo: None,
            dir: None,
            branch: default_branch(),
            unique_branch: false,
            base: default_base(),
            github_api: default_github_api(),
            concurrency: None,
            timeout_secs: default_timeout_secs(),
            dry_run: false,
        }
    }
}

/// Everything a run needs, validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub grafana_url: String,
    pub grafana_username: String,
    pub grafana_password: String,
    pub github_api: String,
    pub github_token: String,
    pub owner: String,
    pub repo: String,
    pub directory: String,
    pub base_branch: String,
    pub branch: String,
    pub concurrency: Option<usize>,
    pub timeout: Duration,
    pub dry_run: bool,
}

/// Load settings: file, then `DASHBOARD_SYNC_*` environment, then CLI flags
pub fn load_settings(args: &CliArgs) -> Result<Settings, ConfigError> {
    let file = match &args.config {
        Some(path) => config::File::from(path.as_path()).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let concurrency = override_integer("concurrency", args.concurrency.map(|n| n as u64))?;
    let timeout_secs = override_integer("timeout_secs", args.timeout_secs)?;

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .set_override_option("grafana", args.grafana.clone())?
        .set_override_option("owner", args.owner.clone())?
        .set_override_option("repo", args.repo.clone())?
        .set_override_option("dir", args.dir.clone())?
        .set_override_option("branch", args.branch.clone())?
        .set_override_option("unique_branch", args.unique_branch.then_some(true))?
        .set_override_option("base", args.base.clone())?
        .set_override_option("github_api", args.github_api.clone())?
        .set_override_option("concurrency", concurrency)?
        .set_override_option("timeout_secs", timeout_secs)?
        .set_override_option("dry_run", args.dry_run.then_some(true))?
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Load and validate the run configuration. A missing flag or credential is reported
/// on stdout and yields `None` so the caller can end the run cleanly.
pub fn resolve_config<F>(
    args: &CliArgs,
    env: F,
    now: DateTime<Utc>,
) -> Result<Option<SyncConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match load_settings(args)?.validate(env, now) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::MissingFlag(flag)) => {
            println!("--{} is required\n", flag);
            let _ = CliArgs::command().print_help();
            Ok(None)
        }
        Err(e @ ConfigError::MissingEnv(_)) => {
            println!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The config crate stores integers as i64
fn override_integer(key: &str, value: Option<u64>) -> Result<Option<i64>, ConfigError> {
    value
        .map(i64::try_from)
        .transpose()
        .map_err(|_| ConfigError::Invalid(format!("{} is out of range", key)))
}

impl Settings {
    /// Check required flags first, then credentials, so nothing touches the network without them
    pub fn validate<F>(self, env: F, now: DateTime<Utc>) -> Result<SyncConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let grafana_url = required_flag(self.grafana, "grafana")?;
        let owner = required_flag(self.owner, "owner")?;
        let repo = required_flag(self.repo, "repo")?;
        let directory = required_flag(self.dir, "dir")?;

        let grafana_username = required_env(&env, GRAFANA_USERNAME_ENV)?;
        let grafana_password = required_env(&env, GRAFANA_PASSWORD_ENV)?;
        let github_token = required_env(&env, GITHUB_TOKEN_ENV)?;

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.branch.trim().is_empty() {
            return Err(ConfigError::Invalid("branch must not be empty".into()));
        }
        if self.branch == self.base {
            return Err(ConfigError::Invalid(format!(
                "branch {} is the same as the base branch",
                self.branch
            )));
        }

        Ok(SyncConfig {
            grafana_url,
            grafana_username,
            grafana_password,
            github_api: self.github_api,
            github_token,
            owner,
            repo,
            directory,
            branch: branch_name(&self.branch, self.unique_branch, now),
            base_branch: self.base,
            concurrency: self.concurrency.filter(|n| *n > 0),
            timeout: Duration::from_secs(self.timeout_secs),
            dry_run: self.dry_run,
        })
    }
}

/// The configured branch, optionally suffixed so repeated runs do not collide
pub fn branch_name(branch: &str, unique: bool, now: DateTime<Utc>) -> String {
    if unique {
        format!("{}-{}", branch, now.format("%Y%m%d%H%M%S%3f"))
    } else {
        branch.to_string()
    }
}

fn required_flag(value: Option<String>, flag: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingFlag(flag))
}

fn required_env<F>(env: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    env(name)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnv(name))
}
