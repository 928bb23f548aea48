// Main entry point - Configuration, dependency wiring and the sync run
mod application;
mod domain;
mod infrastructure;

use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::application::change_publisher::ChangePublisher;
use crate::application::drift_detector::DriftDetector;
use crate::application::repository_host::RepositoryHost;
use crate::application::sync_service::{SyncOutcome, SyncService};
use crate::infrastructure::config::{CliArgs, SyncConfig, resolve_config};
use crate::infrastructure::github_client::GitHubClient;
use crate::infrastructure::grafana_client::GrafanaClient;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().compact())
        .with(filter)
        .init();

    if let Err(error) = run(CliArgs::parse()).await {
        error!("{error:?}");
        exit(1);
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    run_with(args, |name| std::env::var(name).ok(), build_service).await
}

async fn run_with<E, B>(args: CliArgs, env: E, build: B) -> anyhow::Result<()>
where
    E: Fn(&str) -> Option<String>,
    B: FnOnce(&SyncConfig) -> anyhow::Result<SyncService>,
{
    let Some(config) = resolve_config(&args, env, chrono::Utc::now())? else {
        return Ok(());
    };

    let service = build(&config)?;
    for line in outcome_lines(&service.run().await?) {
        println!("{}", line);
    }

    Ok(())
}

/// Console summary of a finished run
fn outcome_lines(outcome: &SyncOutcome) -> Vec<String> {
    match outcome {
        SyncOutcome::NoChanges => vec!["No changes".to_string()],
        SyncOutcome::DryRun(filenames) => {
            let mut lines = vec![format!(
                "Dry run, {} dashboards would be updated:",
                filenames.len()
            )];
            lines.extend(filenames.iter().map(|f| format!("  {}", f)));
            lines
        }
        SyncOutcome::Published(published) => {
            vec![format!("Pull request created: {}", published.pull_request_url)]
        }
    }
}

fn build_service(config: &SyncConfig) -> anyhow::Result<SyncService> {
    let grafana = Arc::new(
        GrafanaClient::new(
            config.grafana_url.clone(),
            config.grafana_username.clone(),
            config.grafana_password.clone(),
            config.timeout,
        )
        .context("Failed to build Grafana client")?,
    );

    let github: Arc<dyn RepositoryHost> = Arc::new(
        GitHubClient::new(
            config.github_api.clone(),
            config.owner.clone(),
            config.repo.clone(),
            config.github_token.clone(),
            config.timeout,
        )
        .context("Failed to build GitHub client")?,
    );

    let detector = DriftDetector::new(
        github.clone(),
        config.directory.clone(),
        config.base_branch.clone(),
    );
    let publisher = ChangePublisher::new(
        github,
        config.directory.clone(),
        config.base_branch.clone(),
        config.branch.clone(),
    );

    Ok(SyncService::new(grafana, detector, publisher)
        .with_concurrency(config.concurrency)
        .with_dry_run(config.dry_run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::change_publisher::PublishedChange;
    use crate::infrastructure::config::{GITHUB_TOKEN_ENV, GRAFANA_PASSWORD_ENV, GRAFANA_USERNAME_ENV};

    fn complete_args() -> CliArgs {
        CliArgs {
            grafana: Some("http://localhost:3000".into()),
            owner: Some("acme".into()),
            repo: Some("dashboards".into()),
            dir: Some("grafana".into()),
            ..CliArgs::default()
        }
    }

    fn grafana_credentials_only(name: &str) -> Option<String> {
        match name {
            GRAFANA_USERNAME_ENV => Some("admin".into()),
            GRAFANA_PASSWORD_ENV => Some("secret".into()),
            _ => None,
        }
    }

    #[test]
    fn test_outcome_lines() {
        assert_eq!(outcome_lines(&SyncOutcome::NoChanges), vec!["No changes"]);
        assert_eq!(
            outcome_lines(&SyncOutcome::DryRun(vec!["a.json".into()])),
            vec!["Dry run, 1 dashboards would be updated:", "  a.json"]
        );

        let published = PublishedChange {
            commit_sha: "c0ffee".into(),
            branch: "update-grafana-dashboards".into(),
            pull_request_number: 7,
            pull_request_url: "https://github.com/acme/dashboards/pull/7".into(),
        };
        assert_eq!(
            outcome_lines(&SyncOutcome::Published(published)),
            vec!["Pull request created: https://github.com/acme/dashboards/pull/7"]
        );
    }

    #[tokio::test]
    async fn test_missing_grafana_flag_builds_no_clients() {
        let mut built = false;
        let args = CliArgs {
            grafana: None,
            ..complete_args()
        };

        let result = run_with(
            args,
            |name: &str| Some(format!("{name}-value")),
            |_: &SyncConfig| {
                built = true;
                Err(anyhow::anyhow!("clients must not be built"))
            },
        )
        .await;

        assert!(result.is_ok());
        assert!(!built);
    }

    #[tokio::test]
    async fn test_missing_github_token_builds_no_clients() {
        let mut built = false;

        let result = run_with(complete_args(), grafana_credentials_only, |_: &SyncConfig| {
            built = true;
            Err(anyhow::anyhow!("clients must not be built"))
        })
        .await;

        assert!(result.is_ok());
        assert!(!built);
        assert_eq!(grafana_credentials_only(GITHUB_TOKEN_ENV), None);
    }

    #[tokio::test]
    async fn test_complete_configuration_reaches_the_build_step() {
        let mut built = false;

        let result = run_with(
            complete_args(),
            |name: &str| Some(format!("{name}-value")),
            |_: &SyncConfig| {
                built = true;
                Err(anyhow::anyhow!("stop before any network call"))
            },
        )
        .await;

        assert!(result.is_err());
        assert!(built);
    }
}
