//! Helmsman
//!
//! Automated change pipeline: turns a requirement document into a pushed
//! branch, a triggered build, and a notified team.
//!
//! Architecture:
//! - Analyzer: derives a structured change plan from the document
//! - Source control: clones, branches, applies and pushes the plan
//! - Build poller: triggers the build job and waits it out
//! - Monitoring session: mirrors stage progress to the monitoring backend
//! - Notification fan-out: reports the final status on every channel

mod analyzer;
mod config;
mod git;
mod monitor;
mod orchestrator;
mod poller;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::analyzer::CompletionAnalyzer;
use crate::config::Config;
use crate::git::GitCli;
use crate::monitor::MonitoringSession;
use crate::orchestrator::{BuildTarget, Orchestrator};
use crate::poller::BuildPoller;
use helmsman_client::{AnalyzerClient, BuildServerClient, MonitorClient};
use helmsman_notify::{
    ChatWebhookChannel, EmailChannel, MsgWebhookChannel, NotificationChannel,
    NotificationDispatcher,
};

#[derive(Parser)]
#[command(name = "helmsman")]
#[command(about = "Automated change pipeline", long_about = None)]
struct Cli {
    /// Project name, used in notifications and the monitoring session
    #[arg(short, long, env = "HELMSMAN_PROJECT")]
    project: String,

    /// Repository URL to apply the change plan to
    #[arg(short, long, env = "HELMSMAN_REPO_URL")]
    repo: String,

    /// Build job to trigger after the push; omit to skip the build stage
    #[arg(short, long, env = "HELMSMAN_BUILD_JOB")]
    job: Option<String>,

    /// Requirement document file; reads stdin when omitted
    #[arg(short, long)]
    doc: Option<PathBuf>,

    /// Run without a monitoring session
    #[arg(long)]
    no_monitor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helmsman=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("configuration error")?;

    let document = read_document(cli.doc.as_deref())?;
    if document.trim().is_empty() {
        bail!("requirement document is empty");
    }

    let run_id = uuid::Uuid::new_v4();
    info!(
        "Starting helmsman for project '{}' (run {})",
        cli.project, run_id
    );

    let analyzer = Arc::new(CompletionAnalyzer::new(AnalyzerClient::new(
        &config.analyzer_url,
        &config.analyzer_api_key,
    )));

    let source = Arc::new(
        GitCli::new(&cli.repo, &config.git_username, &config.git_token)
            .context("could not prepare the git workspace")?,
    );

    let build = match &cli.job {
        Some(job) => {
            if !config.has_build_server() {
                bail!("--job requires HELMSMAN_BUILD_URL to be set");
            }
            let client = BuildServerClient::connect(
                &config.build_url,
                &config.build_user,
                &config.build_token,
            )
            .await;
            Some(BuildTarget {
                job: job.clone(),
                poller: BuildPoller::new(Arc::new(client), config.poll.clone()),
            })
        }
        None => None,
    };

    let session = open_session(&cli, &config, run_id).await;
    let dispatcher = NotificationDispatcher::new(channels(&config));

    let mut orchestrator = Orchestrator::new(
        &cli.project,
        &config.environment,
        &config.default_branch,
        analyzer,
        source,
        build,
        dispatcher,
        session,
    );

    let result = orchestrator.run(&document).await;

    if result.success {
        println!(
            "{} Pipeline completed in {}s",
            "✓".green(),
            result.duration_seconds
        );
        Ok(())
    } else {
        println!(
            "{} Pipeline failed at {}: {}",
            "✗".red(),
            result.stage.as_deref().unwrap_or("unknown"),
            result.error.as_deref().unwrap_or("no error recorded")
        );
        std::process::exit(1);
    }
}

fn read_document(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("could not read document '{}'", path.display())),
        None => {
            let mut document = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut document)
                .context("could not read document from stdin")?;
            Ok(document)
        }
    }
}

async fn open_session(cli: &Cli, config: &Config, run_id: uuid::Uuid) -> MonitoringSession {
    if cli.no_monitor {
        info!("Monitoring disabled by flag");
        return MonitoringSession::disabled();
    }
    if !config.has_monitor() {
        warn!("HELMSMAN_MONITOR_URL not set, running without monitoring");
        return MonitoringSession::disabled();
    }

    let client = MonitorClient::new(&config.monitor_url, &config.monitor_api_key);
    MonitoringSession::open(
        Arc::new(client),
        &cli.project,
        "change-pipeline",
        &format!("automated change pipeline run {run_id}"),
    )
    .await
}


fn channels(config: &Config) -> Vec<Box<dyn NotificationChannel>> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    if let Some(url) = &config.chat_webhook {
        channels.push(Box::new(ChatWebhookChannel::new("chat", url)));
    }
    if let Some(url) = &config.msg_webhook {
        channels.push(Box::new(MsgWebhookChannel::new("wecom", url)));
    }
    if let Some(email) = &config.email {
        channels.push(Box::new(EmailChannel::new("email", email.clone())));
    }
    if channels.is_empty() {
        warn!("No notification channels configured");
    }
    channels
}
