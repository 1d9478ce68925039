//! Pipeline orchestrator
//!
//! Runs the four stages in order: Analyze, SourceChange, Build, Notify.
//! A failing stage aborts the remaining work stages, but notification and
//! session teardown always run, and their own failures never overwrite
//! the stage error that caused the abort.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::analyzer::RequirementAnalyzer;
use crate::git::SourceControl;
use crate::monitor::MonitoringSession;
use crate::poller::{BuildPoller, PollError};

use helmsman_core::domain::build::BuildStatus;
use helmsman_core::domain::notification::{NotificationEvent, Verdict};
use helmsman_core::domain::pipeline::PipelineResult;
use helmsman_core::domain::plan::ChangePlan;
use helmsman_core::domain::stage::{LogLevel, SessionStatus, StageHandle, StageStatus};
use helmsman_notify::NotificationDispatcher;

/// Parameter name carrying the pushed branch into the build
const BRANCH_PARAM: &str = "BRANCH";

/// The build job the pipeline should trigger, with its poller
#[derive(Clone)]
pub struct BuildTarget {
    pub job: String,
    pub poller: BuildPoller,
}

/// A stage failure that aborts the run
#[derive(Debug)]
struct StageError {
    stage: &'static str,
    message: String,
}

impl StageError {
    fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Drives one requirement document through the full pipeline
pub struct Orchestrator {
    project: String,
    environment: String,
    base_branch: String,
    analyzer: Arc<dyn RequirementAnalyzer>,
    source: Arc<dyn SourceControl>,
    build: Option<BuildTarget>,
    dispatcher: NotificationDispatcher,
    session: MonitoringSession,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: impl Into<String>,
        environment: impl Into<String>,
        base_branch: impl Into<String>,
        analyzer: Arc<dyn RequirementAnalyzer>,
        source: Arc<dyn SourceControl>,
        build: Option<BuildTarget>,
        dispatcher: NotificationDispatcher,
        session: MonitoringSession,
    ) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
            base_branch: base_branch.into(),
            analyzer,
            source,
            build,
            dispatcher,
            session,
        }
    }

    /// The monitoring session, for inspection after a run
    pub fn session(&self) -> &MonitoringSession {
        &self.session
    }

    /// Runs the pipeline for one requirement document
    pub async fn run(&mut self, document: &str) -> PipelineResult {
        let started = std::time::Instant::now();
        info!("Starting change pipeline for project '{}'", self.project);
        self.session
            .set_status(SessionStatus::Running, "pipeline started")
            .await;

        let outcome = self.execute(document).await;
        let duration = started.elapsed().as_secs();

        match outcome {
            Ok(()) => {
                self.notify_stage("success", duration).await;
                self.session
                    .close(
                        SessionStatus::Success,
                        &format!("pipeline completed in {duration}s"),
                    )
                    .await;
                info!("Pipeline completed in {}s", duration);
                PipelineResult::succeeded(duration)
            }
            Err(stage_err) => {
                self.notify_stage("failure", duration).await;
                self.session
                    .close(
                        SessionStatus::Failed,
                        &format!(
                            "pipeline failed at {}: {}",
                            stage_err.stage, stage_err.message
                        ),
                    )
                    .await;
                error!(
                    "Pipeline failed at stage {}: {}",
                    stage_err.stage, stage_err.message
                );
                PipelineResult::failed(stage_err.stage, stage_err.message, duration)
            }
        }
    }

    async fn execute(&mut self, document: &str) -> Result<(), StageError> {
        let plan = self.analyze_stage(document).await?;
        let branch = self.source_change_stage(&plan).await?;
        if self.build.is_some() {
            self.build_stage(&plan, &branch).await?;
        } else {
            info!("No build job configured, skipping the build stage");
        }
        Ok(())
    }

    async fn analyze_stage(&mut self, document: &str) -> Result<ChangePlan, StageError> {
        let handle = self
            .session
            .begin_stage("Analyze", "derive a change plan from the requirement document")
            .await;
        self.log(
            LogLevel::Info,
            "Analyzing requirement document",
            Some(&handle),
        )
        .await;

        match self.analyzer.analyze(document).await {
            Ok(plan) => {
                let summary = format!(
                    "plan covers {} file(s): {}",
                    plan.files_to_modify.len(),
                    plan.summary.as_deref().unwrap_or("no summary"),
                );
                self.session
                    .end_stage(&handle, StageStatus::Success, &summary)
                    .await;
                Ok(plan)
            }
            Err(e) => {
                let message = e.to_string();
                self.session
                    .end_stage(&handle, StageStatus::Failed, &message)
                    .await;
                Err(StageError::new("Analyze", message))
            }
        }
    }

    /// Applies the plan to the repository and returns the pushed branch
    ///
    /// The branch name is generated here, once, and threaded through to
    /// the build stage; nothing downstream re-derives it.
    async fn source_change_stage(&mut self, plan: &ChangePlan) -> Result<String, StageError> {
        let handle = self
            .session
            .begin_stage("SourceChange", "apply the change plan to the repository")
            .await;

        let branch = format!("feature/auto-update-{}", chrono::Utc::now().timestamp());
        if let Some(strategy) = &plan.git_strategy {
            self.log(
                LogLevel::Info,
                &format!("Git strategy: {strategy}"),
                Some(&handle),
            )
            .await;
        }

        let result = self.apply_plan(plan, &branch, &handle).await;
        match result {
            Ok(()) => {
                self.session
                    .end_stage(
                        &handle,
                        StageStatus::Success,
                        &format!("pushed branch '{branch}'"),
                    )
                    .await;
                Ok(branch)
            }
            Err(message) => {
                self.session
                    .end_stage(&handle, StageStatus::Failed, &message)
                    .await;
                Err(StageError::new("SourceChange", message))
            }
        }
    }

    async fn apply_plan(
        &mut self,
        plan: &ChangePlan,
        branch: &str,
        handle: &StageHandle,
    ) -> Result<(), String> {
        self.source
            .clone_repo(&self.base_branch)
            .await
            .map_err(|e| format!("clone failed: {e}"))?;
        self.source
            .create_branch(branch, &self.base_branch)
            .await
            .map_err(|e| format!("branch creation failed: {e}"))?;

        if plan.file_changes.is_empty() {
            self.log(
                LogLevel::Warning,
                "Change plan contains no file contents",
                Some(handle),
            )
            .await;
        } else {
            self.source
                .apply_changes(&plan.file_changes)
                .await
                .map_err(|e| format!("applying changes failed: {e}"))?;
        }

        self.source
            .commit(&plan.commit_message())
            .await
            .map_err(|e| format!("commit failed: {e}"))?;
        self.source
            .push(branch)
            .await
            .map_err(|e| format!("push failed: {e}"))?;
        Ok(())
    }

    async fn build_stage(&mut self, plan: &ChangePlan, branch: &str) -> Result<(), StageError> {
        let Some(target) = self.build.clone() else {
            return Ok(());
        };

        let handle = self
            .session
            .begin_stage("Build", "trigger the build job and wait for its result")
            .await;

        let mut params = plan.build_params.clone();
        params
            .entry(BRANCH_PARAM.to_string())
            .or_insert_with(|| branch.to_string());

        self.log(
            LogLevel::Info,
            &format!("Triggering build job '{}'", target.job),
            Some(&handle),
        )
        .await;

        let result = self.run_build(&target, &params, &handle).await;
        match result {
            Ok(BuildOutcome::Succeeded(number)) => {
                self.session
                    .end_stage(
                        &handle,
                        StageStatus::Success,
                        &format!("build #{number} succeeded"),
                    )
                    .await;
                Ok(())
            }
            Ok(BuildOutcome::TimedOut(number)) => {
                self.session
                    .end_stage(
                        &handle,
                        StageStatus::Warning,
                        &format!("build #{number} still running at the deadline"),
                    )
                    .await;
                Ok(())
            }
            Err(message) => {
                self.session
                    .end_stage(&handle, StageStatus::Failed, &message)
                    .await;
                Err(StageError::new("Build", message))
            }
        }
    }

    async fn run_build(
        &mut self,
        target: &BuildTarget,
        params: &BTreeMap<String, String>,
        handle: &StageHandle,
    ) -> Result<BuildOutcome, String> {
        let queued = target
            .poller
            .trigger(&target.job, params)
            .await
            .map_err(|e| e.to_string())?;
        let build = target
            .poller
            .resolve(&target.job, &queued)
            .await
            .map_err(|e| e.to_string())?;

        self.log(
            LogLevel::Info,
            &format!("Build #{} scheduled, waiting for completion", build.number),
            Some(handle),
        )
        .await;

        match target.poller.await_completion(&build).await {
            Ok(BuildStatus::Success) => Ok(BuildOutcome::Succeeded(build.number)),
            Ok(status) => {
                if let Some(tail) = target.poller.console_tail(&build).await {
                    self.log(
                        LogLevel::Error,
                        &format!("Console tail of build #{}:\n{}", build.number, tail),
                        Some(handle),
                    )
                    .await;
                }
                Err(format!("build #{} finished with {}", build.number, status))
            }
            // A slow build is a warning, not a pipeline failure
            Err(PollError::Timeout { timeout }) => {
                warn!(
                    "Build #{} did not finish within {:?}, continuing",
                    build.number, timeout
                );
                Ok(BuildOutcome::TimedOut(build.number))
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Reports the final status through every configured channel
    ///
    /// The notification outcome shapes this stage's status only; it never
    /// alters the pipeline result.
    async fn notify_stage(&mut self, status: &str, duration: u64) {
        let handle = self
            .session
            .begin_stage("Notify", "report the final status to every channel")
            .await;

        let details = format!(
            "Duration: {}m{}s\nResult: {}",
            duration / 60,
            duration % 60,
            status
        );
        let event = NotificationEvent::new(&self.project, &self.environment, status, details);
        let outcome = self.dispatcher.dispatch(&event, None).await;

        let summary = format!(
            "{}/{} channel(s) delivered",
            outcome.succeeded(),
            outcome.attempted()
        );
        let stage_status = match outcome.verdict() {
            Verdict::AllSucceeded => StageStatus::Success,
            Verdict::PartialSuccess => StageStatus::Warning,
            Verdict::AllFailed => StageStatus::Failed,
        };
        self.session.end_stage(&handle, stage_status, &summary).await;
    }

    async fn log(&self, level: LogLevel, message: &str, stage: Option<&StageHandle>) {
        match level {
            LogLevel::Error => error!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            _ => info!("{}", message),
        }
        self.session.append_log(message, level, stage).await;
    }
}

enum BuildOutcome {
    Succeeded(u32),
    TimedOut(u32),
}
