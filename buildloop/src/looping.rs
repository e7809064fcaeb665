//! Loop controller: plan, build, parse, apply, pause, repeat.
//!
//! The controller is a two-state machine. It starts `Running` once the state
//! documents are bootstrapped and becomes `Stopped` when the stop signal is seen
//! at a pause, or when an iteration fails. The pause is the only place the stop
//! signal is observed; gateway calls always run to completion.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::core::action::{Action, ActionKind, parse_response};
use crate::core::preview::preview;
use crate::io::config::LoopConfig;
use crate::io::gateway::Gateway;
use crate::io::iteration_log::{IterationMeta, IterationWriteRequest, write_iteration};
use crate::io::prompt::PromptEngine;
use crate::io::state_store::{ApplyOutcome, StateStore};
use crate::stop::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Summary of one completed iteration, handed to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    /// Iteration number (1-indexed).
    pub iteration: u64,
    /// Plan text truncated for display.
    pub plan_preview: String,
    pub action: ActionKind,
    pub outcome: ApplyOutcome,
    pub duration: Duration,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub iterations: u64,
    /// Iterations whose action changed something on disk.
    pub actions_applied: u64,
    pub state: LoopState,
}

pub struct LoopController<G: Gateway> {
    config: LoopConfig,
    store: StateStore,
    prompts: PromptEngine,
    gateway: G,
    stop: StopSignal,
    iteration: u64,
    actions_applied: u64,
    state: LoopState,
}

impl<G: Gateway> LoopController<G> {
    /// Validate `config`, bootstrap the state documents under `root`, and enter
    /// `Running`.
    pub fn new(root: &Path, config: LoopConfig, gateway: G, stop: StopSignal) -> Result<Self> {
        config.validate()?;
        let store = StateStore::new(root, &config);
        store.bootstrap().context("bootstrap state documents")?;
        let prompts = PromptEngine::new()?;
        Ok(Self {
            config,
            store,
            prompts,
            gateway,
            stop,
            iteration: 0,
            actions_applied: 0,
            state: LoopState::Running,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn outcome(&self) -> LoopOutcome {
        LoopOutcome {
            iterations: self.iteration,
            actions_applied: self.actions_applied,
            state: self.state,
        }
    }

    /// Run iterations until the stop signal is seen at a pause.
    ///
    /// Stops immediately on any iteration error (read, gateway, write) and
    /// returns it; the controller is `Stopped` afterwards either way.
    pub async fn run<F: FnMut(&IterationReport)>(
        &mut self,
        mut on_iteration: F,
    ) -> Result<LoopOutcome> {
        while self.state == LoopState::Running {
            match self.run_iteration().await {
                Ok(report) => on_iteration(&report),
                Err(err) => {
                    self.state = LoopState::Stopped;
                    return Err(err);
                }
            }
            self.state = self.pause().await;
        }
        info!(
            iterations = self.iteration,
            actions_applied = self.actions_applied,
            "loop stopped"
        );
        Ok(self.outcome())
    }

    /// Execute one plan -> build -> parse -> apply cycle without pausing.
    #[instrument(skip_all, fields(iteration = self.iteration + 1))]
    pub async fn run_iteration(&mut self) -> Result<IterationReport> {
        if self.state == LoopState::Stopped {
            bail!("loop is stopped");
        }
        let started = Instant::now();
        self.iteration += 1;
        let iteration = self.iteration;

        let docs = self.store.read()?;

        let plan_prompt = self.prompts.render_plan(&docs)?;
        let plan = self
            .gateway
            .complete(&plan_prompt, self.config.plan_max_tokens)
            .await
            .with_context(|| format!("plan request (iteration {iteration})"))?;
        let plan_preview = preview(plan.trim(), self.config.plan_preview_chars);
        debug!(plan = %plan_preview, "received plan");

        let build_prompt = self.prompts.render_build(&docs.current, &plan)?;
        let build = self
            .gateway
            .complete(&build_prompt, self.config.build_max_tokens)
            .await
            .with_context(|| format!("build request (iteration {iteration})"))?;

        let action = parse_response(&build);
        let outcome = self
            .store
            .apply(&action, iteration)
            .with_context(|| format!("apply iteration {iteration}"))?;
        if outcome.is_applied() {
            self.actions_applied += 1;
        }
        let duration = started.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        if let Some(dir) = self.store.transcript_dir() {
            let meta = IterationMeta {
                iteration,
                action: action.kind(),
                artifact: artifact_name(&action),
                outcome: outcome.summary(),
                duration_ms,
            };
            write_iteration(&IterationWriteRequest {
                transcript_dir: dir,
                meta: &meta,
                plan: &plan,
                build: &build,
            })?;
        }

        info!(
            action = action.kind().as_str(),
            outcome = %outcome.summary(),
            duration_ms,
            "iteration complete"
        );
        Ok(IterationReport {
            iteration,
            plan_preview,
            action: action.kind(),
            outcome,
            duration,
        })
    }

    /// Wait out the configured pause unless a stop is (or already was) raised.
    async fn pause(&mut self) -> LoopState {
        let pause = self.config.pause();
        tokio::select! {
            biased;
            _ = self.stop.stopped() => LoopState::Stopped,
            _ = tokio::time::sleep(pause) => LoopState::Running,
        }
    }
}

fn artifact_name(action: &Action) -> Option<String> {
    match action {
        Action::CreateFile { name, .. } => Some(name.clone()),
        Action::ReplaceCurrentState { .. } | Action::Noop => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop::stop_channel;
    use crate::test_support::{ScriptedGateway, ScriptedReply, fast_config};
    use std::fs;
    use std::path::PathBuf;

    #[tokio::test]
    async fn construction_bootstraps_and_enters_running() {
        let temp = tempfile::tempdir().expect("tempdir");
        let controller = LoopController::new(
            temp.path(),
            fast_config(),
            ScriptedGateway::new(Vec::new()),
            StopSignal::never(),
        )
        .expect("controller");

        assert_eq!(controller.state(), LoopState::Running);
        assert_eq!(controller.iteration(), 0);
        assert!(controller.store().target_path().is_file());
        assert!(controller.store().current_path().is_file());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_bootstrap() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = LoopConfig {
            plan_max_tokens: 0,
            ..fast_config()
        };
        let result = LoopController::new(
            temp.path(),
            config,
            ScriptedGateway::new(Vec::new()),
            StopSignal::never(),
        );

        assert!(result.is_err());
        assert!(!temp.path().join("target.md").exists());
    }

    #[tokio::test]
    async fn plan_and_build_requests_are_ordered_and_chained() {
        let temp = tempfile::tempdir().expect("tempdir");
        let gateway = ScriptedGateway::new(vec![
            ScriptedReply::text("Create hello.txt with a greeting."),
            ScriptedReply::text("FILE: hello.txt\nhi"),
        ]);
        let mut controller =
            LoopController::new(temp.path(), fast_config(), gateway.clone(), StopSignal::never())
                .expect("controller");

        let report = controller.run_iteration().await.expect("iteration");

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].max_output_tokens, 1000);
        assert!(calls[0].prompt.contains("Target state:"));
        assert_eq!(calls[1].max_output_tokens, 4000);
        assert!(
            calls[1]
                .prompt
                .contains("Build this: Create hello.txt with a greeting.")
        );
        assert!(!calls[1].prompt.contains("Target state:"));
        assert_eq!(report.iteration, 1);
        assert_eq!(report.action, ActionKind::CreateFile);
        assert_eq!(
            fs::read_to_string(temp.path().join("hello.txt")).expect("read"),
            "hi"
        );
    }

    #[tokio::test]
    async fn plan_preview_is_truncated_for_display_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let long_plan = "x".repeat(300);
        let gateway = ScriptedGateway::new(vec![
            ScriptedReply::text(long_plan.clone()),
            ScriptedReply::text("I don't know"),
        ]);
        let mut controller =
            LoopController::new(temp.path(), fast_config(), gateway.clone(), StopSignal::never())
                .expect("controller");

        let report = controller.run_iteration().await.expect("iteration");

        assert_eq!(report.plan_preview, format!("{}...", "x".repeat(200)));
        assert!(gateway.calls()[1].prompt.contains(&long_plan));
    }

    #[tokio::test]
    async fn gateway_failure_stops_the_loop_with_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let gateway = ScriptedGateway::new(vec![
            ScriptedReply::text("Add a README."),
            ScriptedReply::fail("connection reset"),
        ]);
        let mut controller =
            LoopController::new(temp.path(), fast_config(), gateway, StopSignal::never())
                .expect("controller");

        let err = controller.run(|_| {}).await.unwrap_err();

        assert!(format!("{err:#}").contains("build request (iteration 1)"));
        assert!(format!("{err:#}").contains("connection reset"));
        assert_eq!(controller.state(), LoopState::Stopped);
        assert_eq!(controller.outcome().actions_applied, 0);
        assert!(controller.run_iteration().await.is_err());
    }

    #[tokio::test]
    async fn transcript_is_written_when_configured() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (handle, signal) = stop_channel();
        let gateway = ScriptedGateway::new(vec![
            ScriptedReply::text("Write the state summary."),
            ScriptedReply::text_then_stop("UPDATE_CURRENT: Summary."),
        ])
        .with_stop(handle);
        let config = LoopConfig {
            transcript_dir: Some(PathBuf::from(".buildloop")),
            ..fast_config()
        };
        let mut controller =
            LoopController::new(temp.path(), config, gateway, signal).expect("controller");

        controller.run(|_| {}).await.expect("run");

        let dir = temp.path().join(".buildloop/1");
        assert_eq!(
            fs::read_to_string(dir.join("plan.md")).expect("plan"),
            "Write the state summary."
        );
        assert_eq!(
            fs::read_to_string(dir.join("build.md")).expect("build"),
            "UPDATE_CURRENT: Summary."
        );
        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("meta.json")).expect("meta"))
                .expect("meta json");
        assert_eq!(meta["action"], "replace_current_state");
        assert!(meta["duration_ms"].is_u64());
    }

    #[test]
    fn artifact_name_only_for_create_file() {
        let create = Action::CreateFile {
            name: "a.md".to_string(),
            content: String::new(),
        };
        assert_eq!(artifact_name(&create), Some("a.md".to_string()));
        assert_eq!(artifact_name(&Action::Noop), None);
    }
}
