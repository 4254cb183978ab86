use reviewflow_core::domain::run::{PipelineRun, RunError};
use reviewflow_core::domain::step::{StageName, StagePolicy, StepResult};
use reviewflow_notify::{FanoutNotifier, Notifier};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::context::{RunLog, StepContext, TracingRunLog};
use crate::executor::StepExecutor;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid pipeline plan: {0}")]
    InvalidPlan(String),

    /// An executor returned an error instead of a step result. The run was
    /// finalized as failed and notified before this is returned.
    #[error("stage {stage} aborted")]
    StageAborted {
        stage: StageName,
        run: Box<PipelineRun>,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Run(#[from] RunError),
}

/// One planned stage
pub struct Stage {
    pub name: StageName,
    pub policy: StagePolicy,
    pub executor: Arc<dyn StepExecutor>,
}

/// Runs stages in order and notifies once per run
///
/// Holds no state between runs: every call to [`Orchestrator::run`] starts
/// from a fresh [`PipelineRun`].
pub struct Orchestrator {
    run_prefix: String,
    stages: Vec<Stage>,
    notifier: Arc<dyn Notifier>,
    log: Arc<dyn RunLog>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Planned stages, in execution order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Executes one run
    ///
    /// Returns the finalized run whether it succeeded or failed. `Err` only
    /// when an executor itself errored; the run carried by
    /// [`OrchestratorError::StageAborted`] is finalized and already notified.
    pub async fn run(&self) -> Result<PipelineRun, OrchestratorError> {
        let mut run = PipelineRun::start(&self.run_prefix);
        let ctx = StepContext::new(run.id(), Arc::clone(&self.log));

        info!(run_id = run.id(), "Starting pipeline with {} stages", self.stages.len());
        ctx.log_info(format!("Starting pipeline {}", run.id()));

        let mut aborted = None;

        for (idx, stage) in self.stages.iter().enumerate() {
            ctx.log_info(format!(
                "STEP {}/{}: {}",
                idx + 1,
                self.stages.len(),
                stage.name
            ));

            let step = match stage.executor.execute(&ctx).await {
                Ok(step) if step.name() != stage.name => {
                    warn!(
                        "Executor for {} reported step {}, relabelling",
                        stage.name,
                        step.name()
                    );
                    step.relabel(stage.name)
                }
                Ok(step) => step,
                Err(e) => {
                    error!(run_id = run.id(), "Stage {} aborted: {:#}", stage.name, e);
                    let step =
                        StepResult::failed(stage.name, format!("{} aborted: {:#}", stage.name, e));
                    aborted = Some((stage.name, e));
                    step
                }
            };

            self.log_step(&ctx, stage, &step);
            let blocking_failure =
                step.outcome().is_failed() && stage.policy == StagePolicy::Blocking;
            let message = step.message().to_string();
            run.record_step(step)?;

            if aborted.is_some() || blocking_failure {
                run.fail(message)?;
                break;
            }
        }

        if !run.is_finalized() {
            run.succeed()?;
        }

        ctx.log_info(format!("Pipeline finished: {}", run.overall_status()));
        info!(run_id = run.id(), "Pipeline finished: {}", run.overall_status());

        self.notify(&ctx, &run).await;

        match aborted {
            Some((stage, source)) => Err(OrchestratorError::StageAborted {
                stage,
                run: Box::new(run),
                source,
            }),
            None => Ok(run),
        }
    }

    fn log_step(&self, ctx: &StepContext, stage: &Stage, step: &StepResult) {
        let line = format!("{}: {} - {}", stage.name, step.outcome(), step.message());
        match (step.outcome().is_failed(), stage.policy) {
            (false, _) => ctx.log_info(line),
            (true, StagePolicy::NonBlocking) => ctx.log_warning(format!("{} (non-blocking)", line)),
            (true, StagePolicy::Blocking) => ctx.log_error(line),
        }
    }

    async fn notify(&self, ctx: &StepContext, run: &PipelineRun) {
        if let Err(e) = self.notifier.notify(run).await {
            error!(run_id = run.id(), "Notification error: {}", e);
            ctx.log_error(format!("Notification error: {}", e));
        }
    }
}

/// Builds an [`Orchestrator`] from registered stages
pub struct OrchestratorBuilder {
    run_prefix: String,
    stages: Vec<Stage>,
    notifier: Option<Arc<dyn Notifier>>,
    log: Option<Arc<dyn RunLog>>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            run_prefix: "pipeline".to_string(),
            stages: Vec::new(),
            notifier: None,
            log: None,
        }
    }
}

impl OrchestratorBuilder {
    pub fn run_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_prefix = prefix.into();
        self
    }

    /// Registers an executor under its stage's default policy
    pub fn stage<E: StepExecutor + 'static>(self, executor: E) -> Self {
        let policy = executor.stage().default_policy();
        self.stage_with_policy(executor, policy)
    }

    pub fn stage_with_policy<E: StepExecutor + 'static>(
        mut self,
        executor: E,
        policy: StagePolicy,
    ) -> Self {
        self.stages.push(Stage {
            name: executor.stage(),
            policy,
            executor: Arc::new(executor),
        });
        self
    }

    /// Registers an already shared executor
    pub fn shared_stage(mut self, executor: Arc<dyn StepExecutor>, policy: StagePolicy) -> Self {
        self.stages.push(Stage {
            name: executor.stage(),
            policy,
            executor,
        });
        self
    }

    /// Notifier called once per run; defaults to no channels
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run log; defaults to [`TracingRunLog`]
    pub fn log(mut self, log: Arc<dyn RunLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(mut self) -> Result<Orchestrator, OrchestratorError> {
        if self.stages.is_empty() {
            return Err(OrchestratorError::InvalidPlan("no stages registered".to_string()));
        }
        if self.run_prefix.trim().is_empty() {
            return Err(OrchestratorError::InvalidPlan("run prefix cannot be empty".to_string()));
        }

        self.stages.sort_by_key(|stage| stage.name.position());
        if let Some(pair) = self.stages.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(OrchestratorError::InvalidPlan(format!(
                "stage {} registered twice",
                pair[0].name
            )));
        }

        Ok(Orchestrator {
            run_prefix: self.run_prefix,
            stages: self.stages,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(FanoutNotifier::new())),
            log: self.log.unwrap_or_else(|| Arc::new(TracingRunLog)),
        })
    }
}
