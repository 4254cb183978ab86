//! Ordered command sequences
//!
//! Used for the transform stage (load data, install dependencies, run
//! models, run tests) and for any stage that boils down to "run these
//! commands in this directory, stop on the first required failure".

use anyhow::Result;
use async_trait::async_trait;
use reviewflow_core::domain::step::{StageName, StepOutcome, StepResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::context::StepContext;
use crate::executor::StepExecutor;
use crate::process::{CommandSpec, ProcessError, format_bound, run_command, tail};

const STDOUT_TAIL_CHARS: usize = 300;
const STDERR_TAIL_CHARS: usize = 200;

/// One command of a sequence
#[derive(Debug, Clone)]
pub struct SequenceCommand {
    /// Short human name, e.g. `run models`
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// Whether a failure of this command fails the whole step
    pub required: bool,
    pub timeout: Duration,
}

impl SequenceCommand {
    pub fn required(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            required: true,
            timeout,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, program, args, timeout)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Succeeded,
    Failed,
    TimedOut,
    NotStarted,
}

/// What happened to one command, kept in the step detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub invocation: String,
    pub status: CommandStatus,
    pub exit_code: Option<i32>,
    pub duration_secs: f64,
    pub output: String,
}

/// Runs commands in order inside one working directory
pub struct CommandSequence {
    stage: StageName,
    workdir: Option<PathBuf>,
    commands: Vec<SequenceCommand>,
}

impl CommandSequence {
    pub fn new(stage: StageName, commands: Vec<SequenceCommand>) -> Self {
        Self {
            stage,
            workdir: None,
            commands,
        }
    }

    pub fn in_dir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn commands(&self) -> &[SequenceCommand] {
        &self.commands
    }

    fn spec_for(&self, command: &SequenceCommand) -> CommandSpec {
        let spec = CommandSpec::new(&command.program, command.args.clone(), command.timeout);
        match &self.workdir {
            Some(dir) => spec.cwd(dir),
            None => spec,
        }
    }

    fn success_message(&self) -> String {
        match self.stage {
            StageName::Transform => "Transformation completed successfully".to_string(),
            StageName::QualityTest => "Quality tests passed".to_string(),
            StageName::Ingestion => "Ingestion succeeded".to_string(),
        }
    }
}

#[async_trait]
impl StepExecutor for CommandSequence {
    fn stage(&self) -> StageName {
        self.stage
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let started = Instant::now();
        let mut records = Vec::with_capacity(self.commands.len());
        let mut warnings = Vec::new();
        let mut failure: Option<String> = None;

        for command in &self.commands {
            let spec = self.spec_for(command);
            let invocation = spec.display();
            ctx.log_info(format!("Running {}: {}", command.name, invocation));

            let (record, problem) = match run_command(&spec).await {
                Ok(output) => {
                    let ok = output.success();
                    let record = CommandRecord {
                        command: command.name.clone(),
                        invocation: invocation.clone(),
                        status: if ok {
                            CommandStatus::Succeeded
                        } else {
                            CommandStatus::Failed
                        },
                        exit_code: output.exit_code,
                        duration_secs: output.duration.as_secs_f64(),
                        output: tail(&output.stdout, STDOUT_TAIL_CHARS),
                    };
                    let problem = (!ok).then(|| {
                        format!(
                            "Failed {}: {}",
                            invocation,
                            tail(output.stderr.trim(), STDERR_TAIL_CHARS)
                        )
                    });
                    (record, problem)
                }
                Err(ProcessError::TimedOut { timeout, .. }) => (
                    CommandRecord {
                        command: command.name.clone(),
                        invocation: invocation.clone(),
                        status: CommandStatus::TimedOut,
                        exit_code: None,
                        duration_secs: timeout.as_secs_f64(),
                        output: String::new(),
                    },
                    Some(format!("{} timed out after {}", command.name, format_bound(timeout))),
                ),
                Err(e) => (
                    CommandRecord {
                        command: command.name.clone(),
                        invocation: invocation.clone(),
                        status: CommandStatus::NotStarted,
                        exit_code: None,
                        duration_secs: 0.0,
                        output: String::new(),
                    },
                    Some(format!("Failed {}: {}", invocation, e)),
                ),
            };
            records.push(record);

            match problem {
                None => ctx.log_info(format!("{} completed", command.name)),
                Some(problem) if command.required => {
                    ctx.log_error(&problem);
                    failure = Some(problem);
                    break;
                }
                Some(problem) => {
                    ctx.log_warning(format!("{} (continuing)", problem));
                    warnings.push(problem);
                }
            }
        }

        let (outcome, message) = match (failure, warnings.is_empty()) {
            (Some(problem), _) => (StepOutcome::Failed, problem),
            (None, true) => (StepOutcome::Success, self.success_message()),
            (None, false) => (
                StepOutcome::Warning,
                format!("{} with warnings: {}", self.success_message(), warnings.join("; ")),
            ),
        };

        let detail = serde_json::json!({ "commands": records });
        Ok(StepResult::new(self.stage, outcome, message)
            .with_duration(started.elapsed())
            .with_detail(detail))
    }
}
