//! Setup pipeline: ordered steps, run sequentially, fail fast.
//!
//! cluster → [tls] → registry → image-build → image-deploy → verify
//!
//! The first failing step stops the run; its error comes back annotated with
//! the step name. Completed steps are not rolled back: re-running relies on
//! every collaborator operation being safe to re-apply.

use super::deps::SetupDeps;
use super::error::SetupError;
use super::steps::{
    ClusterStep, ImageBuildStep, ImageDeployStep, RegistryStep, TlsStep, VerifyStep,
};
use super::types::SetupContext;
use std::fmt;
use std::time::Instant;
use tracing::Span;

/// A named unit of the bootstrap pipeline.
pub trait Step {
    fn name(&self) -> &'static str;

    /// Run against the shared context. `log` is the step's span.
    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError>;
}

/// Build the step list from the plan alone.
pub fn build_steps(ctx: &SetupContext) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = vec![Box::new(ClusterStep)];
    if ctx.plan.tls_enabled {
        steps.push(Box::new(TlsStep));
    }
    steps.push(Box::new(RegistryStep));
    steps.push(Box::new(ImageBuildStep));
    steps.push(Box::new(ImageDeployStep));
    steps.push(Box::new(VerifyStep));
    steps
}

/// Build and execute the full pipeline for `ctx`.
pub fn run(log: &Span, deps: &dyn SetupDeps, ctx: &mut SetupContext) -> Result<(), SetupError> {
    Pipeline::new(ctx).execute(log, deps, ctx)
}

/// Where a pipeline is in its run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    /// Executing the step at this index.
    Running(usize),
    Completed,
    Failed {
        index: usize,
        step: &'static str,
        cause: String,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running(i) => write!(f, "running step {}", i),
            Self::Completed => write!(f, "completed"),
            Self::Failed { index, step, cause } => {
                write!(f, "failed at step {} ({}): {}", index, step, cause)
            }
        }
    }
}

/// An ordered step list plus its run state. Single use.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
    state: RunState,
}

impl Pipeline {
    pub fn new(ctx: &SetupContext) -> Self {
        Self::from_steps(build_steps(ctx))
    }

    pub fn from_steps(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            state: RunState::NotStarted,
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Run every step in order, stopping at the first failure.
    pub fn execute(
        &mut self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        if self.state != RunState::NotStarted {
            return Err(SetupError::Finished(self.state.to_string()));
        }

        let total = self.steps.len();
        let run_start = Instant::now();

        for (index, step) in self.steps.iter().enumerate() {
            self.state = RunState::Running(index);
            let name = step.name();
            let span = tracing::info_span!(parent: log, "step", name, index);
            tracing::info!(parent: &span, "[{}/{}] {}", index + 1, total, name);

            let step_start = Instant::now();
            let result = span.in_scope(|| step.run(&span, deps, ctx));
            let elapsed_ms = step_start.elapsed().as_millis() as u64;

            if let Err(e) = result {
                tracing::error!(parent: &span, elapsed_ms, "{} failed: {}", name, e);
                self.state = RunState::Failed {
                    index,
                    step: name,
                    cause: e.to_string(),
                };
                return Err(SetupError::Step {
                    step: name,
                    source: Box::new(e),
                });
            }
            tracing::info!(parent: &span, elapsed_ms, "{} completed", name);
        }

        self.state = RunState::Completed;
        tracing::info!(
            parent: log,
            steps = total,
            elapsed_ms = run_start.elapsed().as_millis() as u64,
            "setup complete"
        );
        Ok(())
    }
}
