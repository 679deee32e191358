//! Setup errors.

use crate::transport::ExecError;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// A guarded process launch was rejected or failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// A collaborator operation failed for a reason other than process exit.
    #[error("{0}")]
    Dependency(String),

    /// A step ran before the step that owns `field` wrote it.
    #[error("{field} has not been set by an earlier step")]
    MissingOutput { field: &'static str },

    #[error("template error in {path}: {message}")]
    Template { path: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    /// The pipeline already reached a terminal state.
    #[error("pipeline already finished: {0}")]
    Finished(String),

    #[error("step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<SetupError>,
    },
}

impl SetupError {
    /// Name of the failing step, if this error came out of the runner.
    pub fn step_name(&self) -> Option<&'static str> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The innermost error beneath any step annotations.
    pub fn root_cause(&self) -> &SetupError {
        match self {
            Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self.root_cause(), Self::Exec(e) if e.is_rejection())
    }
}
