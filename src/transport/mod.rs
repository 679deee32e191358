//! Transport abstraction: guarded construction of external process invocations.
//!
//! Every process launch goes through an [`Executor`]: the caller describes the
//! invocation as an [`ExecSpec`], the executor runs the supplied validators
//! against it, and only then hands back a [`Command`] that has not started yet.

pub mod local;
pub mod recording;
pub mod validate;

use std::fmt;
use std::fs::File;

pub use validate::Validator;

/// A prospective process invocation: binary name plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl ExecSpec {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ExecSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Errors raised while validating or running an external process.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// A validator vetoed the invocation; nothing was started.
    #[error("command rejected ({binary}): {reason}")]
    Rejected { binary: String, reason: String },

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary}: {context}: {source}")]
    Io {
        binary: String,
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited non-zero (-1 when killed by a signal).
    #[error("{binary} exited with code {code}: {stderr}")]
    Exit {
        binary: String,
        code: i32,
        stderr: String,
    },
}

impl ExecError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Where a redirected output stream goes.
#[derive(Debug, Default)]
pub enum Sink {
    /// Leave the stream to the command's default handling.
    #[default]
    Default,
    Inherit,
    Null,
    File(File),
}

/// What a command reads on stdin.
#[derive(Debug, Default)]
pub enum Source {
    #[default]
    Null,
    Inherit,
    File(File),
    Bytes(Vec<u8>),
}

/// Handle to a not-yet-started invocation. Every terminal method consumes it.
pub trait Command {
    /// The validated spec this command will launch.
    fn spec(&self) -> &ExecSpec;

    fn set_stdout(&mut self, sink: Sink);
    fn set_stderr(&mut self, sink: Sink);
    fn set_stdin(&mut self, source: Source);

    /// Run to completion, discarding stdout. Non-zero exit is an error.
    fn run(self: Box<Self>) -> Result<(), ExecError>;

    /// Run to completion and return stdout.
    fn output(self: Box<Self>) -> Result<String, ExecError>;

    /// Run to completion and return stdout and stderr interleaved.
    fn combined_output(self: Box<Self>) -> Result<String, ExecError>;
}

/// Factory for guarded commands.
pub trait Executor {
    /// Validate `spec` against every validator (first failure wins) and build
    /// a command for it. Never starts the process.
    fn command(
        &self,
        spec: ExecSpec,
        validators: &[&dyn Validator],
    ) -> Result<Box<dyn Command>, ExecError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn command(
        &self,
        spec: ExecSpec,
        validators: &[&dyn Validator],
    ) -> Result<Box<dyn Command>, ExecError> {
        (**self).command(spec, validators)
    }
}
