//! Local process transport: the real, process-backed executor.

use super::validate::{check_all, Validator};
use super::{Command, ExecError, ExecSpec, Executor, Sink, Source};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Output, Stdio};

/// Spawns validated commands on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    working_dir: Option<PathBuf>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Executor for LocalExecutor {
    fn command(
        &self,
        spec: ExecSpec,
        validators: &[&dyn Validator],
    ) -> Result<Box<dyn Command>, ExecError> {
        if let Err(e) = check_all(&spec, validators) {
            tracing::warn!(command = %spec, "{}", e);
            return Err(e);
        }
        tracing::debug!(command = %spec, "command accepted");
        Ok(Box::new(LocalCommand {
            spec,
            working_dir: self.working_dir.clone(),
            stdout: Sink::Default,
            stderr: Sink::Default,
            stdin: Source::Null,
        }))
    }
}

/// A validated invocation of a local binary. Nothing runs until a terminal
/// method is called.
#[derive(Debug)]
pub struct LocalCommand {
    spec: ExecSpec,
    working_dir: Option<PathBuf>,
    stdout: Sink,
    stderr: Sink,
    stdin: Source,
}

impl LocalCommand {
    fn build(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.spec.name);
        cmd.args(&self.spec.args);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn(&self, mut cmd: std::process::Command) -> Result<Child, ExecError> {
        cmd.spawn().map_err(|e| ExecError::Spawn {
            binary: self.spec.name.clone(),
            source: e,
        })
    }

    fn io_error(&self, context: &'static str) -> impl FnOnce(std::io::Error) -> ExecError + '_ {
        move |source| ExecError::Io {
            binary: self.spec.name.clone(),
            context,
            source,
        }
    }

    /// Convert the configured stdin into a `Stdio`, keeping any bytes that
    /// must be written after spawn.
    fn take_stdin(&mut self) -> (Stdio, Option<Vec<u8>>) {
        match std::mem::take(&mut self.stdin) {
            Source::Null => (Stdio::null(), None),
            Source::Inherit => (Stdio::inherit(), None),
            Source::File(f) => (Stdio::from(f), None),
            Source::Bytes(b) => (Stdio::piped(), Some(b)),
        }
    }

    /// Write pending stdin bytes and close the pipe so the child sees EOF.
    /// A child that exits without reading everything is not a write failure:
    /// its exit status is reported by the caller instead.
    fn feed_stdin(&self, child: &mut Child, bytes: Option<Vec<u8>>) -> Result<(), ExecError> {
        let (Some(mut pipe), Some(bytes)) = (child.stdin.take(), bytes) else {
            return Ok(());
        };
        match pipe.write_all(&bytes) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            Err(e) => {
                drop(pipe);
                // Reap the child before bailing out.
                let _ = child.wait();
                Err(self.io_error("stdin write error")(e))
            }
        }
    }

    fn check_status(&self, output: &Output) -> Result<(), ExecError> {
        if output.status.success() {
            return Ok(());
        }
        Err(ExecError::Exit {
            binary: self.spec.name.clone(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn capture(mut self, stdout_default: Stdio) -> Result<Output, ExecError> {
        let (stdin, bytes) = self.take_stdin();
        let mut cmd = self.build();
        cmd.stdin(stdin);
        cmd.stdout(sink_to_stdio(std::mem::take(&mut self.stdout), stdout_default));
        cmd.stderr(sink_to_stdio(std::mem::take(&mut self.stderr), Stdio::piped()));

        let mut child = self.spawn(cmd)?;
        self.feed_stdin(&mut child, bytes)?;
        let output = child
            .wait_with_output()
            .map_err(self.io_error("wait error"))?;
        self.check_status(&output)?;
        Ok(output)
    }
}

fn sink_to_stdio(sink: Sink, default: Stdio) -> Stdio {
    match sink {
        Sink::Default => default,
        Sink::Inherit => Stdio::inherit(),
        Sink::Null => Stdio::null(),
        Sink::File(f) => Stdio::from(f),
    }
}

impl Command for LocalCommand {
    fn spec(&self) -> &ExecSpec {
        &self.spec
    }

    fn set_stdout(&mut self, sink: Sink) {
        self.stdout = sink;
    }

    fn set_stderr(&mut self, sink: Sink) {
        self.stderr = sink;
    }

    fn set_stdin(&mut self, source: Source) {
        self.stdin = source;
    }

    fn run(self: Box<Self>) -> Result<(), ExecError> {
        (*self).capture(Stdio::null()).map(|_| ())
    }

    fn output(mut self: Box<Self>) -> Result<String, ExecError> {
        // Output owns stdout; an earlier redirect would leave nothing to return.
        self.stdout = Sink::Default;
        let output = (*self).capture(Stdio::piped())?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn combined_output(mut self: Box<Self>) -> Result<String, ExecError> {
        let (stdin, bytes) = self.take_stdin();
        let (mut reader, writer) = std::io::pipe().map_err(self.io_error("pipe error"))?;
        let writer_clone = writer.try_clone().map_err(self.io_error("pipe error"))?;

        let mut cmd = self.build();
        cmd.stdin(stdin).stdout(writer_clone).stderr(writer);
        let mut child = self.spawn(cmd)?;
        // `cmd` was moved into spawn and dropped, so only the child holds the
        // write ends now and the read below terminates at exit.

        self.feed_stdin(&mut child, bytes)?;

        let mut combined = Vec::new();
        reader
            .read_to_end(&mut combined)
            .map_err(self.io_error("read error"))?;
        let status = child.wait().map_err(self.io_error("wait error"))?;
        let text = String::from_utf8_lossy(&combined).to_string();

        if status.success() {
            Ok(text)
        } else {
            Err(ExecError::Exit {
                binary: self.spec.name.clone(),
                code: status.code().unwrap_or(-1),
                stderr: text.trim().to_string(),
            })
        }
    }
}
