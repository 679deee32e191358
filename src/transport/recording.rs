//! Recording transport: same contract as the local executor, no processes.
//!
//! Every accepted spec is appended to a shared history and answered with a
//! canned result. Rejected specs are not recorded. Clones share the history,
//! so a test can keep one handle while the code under test owns another.

use super::validate::{check_all, Validator};
use super::{Command, ExecError, ExecSpec, Executor, Sink, Source};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

/// Result returned by a recorded command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CannedResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CannedResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }
}

/// One accepted invocation, plus any bytes it was given on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub spec: ExecSpec,
    pub stdin: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<RecordedCall>,
    canned: HashMap<String, CannedResult>,
}

impl Recorder {
    /// `"<name> <first arg>"` wins over `"<name>"`; unknown commands succeed silently.
    fn lookup(&self, spec: &ExecSpec) -> CannedResult {
        spec.args
            .first()
            .and_then(|first| self.canned.get(&format!("{} {}", spec.name, first)))
            .or_else(|| self.canned.get(&spec.name))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    recorder: Rc<RefCell<Recorder>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands matching `key` (`"kubectl"` or `"kubectl get"`) with `result`.
    pub fn respond(&self, key: impl Into<String>, result: CannedResult) -> &Self {
        self.recorder.borrow_mut().canned.insert(key.into(), result);
        self
    }

    pub fn len(&self) -> usize {
        self.recorder.borrow().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accepted specs in call order.
    pub fn history(&self) -> Vec<ExecSpec> {
        self.recorder
            .borrow()
            .calls
            .iter()
            .map(|c| c.spec.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.recorder.borrow().calls.clone()
    }

    pub fn calls_to(&self, name: &str) -> Vec<ExecSpec> {
        self.recorder
            .borrow()
            .calls
            .iter()
            .filter(|c| c.spec.name == name)
            .map(|c| c.spec.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recorder.borrow().calls.iter().any(|c| c.spec.name == name)
    }

    pub fn stdin_of(&self, index: usize) -> Option<Vec<u8>> {
        self.recorder
            .borrow()
            .calls
            .get(index)
            .and_then(|c| c.stdin.clone())
    }

    /// Clear the history. Canned responses are kept.
    pub fn reset(&self) {
        self.recorder.borrow_mut().calls.clear();
    }
}

impl Executor for RecordingExecutor {
    fn command(
        &self,
        spec: ExecSpec,
        validators: &[&dyn Validator],
    ) -> Result<Box<dyn Command>, ExecError> {
        check_all(&spec, validators)?;
        let mut recorder = self.recorder.borrow_mut();
        let result = recorder.lookup(&spec);
        recorder.calls.push(RecordedCall {
            spec: spec.clone(),
            stdin: None,
        });
        let index = recorder.calls.len() - 1;
        Ok(Box::new(RecordingCommand {
            spec,
            index,
            result,
            recorder: Rc::clone(&self.recorder),
            stdout: Sink::Default,
            stderr: Sink::Default,
        }))
    }
}

#[derive(Debug)]
pub struct RecordingCommand {
    spec: ExecSpec,
    index: usize,
    result: CannedResult,
    recorder: Rc<RefCell<Recorder>>,
    stdout: Sink,
    stderr: Sink,
}

impl RecordingCommand {
    fn finish(&self) -> Result<(), ExecError> {
        if self.result.exit_code == 0 {
            return Ok(());
        }
        Err(ExecError::Exit {
            binary: self.spec.name.clone(),
            code: self.result.exit_code,
            stderr: self.result.stderr.clone(),
        })
    }

    fn emit(&self, sink: &mut Sink, text: &str) -> Result<(), ExecError> {
        if let Sink::File(ref mut file) = sink {
            file.write_all(text.as_bytes())
                .map_err(|source| ExecError::Io {
                    binary: self.spec.name.clone(),
                    context: "redirect write error",
                    source,
                })?;
        }
        Ok(())
    }
}

impl Command for RecordingCommand {
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
        if let Source::Bytes(bytes) = source {
            if let Some(call) = self.recorder.borrow_mut().calls.get_mut(self.index) {
                call.stdin = Some(bytes);
            }
        }
    }

    fn run(mut self: Box<Self>) -> Result<(), ExecError> {
        let mut stdout = std::mem::take(&mut self.stdout);
        let mut stderr = std::mem::take(&mut self.stderr);
        self.emit(&mut stdout, &self.result.stdout)?;
        self.emit(&mut stderr, &self.result.stderr)?;
        self.finish()
    }

    fn output(mut self: Box<Self>) -> Result<String, ExecError> {
        let mut stderr = std::mem::take(&mut self.stderr);
        self.emit(&mut stderr, &self.result.stderr)?;
        self.finish()?;
        Ok(self.result.stdout.clone())
    }

    fn combined_output(self: Box<Self>) -> Result<String, ExecError> {
        let combined = format!("{}{}", self.result.stdout, self.result.stderr);
        if self.result.exit_code != 0 {
            return Err(ExecError::Exit {
                binary: self.spec.name.clone(),
                code: self.result.exit_code,
                stderr: combined,
            });
        }
        Ok(combined)
    }
}
