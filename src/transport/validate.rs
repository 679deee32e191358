//! Validator chain: pure predicates that veto unsafe invocations before launch.
//!
//! Validators compose by short-circuit conjunction: [`check_all`] stops at the
//! first rejection and reports that validator's reason. An empty chain accepts
//! everything.

use super::{ExecError, ExecSpec};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Binaries the bootstrapper is expected to launch.
pub const DEFAULT_BINARIES: &[&str] = &["kind", "k3d", "minikube", "kubectl", "docker", "openssl"];

/// Pipe, semicolon, ampersand, redirects, backtick, `$(`, or a trailing backslash.
static SHELL_METACHAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[|;&<>`]|\$\(|\\$").expect("shell metacharacter pattern is valid")
});

/// A predicate over an [`ExecSpec`]. `Err` carries the rejection reason.
pub trait Validator {
    fn check(&self, spec: &ExecSpec) -> Result<(), String>;
}

impl<F> Validator for F
where
    F: Fn(&ExecSpec) -> Result<(), String>,
{
    fn check(&self, spec: &ExecSpec) -> Result<(), String> {
        self(spec)
    }
}

/// Run every validator against the same spec; the first failure wins.
pub fn check_all(spec: &ExecSpec, validators: &[&dyn Validator]) -> Result<(), ExecError> {
    for validator in validators {
        validator
            .check(spec)
            .map_err(|reason| ExecError::Rejected {
                binary: spec.name.clone(),
                reason,
            })?;
    }
    Ok(())
}

/// The chain required for any call site that takes externally influenced
/// arguments: allowlist, shell metacharacters, control characters.
pub fn guarded(allowlist: &BinaryAllowlist) -> [&dyn Validator; 3] {
    [allowlist, &NoShellMeta, &NoControlChars]
}

/// Rejects empty binary names and names outside a fixed set.
#[derive(Debug, Clone)]
pub struct BinaryAllowlist {
    allowed: Vec<String>,
}

impl BinaryAllowlist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        !name.is_empty() && self.allowed.iter().any(|a| a == name)
    }
}

impl Default for BinaryAllowlist {
    fn default() -> Self {
        Self::new(DEFAULT_BINARIES.iter().copied())
    }
}

impl Validator for BinaryAllowlist {
    fn check(&self, spec: &ExecSpec) -> Result<(), String> {
        if spec.name.is_empty() {
            return Err("empty binary name".to_string());
        }
        if !self.allows(&spec.name) {
            return Err(format!("binary '{}' is not allowed", spec.name));
        }
        Ok(())
    }
}

/// Rejects the whole spec if any argument carries a shell metacharacter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShellMeta;

impl Validator for NoShellMeta {
    fn check(&self, spec: &ExecSpec) -> Result<(), String> {
        for (i, arg) in spec.args.iter().enumerate() {
            if SHELL_METACHAR_RE.is_match(arg) {
                return Err(format!(
                    "argument {} contains a shell metacharacter: {:?}",
                    i, arg
                ));
            }
        }
        Ok(())
    }
}

/// Rejects newline, carriage return and tab. Plain spaces are fine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControlChars;

impl Validator for NoControlChars {
    fn check(&self, spec: &ExecSpec) -> Result<(), String> {
        for (i, arg) in spec.args.iter().enumerate() {
            if arg.contains(['\n', '\r', '\t']) {
                return Err(format!(
                    "argument {} contains a control character: {:?}",
                    i, arg
                ));
            }
        }
        Ok(())
    }
}

/// Rejects arguments that resolve outside `root`. Resolution is lexical:
/// `.` and `..` are folded without touching the filesystem, so symlinks are
/// not followed. `-` (stdin) is always accepted.
#[derive(Debug, Clone)]
pub struct PathContainment {
    root: PathBuf,
}

impl PathContainment {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn contains(&self, arg: &str) -> bool {
        if arg == "-" {
            return true;
        }
        let path = Path::new(arg);
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = normalize(&candidate);

        // A relative root cannot vouch for absolute paths.
        if resolved.is_absolute() != self.root.is_absolute() {
            return false;
        }
        if resolved.components().any(|c| c == Component::ParentDir) {
            return false;
        }
        resolved.starts_with(&self.root)
    }
}

impl Validator for PathContainment {
    fn check(&self, spec: &ExecSpec) -> Result<(), String> {
        for arg in &spec.args {
            if !self.contains(arg) {
                return Err(format!(
                    "path {:?} escapes {}",
                    arg,
                    self.root.display()
                ));
            }
        }
        Ok(())
    }
}

/// Fold `.` and `..` lexically. Leading `..` survive on relative paths.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_parent = matches!(out.components().next_back(), Some(Component::ParentDir));
                if out.as_os_str().is_empty() || at_parent {
                    out.push("..");
                } else {
                    // Popping "/" is a no-op, which pins absolute paths at the root.
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
