//! kindling.yaml parsing and validation.
//!
//! The config file mirrors `PlanInput` in nested sections plus a `tools`
//! section for collaborator settings. Every field is optional; unknown fields
//! are rejected so typos surface instead of silently falling back to defaults.

use super::types::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// RFC 1123 label: lowercase alphanumerics and '-', 1-63 chars.
static DNS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("dns label pattern is valid")
});

/// Kubernetes binary quantity for volume sizes.
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]*(Mi|Gi|Ti)$").expect("size pattern is valid"));

/// Host[:port][/path], no scheme.
static REGISTRY_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?(:[0-9]{1,5})?(/[a-z0-9._-]+)*/?$")
        .expect("registry host pattern is valid")
});

/// Root of kindling.yaml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub cluster: ClusterSection,
    pub tls: bool,
    pub test_mode: bool,
    pub manifests_dir: Option<PathBuf>,
    pub registry: RegistrySection,
    pub ingress: IngressSection,
    pub workload: WorkloadSection,
    pub tools: ToolsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSection {
    pub name: Option<String>,
    pub provider: Option<ClusterProvider>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
    pub namespace: Option<String>,
    pub storage: Option<RegistryStorage>,
    pub size: Option<String>,
    /// Push to this registry instead of deploying one.
    pub external: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngressSection {
    pub mode: Option<IngressMode>,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadSection {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub crd: Option<String>,
    pub build_context: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsSection {
    pub registry_port: Option<u16>,
    pub wait_timeout_secs: Option<u64>,
    pub workspace: Option<PathBuf>,
}

impl ConfigFile {
    pub fn plan_input(&self) -> PlanInput {
        PlanInput {
            cluster_name: self.cluster.name.clone(),
            provider: self.cluster.provider,
            tls: self.tls,
            test_mode: self.test_mode,
            registry_namespace: self.registry.namespace.clone(),
            registry_storage: self.registry.storage,
            registry_size: self.registry.size.clone(),
            external_registry: self.registry.external.clone(),
            ingress_mode: self.ingress.mode,
            ingress_manifest: self.ingress.manifest.clone(),
            manifests_dir: self.manifests_dir.clone(),
            workload_name: self.workload.name.clone(),
            workload_namespace: self.workload.namespace.clone(),
            workload_crd: self.workload.crd.clone(),
            build_context: self.workload.build_context.clone(),
        }
    }

    pub fn tool_settings(&self) -> ToolSettings {
        let defaults = ToolSettings::default();
        ToolSettings {
            registry_port: self.tools.registry_port.unwrap_or(defaults.registry_port),
            wait_timeout: self
                .tools
                .wait_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.wait_timeout),
            workspace: self.tools.workspace.clone().unwrap_or(defaults.workspace),
        }
    }
}

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse kindling.yaml from disk.
pub fn parse_config_file(path: &Path) -> Result<ConfigFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse kindling.yaml from a string. An empty document is the default config.
pub fn parse_config(yaml: &str) -> Result<ConfigFile, String> {
    if yaml.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a resolved plan and tool settings. Returns every error found.
pub fn validate_plan(plan: &SetupPlan, settings: &ToolSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    for (field, value) in [
        ("cluster name", plan.cluster_name.as_str()),
        ("registry namespace", plan.registry.namespace.as_str()),
        ("workload name", plan.workload.name.as_str()),
        ("workload namespace", plan.workload.namespace.as_str()),
    ] {
        if !DNS_LABEL_RE.is_match(value) {
            push(format!(
                "{} '{}' must be a lowercase DNS label (a-z, 0-9, '-', max 63)",
                field, value
            ));
        }
    }

    if !plan.workload.crd.contains('.') {
        push(format!(
            "workload CRD '{}' must be fully qualified (<plural>.<group>)",
            plan.workload.crd
        ));
    }

    if !SIZE_RE.is_match(&plan.registry.size) {
        push(format!(
            "registry size '{}' must look like 10Gi (Mi, Gi or Ti)",
            plan.registry.size
        ));
    }

    if let Some(ref host) = plan.registry.external {
        if host.contains("://") {
            push(format!("external registry '{}' must not include a scheme", host));
        } else if !REGISTRY_HOST_RE.is_match(host) {
            push(format!("external registry '{}' is not a valid registry host", host));
        }
    }

    if settings.registry_port == 0 {
        push("registry port must be non-zero".to_string());
    }
    if settings.wait_timeout.is_zero() {
        push("wait timeout must be at least one second".to_string());
    }

    errors
}
