//! Plan, context and settings types shared by the pipeline and its collaborators.
//!
//! `PlanInput` is raw, partially-filled input (CLI flags merged over the config
//! file). `SetupPlan` is the resolved, immutable snapshot for one run.
//! `SetupContext` is the only mutable state threaded between steps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Enums
// ============================================================================

/// Local cluster provisioner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ClusterProvider {
    #[default]
    Kind,
    K3d,
    Minikube,
}

impl fmt::Display for ClusterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind => write!(f, "kind"),
            Self::K3d => write!(f, "k3d"),
            Self::Minikube => write!(f, "minikube"),
        }
    }
}

/// Backing storage for the in-cluster registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RegistryStorage {
    #[default]
    #[serde(rename = "emptydir")]
    #[value(name = "emptydir")]
    EmptyDir,
    Pvc,
}

impl fmt::Display for RegistryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDir => write!(f, "emptydir"),
            Self::Pvc => write!(f, "pvc"),
        }
    }
}

/// Ingress controller flavour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum IngressMode {
    #[default]
    Nginx,
    Traefik,
}

impl IngressMode {
    /// Namespace and deployment name of the controller.
    pub fn controller(&self) -> (&'static str, &'static str) {
        match self {
            Self::Nginx => ("ingress-nginx", "ingress-nginx-controller"),
            Self::Traefik => ("traefik", "traefik"),
        }
    }
}

impl fmt::Display for IngressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nginx => write!(f, "nginx"),
            Self::Traefik => write!(f, "traefik"),
        }
    }
}

// ============================================================================
// Raw input
// ============================================================================

/// Unresolved plan input. `None` means "caller did not say".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanInput {
    pub cluster_name: Option<String>,
    pub provider: Option<ClusterProvider>,
    pub tls: bool,
    pub test_mode: bool,
    pub registry_namespace: Option<String>,
    pub registry_storage: Option<RegistryStorage>,
    pub registry_size: Option<String>,
    pub external_registry: Option<String>,
    pub ingress_mode: Option<IngressMode>,
    pub ingress_manifest: Option<PathBuf>,
    pub manifests_dir: Option<PathBuf>,
    pub workload_name: Option<String>,
    pub workload_namespace: Option<String>,
    pub workload_crd: Option<String>,
    pub build_context: Option<PathBuf>,
}

// ============================================================================
// Resolved plan
// ============================================================================

/// Resolved, immutable configuration for one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupPlan {
    pub cluster_name: String,
    pub provider: ClusterProvider,
    pub tls_enabled: bool,
    pub test_mode: bool,
    pub registry: RegistryPlan,
    pub ingress: IngressPlan,
    pub workload: WorkloadPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryPlan {
    pub namespace: String,
    pub storage: RegistryStorage,
    pub size: String,
    pub manifest: PathBuf,
    /// Registry host to push to instead of deploying one in-cluster.
    pub external: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressPlan {
    pub mode: IngressMode,
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadPlan {
    pub name: String,
    pub namespace: String,
    pub crd: String,
    pub manifest: PathBuf,
    pub build_context: PathBuf,
}

// ============================================================================
// Run context
// ============================================================================

/// Mutable single-run state. Each output field has one owning step:
///
/// | field               | written by     |
/// |---------------------|----------------|
/// | `cluster_context`   | cluster        |
/// | `tls_secret`        | tls            |
/// | `external_registry` | registry       |
/// | `image_ref`         | image-build    |
/// | `workload_deployed` | image-deploy   |
#[derive(Debug, Clone)]
pub struct SetupContext {
    pub plan: SetupPlan,
    pub cluster_context: Option<String>,
    pub tls_secret: Option<String>,
    pub external_registry: bool,
    pub image_ref: Option<String>,
    pub workload_deployed: bool,
}

impl SetupContext {
    pub fn new(plan: SetupPlan) -> Self {
        Self {
            plan,
            cluster_context: None,
            tls_secret: None,
            external_registry: false,
            image_ref: None,
            workload_deployed: false,
        }
    }
}

// ============================================================================
// Tool settings
// ============================================================================

/// Settings for the concrete tool collaborators, separate from the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Host port the in-cluster registry is published on.
    pub registry_port: u16,
    /// Upper bound for each readiness wait.
    pub wait_timeout: Duration,
    /// Root that file arguments must stay inside.
    pub workspace: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            registry_port: 5001,
            wait_timeout: Duration::from_secs(300),
            workspace: PathBuf::from("."),
        }
    }
}
