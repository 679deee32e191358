//! Collaborator seam: the only way pipeline steps reach the outside world.

use super::error::SetupError;
use super::types::{IngressMode, RegistryStorage, SetupPlan};
use std::path::Path;
use std::time::Duration;

/// Everything the registry step hands to [`SetupDeps::deploy_registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryDeploy<'a> {
    pub namespace: &'a str,
    pub port: u16,
    pub storage: RegistryStorage,
    pub size: &'a str,
    pub manifest: &'a Path,
}

/// Operations the pipeline needs from cluster tooling. Implementations own
/// idempotency (every operation must be safe to re-apply) and timeouts.
pub trait SetupDeps {
    /// Create the cluster if it does not exist; returns the kube context name.
    fn create_cluster(&self, plan: &SetupPlan) -> Result<String, SetupError>;

    fn install_ingress(&self, mode: IngressMode, manifest: &Path) -> Result<(), SetupError>;

    /// Issue a certificate and store it in the cluster; returns the secret name.
    fn install_tls(&self, plan: &SetupPlan) -> Result<String, SetupError>;

    fn deploy_registry(&self, req: &RegistryDeploy<'_>) -> Result<(), SetupError>;

    /// Block until `deployment` in `namespace` reports Available, or `timeout`.
    fn wait_for_available(
        &self,
        namespace: &str,
        deployment: &str,
        timeout: Duration,
    ) -> Result<(), SetupError>;

    /// Print how to reach the registry.
    fn show_registry_info(&self, namespace: &str, port: u16);

    fn wait_timeout(&self) -> Duration;

    fn registry_port(&self) -> u16;

    fn crd_exists(&self, name: &str) -> Result<bool, SetupError>;

    fn resolve_image_ref(
        &self,
        external_registry: Option<&str>,
        test_mode: bool,
    ) -> Result<String, SetupError>;

    fn build_image(&self, image_ref: &str, plan: &SetupPlan) -> Result<(), SetupError>;

    /// Make the image pullable by the cluster (push, or load in test mode).
    fn publish_image(&self, image_ref: &str, plan: &SetupPlan) -> Result<(), SetupError>;

    fn deploy_workload(&self, image_ref: &str, plan: &SetupPlan) -> Result<(), SetupError>;
}
