//! Recording `SetupDeps` for pipeline tests.

use super::deps::{RegistryDeploy, SetupDeps};
use super::error::SetupError;
use super::types::{IngressMode, RegistryStorage, SetupPlan};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateCluster(String),
    InstallIngress(IngressMode, PathBuf),
    InstallTls(String),
    DeployRegistry {
        namespace: String,
        port: u16,
        storage: RegistryStorage,
        size: String,
        manifest: PathBuf,
    },
    Wait {
        namespace: String,
        deployment: String,
        timeout: Duration,
    },
    ShowRegistryInfo {
        namespace: String,
        port: u16,
    },
    CrdExists(String),
    ResolveImage {
        external: Option<String>,
        test_mode: bool,
    },
    BuildImage(String),
    PublishImage(String),
    DeployWorkload(String),
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreateCluster(_) => "create_cluster",
            Self::InstallIngress(..) => "install_ingress",
            Self::InstallTls(_) => "install_tls",
            Self::DeployRegistry { .. } => "deploy_registry",
            Self::Wait { .. } => "wait_for_available",
            Self::ShowRegistryInfo { .. } => "show_registry_info",
            Self::CrdExists(_) => "crd_exists",
            Self::ResolveImage { .. } => "resolve_image_ref",
            Self::BuildImage(_) => "build_image",
            Self::PublishImage(_) => "publish_image",
            Self::DeployWorkload(_) => "deploy_workload",
        }
    }
}

#[derive(Debug)]
pub struct FakeDeps {
    calls: RefCell<Vec<Call>>,
    fail_on: Option<&'static str>,
    crd_present: bool,
    port: u16,
    timeout: Duration,
}

impl Default for FakeDeps {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDeps {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
            crd_present: true,
            port: 5001,
            timeout: Duration::from_secs(1),
        }
    }

    /// Make the operation named `op` return an error.
    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn without_crd(mut self) -> Self {
        self.crd_present = false;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(Call::op).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.op() == op).count()
    }

    fn record(&self, call: Call) -> Result<(), SetupError> {
        let op = call.op();
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(op) {
            return Err(SetupError::Dependency(format!("{} failed", op)));
        }
        Ok(())
    }
}

impl SetupDeps for FakeDeps {
    fn create_cluster(&self, plan: &SetupPlan) -> Result<String, SetupError> {
        self.record(Call::CreateCluster(plan.cluster_name.clone()))?;
        Ok(format!("{}-{}", plan.provider, plan.cluster_name))
    }

    fn install_ingress(&self, mode: IngressMode, manifest: &Path) -> Result<(), SetupError> {
        self.record(Call::InstallIngress(mode, manifest.to_path_buf()))
    }

    fn install_tls(&self, plan: &SetupPlan) -> Result<String, SetupError> {
        self.record(Call::InstallTls(plan.cluster_name.clone()))?;
        Ok("kindling-tls".to_string())
    }

    fn deploy_registry(&self, req: &RegistryDeploy<'_>) -> Result<(), SetupError> {
        self.record(Call::DeployRegistry {
            namespace: req.namespace.to_string(),
            port: req.port,
            storage: req.storage,
            size: req.size.to_string(),
            manifest: req.manifest.to_path_buf(),
        })
    }

    fn wait_for_available(
        &self,
        namespace: &str,
        deployment: &str,
        timeout: Duration,
    ) -> Result<(), SetupError> {
        self.record(Call::Wait {
            namespace: namespace.to_string(),
            deployment: deployment.to_string(),
            timeout,
        })
    }

    fn show_registry_info(&self, namespace: &str, port: u16) {
        let _ = self.record(Call::ShowRegistryInfo {
            namespace: namespace.to_string(),
            port,
        });
    }

    fn wait_timeout(&self) -> Duration {
        self.timeout
    }

    fn registry_port(&self) -> u16 {
        self.port
    }

    fn crd_exists(&self, name: &str) -> Result<bool, SetupError> {
        self.record(Call::CrdExists(name.to_string()))?;
        Ok(self.crd_present)
    }

    fn resolve_image_ref(
        &self,
        external_registry: Option<&str>,
        test_mode: bool,
    ) -> Result<String, SetupError> {
        self.record(Call::ResolveImage {
            external: external_registry.map(str::to_string),
            test_mode,
        })?;
        let registry = external_registry
            .map(str::to_string)
            .unwrap_or_else(|| format!("localhost:{}", self.port));
        let tag = if test_mode { "test" } else { "latest" };
        Ok(format!("{}/workload:{}", registry, tag))
    }

    fn build_image(&self, image_ref: &str, _plan: &SetupPlan) -> Result<(), SetupError> {
        self.record(Call::BuildImage(image_ref.to_string()))
    }

    fn publish_image(&self, image_ref: &str, _plan: &SetupPlan) -> Result<(), SetupError> {
        self.record(Call::PublishImage(image_ref.to_string()))
    }

    fn deploy_workload(&self, image_ref: &str, _plan: &SetupPlan) -> Result<(), SetupError> {
        self.record(Call::DeployWorkload(image_ref.to_string()))
    }
}
