//! Provider-specific cluster commands for kind, k3d and minikube.

use crate::core::types::ClusterProvider;
use crate::transport::ExecSpec;

/// How to read the answer to "does this cluster exist?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Stdout lists cluster names one per line.
    Listed,
    /// Zero exit means present, non-zero means absent.
    ExitStatus,
}

pub fn presence_check(provider: ClusterProvider, name: &str) -> (ExecSpec, Presence) {
    match provider {
        ClusterProvider::Kind => (ExecSpec::new("kind", ["get", "clusters"]), Presence::Listed),
        ClusterProvider::K3d => (
            ExecSpec::new("k3d", ["cluster", "get", name]),
            Presence::ExitStatus,
        ),
        ClusterProvider::Minikube => (
            ExecSpec::new("minikube", ["status", "-p", name]),
            Presence::ExitStatus,
        ),
    }
}

pub fn create(provider: ClusterProvider, name: &str) -> ExecSpec {
    match provider {
        ClusterProvider::Kind => ExecSpec::new("kind", ["create", "cluster", "--name", name]),
        ClusterProvider::K3d => ExecSpec::new("k3d", ["cluster", "create", name]),
        ClusterProvider::Minikube => ExecSpec::new("minikube", ["start", "-p", name]),
    }
}

/// kubeconfig context the provider registers for `name`.
pub fn context_name(provider: ClusterProvider, name: &str) -> String {
    match provider {
        ClusterProvider::Kind => format!("kind-{}", name),
        ClusterProvider::K3d => format!("k3d-{}", name),
        ClusterProvider::Minikube => name.to_string(),
    }
}

/// Side-load a locally built image into the cluster nodes.
pub fn load_image(provider: ClusterProvider, name: &str, image: &str) -> ExecSpec {
    match provider {
        ClusterProvider::Kind => {
            ExecSpec::new("kind", ["load", "docker-image", image, "--name", name])
        }
        ClusterProvider::K3d => ExecSpec::new("k3d", ["image", "import", image, "-c", name]),
        ClusterProvider::Minikube => {
            ExecSpec::new("minikube", ["image", "load", image, "-p", name])
        }
    }
}

/// Whether `listing` (one name per line) names `cluster`.
pub fn listed(listing: &str, cluster: &str) -> bool {
    listing.lines().any(|line| line.trim() == cluster)
}
