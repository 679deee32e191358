//! Plan resolution: raw input to an immutable `SetupPlan`.
//!
//! Pure: no I/O, no environment lookups, cannot fail. Identical input always
//! yields an identical plan.

use super::types::*;
use std::path::{Path, PathBuf};

pub const DEFAULT_CLUSTER_NAME: &str = "platform";
pub const DEFAULT_REGISTRY_NAMESPACE: &str = "registry";
pub const DEFAULT_REGISTRY_SIZE: &str = "10Gi";
pub const DEFAULT_MANIFESTS_DIR: &str = "deploy";
pub const DEFAULT_WORKLOAD_NAME: &str = "platform-operator";
pub const DEFAULT_WORKLOAD_NAMESPACE: &str = "platform-system";
pub const DEFAULT_WORKLOAD_CRD: &str = "platforms.kindling.dev";

/// Resolve raw input into a plan, filling defaults.
pub fn resolve_plan(input: &PlanInput) -> SetupPlan {
    let root = input
        .manifests_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFESTS_DIR));
    let tls = input.tls;

    // An explicit ingress manifest always wins over the TLS-derived overlay.
    let ingress_manifest = input
        .ingress_manifest
        .clone()
        .unwrap_or_else(|| overlay(&root, "ingress", tls));

    SetupPlan {
        cluster_name: or_default(&input.cluster_name, DEFAULT_CLUSTER_NAME),
        provider: input.provider.unwrap_or_default(),
        tls_enabled: tls,
        test_mode: input.test_mode,
        registry: RegistryPlan {
            namespace: or_default(&input.registry_namespace, DEFAULT_REGISTRY_NAMESPACE),
            storage: input.registry_storage.unwrap_or_default(),
            size: or_default(&input.registry_size, DEFAULT_REGISTRY_SIZE),
            manifest: overlay(&root, "registry", tls),
            external: input
                .external_registry
                .as_deref()
                .map(|s| s.trim().trim_end_matches('/'))
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        },
        ingress: IngressPlan {
            mode: input.ingress_mode.unwrap_or_default(),
            manifest: ingress_manifest,
        },
        workload: WorkloadPlan {
            name: or_default(&input.workload_name, DEFAULT_WORKLOAD_NAME),
            namespace: or_default(&input.workload_namespace, DEFAULT_WORKLOAD_NAMESPACE),
            crd: or_default(&input.workload_crd, DEFAULT_WORKLOAD_CRD),
            manifest: root.join("workload").join("workload.yaml"),
            build_context: input
                .build_context
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        },
    }
}

/// `<root>/<component>/overlays/{tls,plain}.yaml`
fn overlay(root: &Path, component: &str, tls: bool) -> PathBuf {
    let variant = if tls { "tls.yaml" } else { "plain.yaml" };
    root.join(component).join("overlays").join(variant)
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_defaults() {
        let plan = resolve_plan(&PlanInput::default());
        assert_eq!(plan.cluster_name, "platform");
        assert_eq!(plan.provider, ClusterProvider::Kind);
        assert!(!plan.tls_enabled);
        assert!(!plan.test_mode);
        assert_eq!(plan.registry.namespace, "registry");
        assert_eq!(plan.registry.storage, RegistryStorage::EmptyDir);
        assert_eq!(plan.registry.size, "10Gi");
        assert_eq!(plan.registry.external, None);
        assert_eq!(plan.ingress.mode, IngressMode::Nginx);
        assert_eq!(plan.workload.name, "platform-operator");
        assert_eq!(plan.workload.namespace, "platform-system");
        assert_eq!(plan.workload.crd, "platforms.kindling.dev");
        assert_eq!(
            plan.workload.manifest,
            PathBuf::from("deploy/workload/workload.yaml")
        );
        assert_eq!(plan.workload.build_context, PathBuf::from("."));
    }

    #[test]
    fn test_planner_plain_overlays() {
        let plan = resolve_plan(&PlanInput::default());
        assert_eq!(
            plan.ingress.manifest,
            PathBuf::from("deploy/ingress/overlays/plain.yaml")
        );
        assert_eq!(
            plan.registry.manifest,
            PathBuf::from("deploy/registry/overlays/plain.yaml")
        );
    }

    #[test]
    fn test_planner_tls_overlays() {
        let input = PlanInput {
            tls: true,
            ..PlanInput::default()
        };
        let plan = resolve_plan(&input);
        assert!(plan.tls_enabled);
        assert_eq!(
            plan.ingress.manifest,
            PathBuf::from("deploy/ingress/overlays/tls.yaml")
        );
        assert_eq!(
            plan.registry.manifest,
            PathBuf::from("deploy/registry/overlays/tls.yaml")
        );
    }

    #[test]
    fn test_planner_explicit_ingress_manifest_never_overridden() {
        for tls in [false, true] {
            let input = PlanInput {
                tls,
                ingress_manifest: Some(PathBuf::from("custom/ingress.yaml")),
                ..PlanInput::default()
            };
            let plan = resolve_plan(&input);
            assert_eq!(plan.ingress.manifest, PathBuf::from("custom/ingress.yaml"));
        }
    }

    #[test]
    fn test_planner_manifests_dir() {
        let input = PlanInput {
            manifests_dir: Some(PathBuf::from("k8s")),
            tls: true,
            ..PlanInput::default()
        };
        let plan = resolve_plan(&input);
        assert_eq!(
            plan.registry.manifest,
            PathBuf::from("k8s/registry/overlays/tls.yaml")
        );
        assert_eq!(plan.workload.manifest, PathBuf::from("k8s/workload/workload.yaml"));
    }

    #[test]
    fn test_planner_external_registry_normalized() {
        let input = PlanInput {
            external_registry: Some("  ghcr.io/acme/ ".to_string()),
            ..PlanInput::default()
        };
        assert_eq!(
            resolve_plan(&input).registry.external.as_deref(),
            Some("ghcr.io/acme")
        );

        let blank = PlanInput {
            external_registry: Some("   ".to_string()),
            ..PlanInput::default()
        };
        assert_eq!(resolve_plan(&blank).registry.external, None);

        for slashes in ["/", "///", " // "] {
            let input = PlanInput {
                external_registry: Some(slashes.to_string()),
                ..PlanInput::default()
            };
            assert_eq!(resolve_plan(&input).registry.external, None, "{:?}", slashes);
        }
    }

    #[test]
    fn test_planner_empty_strings_fall_back() {
        let input = PlanInput {
            cluster_name: Some(String::new()),
            registry_size: Some(String::new()),
            ..PlanInput::default()
        };
        let plan = resolve_plan(&input);
        assert_eq!(plan.cluster_name, "platform");
        assert_eq!(plan.registry.size, "10Gi");
    }

    #[test]
    fn test_planner_overrides() {
        let input = PlanInput {
            cluster_name: Some("dev".into()),
            provider: Some(ClusterProvider::K3d),
            test_mode: true,
            registry_storage: Some(RegistryStorage::Pvc),
            registry_size: Some("20Gi".into()),
            ingress_mode: Some(IngressMode::Traefik),
            workload_name: Some("op".into()),
            build_context: Some(PathBuf::from("operator")),
            ..PlanInput::default()
        };
        let plan = resolve_plan(&input);
        assert_eq!(plan.cluster_name, "dev");
        assert_eq!(plan.provider, ClusterProvider::K3d);
        assert!(plan.test_mode);
        assert_eq!(plan.registry.storage, RegistryStorage::Pvc);
        assert_eq!(plan.registry.size, "20Gi");
        assert_eq!(plan.ingress.mode, IngressMode::Traefik);
        assert_eq!(plan.workload.name, "op");
        assert_eq!(plan.workload.build_context, PathBuf::from("operator"));
    }

    #[test]
    fn test_planner_deterministic() {
        let input = PlanInput {
            tls: true,
            external_registry: Some("registry.example.com".into()),
            ..PlanInput::default()
        };
        assert_eq!(resolve_plan(&input), resolve_plan(&input));
        assert_eq!(resolve_plan(&PlanInput::default()), resolve_plan(&PlanInput::default()));
    }
}
