//! The six bootstrap steps.
//!
//! Each step reads the plan and earlier outputs from the context, talks to the
//! world only through `SetupDeps`, and writes only the context fields it owns.

use super::deps::{RegistryDeploy, SetupDeps};
use super::error::SetupError;
use super::pipeline::Step;
use super::types::SetupContext;
use tracing::Span;

pub const CLUSTER: &str = "cluster";
pub const TLS: &str = "tls";
pub const REGISTRY: &str = "registry";
pub const IMAGE_BUILD: &str = "image-build";
pub const IMAGE_DEPLOY: &str = "image-deploy";
pub const VERIFY: &str = "verify";

/// Deployment name of the in-cluster registry.
pub const REGISTRY_DEPLOYMENT: &str = "registry";

/// Creates the cluster and installs the ingress controller.
/// Owns `cluster_context`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterStep;

impl Step for ClusterStep {
    fn name(&self) -> &'static str {
        CLUSTER
    }

    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        let plan = &ctx.plan;
        tracing::info!(
            parent: log,
            cluster = %plan.cluster_name,
            provider = %plan.provider,
            "creating cluster"
        );
        let context = deps.create_cluster(plan)?;

        tracing::info!(
            parent: log,
            mode = %plan.ingress.mode,
            manifest = %plan.ingress.manifest.display(),
            "installing ingress"
        );
        deps.install_ingress(plan.ingress.mode, &plan.ingress.manifest)?;

        ctx.cluster_context = Some(context);
        Ok(())
    }
}

/// Issues the certificate and stores it in the cluster. Owns `tls_secret`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsStep;

impl Step for TlsStep {
    fn name(&self) -> &'static str {
        TLS
    }

    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        let secret = deps.install_tls(&ctx.plan)?;
        tracing::info!(parent: log, secret = %secret, "tls secret installed");
        ctx.tls_secret = Some(secret);
        Ok(())
    }
}

/// Deploys the in-cluster registry unless an external one is configured.
/// Owns `external_registry`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStep;

impl Step for RegistryStep {
    fn name(&self) -> &'static str {
        REGISTRY
    }

    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        let registry = &ctx.plan.registry;

        if let Some(ref host) = registry.external {
            tracing::info!(parent: log, registry = %host, "external registry configured, skipping deploy");
            ctx.external_registry = true;
            return Ok(());
        }

        let port = deps.registry_port();
        let timeout = deps.wait_timeout();

        tracing::info!(
            parent: log,
            namespace = %registry.namespace,
            storage = %registry.storage,
            size = %registry.size,
            "deploying registry"
        );
        deps.deploy_registry(&RegistryDeploy {
            namespace: &registry.namespace,
            port,
            storage: registry.storage,
            size: &registry.size,
            manifest: &registry.manifest,
        })?;
        deps.wait_for_available(&registry.namespace, REGISTRY_DEPLOYMENT, timeout)?;
        deps.show_registry_info(&registry.namespace, port);

        ctx.external_registry = false;
        Ok(())
    }
}

/// Resolves, builds and publishes the workload image. Owns `image_ref`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBuildStep;

impl Step for ImageBuildStep {
    fn name(&self) -> &'static str {
        IMAGE_BUILD
    }

    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        let plan = &ctx.plan;
        let image = deps.resolve_image_ref(plan.registry.external.as_deref(), plan.test_mode)?;
        tracing::info!(parent: log, image = %image, "building image");
        deps.build_image(&image, plan)?;
        deps.publish_image(&image, plan)?;
        ctx.image_ref = Some(image);
        Ok(())
    }
}

/// Deploys the workload with the image built earlier. Owns `workload_deployed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDeployStep;

impl Step for ImageDeployStep {
    fn name(&self) -> &'static str {
        IMAGE_DEPLOY
    }

    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        let image = ctx
            .image_ref
            .as_deref()
            .ok_or(SetupError::MissingOutput { field: "image_ref" })?;
        tracing::info!(
            parent: log,
            image = %image,
            namespace = %ctx.plan.workload.namespace,
            "deploying workload"
        );
        deps.deploy_workload(image, &ctx.plan)?;
        ctx.workload_deployed = true;
        Ok(())
    }
}

/// Read-only checks: ingress controller and workload available, CRD installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyStep;

impl Step for VerifyStep {
    fn name(&self) -> &'static str {
        VERIFY
    }

    fn run(
        &self,
        log: &Span,
        deps: &dyn SetupDeps,
        ctx: &mut SetupContext,
    ) -> Result<(), SetupError> {
        let plan = &ctx.plan;
        let timeout = deps.wait_timeout();

        let (ingress_ns, ingress_deploy) = plan.ingress.mode.controller();
        deps.wait_for_available(ingress_ns, ingress_deploy, timeout)?;
        deps.wait_for_available(&plan.workload.namespace, &plan.workload.name, timeout)?;

        if !deps.crd_exists(&plan.workload.crd)? {
            return Err(SetupError::Dependency(format!(
                "CRD {} is not installed",
                plan.workload.crd
            )));
        }
        tracing::info!(parent: log, "platform verified");
        Ok(())
    }
}
