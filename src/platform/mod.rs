//! Concrete `SetupDeps` backed by kind/k3d/minikube, kubectl, docker and openssl.
//!
//! Every process goes through the injected [`Executor`] with the guarded
//! validator chain. Commands that take file arguments also get a
//! [`PathContainment`] check rooted at the workspace. Relative paths in the
//! plan are resolved against the workspace, so the executor should run
//! commands from there (`LocalExecutor::with_working_dir`).

pub mod cluster;
pub mod template;

use crate::core::deps::{RegistryDeploy, SetupDeps};
use crate::core::error::SetupError;
use crate::core::types::{IngressMode, SetupPlan, ToolSettings};
use crate::transport::validate::{guarded, BinaryAllowlist, PathContainment};
use crate::transport::{Command, ExecError, ExecSpec, Executor, Sink, Source};
use cluster::Presence;
use std::path::{Path, PathBuf};
use std::time::Duration;
use template::Vars;

/// Name of the TLS secret written into each namespace that serves ingress.
pub const TLS_SECRET: &str = "kindling-tls";

/// Certificate directory, relative to the workspace.
pub const CERT_DIR: &str = ".kindling/certs";

pub const DEFAULT_IMAGE_NAME: &str = "workload";

pub struct ToolDeps<E: Executor> {
    executor: E,
    allowlist: BinaryAllowlist,
    containment: PathContainment,
    settings: ToolSettings,
    image_name: String,
}

impl<E: Executor> ToolDeps<E> {
    pub fn new(executor: E, settings: ToolSettings) -> Self {
        Self {
            executor,
            allowlist: BinaryAllowlist::default(),
            containment: PathContainment::new(&settings.workspace),
            settings,
            image_name: DEFAULT_IMAGE_NAME.to_string(),
        }
    }

    /// Repository name used in image references.
    pub fn with_image_name(mut self, name: impl Into<String>) -> Self {
        self.image_name = name.into();
        self
    }

    pub fn with_allowlist(mut self, allowlist: BinaryAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    fn command(&self, spec: ExecSpec) -> Result<Box<dyn Command>, ExecError> {
        let [allow, meta, ctrl] = guarded(&self.allowlist);
        self.executor.command(spec, &[allow, meta, ctrl])
    }

    /// Like `command`, with every argument also held inside the workspace.
    fn file_command(&self, spec: ExecSpec) -> Result<Box<dyn Command>, ExecError> {
        let [allow, meta, ctrl] = guarded(&self.allowlist);
        self.executor
            .command(spec, &[allow, meta, ctrl, &self.containment])
    }

    fn in_workspace(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.settings.workspace.join(path)
        }
    }

    fn apply_stdin(&self, namespace: Option<&str>, yaml: String) -> Result<(), SetupError> {
        let mut args = vec!["apply".to_string()];
        if let Some(ns) = namespace {
            args.extend(["-n".to_string(), ns.to_string()]);
        }
        args.extend(["-f".to_string(), "-".to_string()]);
        let mut cmd = self.command(ExecSpec::new("kubectl", args))?;
        cmd.set_stdin(Source::Bytes(yaml.into_bytes()));
        cmd.run()?;
        Ok(())
    }

    /// Create-or-keep a namespace: render it client-side, then apply.
    fn ensure_namespace(&self, namespace: &str) -> Result<(), SetupError> {
        let yaml = self
            .command(ExecSpec::new(
                "kubectl",
                [
                    "create",
                    "namespace",
                    namespace,
                    "--dry-run=client",
                    "-o",
                    "yaml",
                ],
            ))?
            .output()?;
        self.apply_stdin(None, yaml)
    }

    fn cluster_exists(&self, plan: &SetupPlan) -> Result<bool, SetupError> {
        let (spec, presence) = cluster::presence_check(plan.provider, &plan.cluster_name);
        let cmd = self.command(spec)?;
        match presence {
            Presence::Listed => Ok(cluster::listed(&cmd.output()?, &plan.cluster_name)),
            Presence::ExitStatus => match cmd.run() {
                Ok(()) => Ok(true),
                Err(ExecError::Exit { .. }) => Ok(false),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Self-signed certificate for `*.localhost`; an existing pair is reused.
    fn ensure_certificate(&self, plan: &SetupPlan) -> Result<(String, String), SetupError> {
        let cert = format!("{}/tls.crt", CERT_DIR);
        let key = format!("{}/tls.key", CERT_DIR);
        let cert_dir = self.in_workspace(Path::new(CERT_DIR));
        if cert_dir.join("tls.crt").is_file() && cert_dir.join("tls.key").is_file() {
            tracing::debug!(dir = %cert_dir.display(), "reusing certificate");
            return Ok((cert, key));
        }
        std::fs::create_dir_all(&cert_dir).map_err(|e| {
            SetupError::Dependency(format!("cannot create {}: {}", cert_dir.display(), e))
        })?;

        let subject = format!("/CN={}.localhost", plan.cluster_name);
        self.command(ExecSpec::new(
            "openssl",
            [
                "req",
                "-x509",
                "-newkey",
                "rsa:2048",
                "-nodes",
                "-days",
                "365",
                "-subj",
                subject.as_str(),
                "-addext",
                "subjectAltName=DNS:localhost,DNS:*.localhost",
                "-keyout",
                key.as_str(),
                "-out",
                cert.as_str(),
            ],
        ))?
        .run()?;
        Ok((cert, key))
    }
}

impl<E: Executor> SetupDeps for ToolDeps<E> {
    fn create_cluster(&self, plan: &SetupPlan) -> Result<String, SetupError> {
        if self.cluster_exists(plan)? {
            tracing::info!(cluster = %plan.cluster_name, provider = %plan.provider, "cluster exists");
        } else {
            tracing::info!(cluster = %plan.cluster_name, provider = %plan.provider, "creating cluster");
            let mut cmd = self.command(cluster::create(plan.provider, &plan.cluster_name))?;
            cmd.set_stderr(Sink::Inherit);
            cmd.run()?;
        }
        Ok(cluster::context_name(plan.provider, &plan.cluster_name))
    }

    fn install_ingress(&self, mode: IngressMode, manifest: &Path) -> Result<(), SetupError> {
        tracing::debug!(%mode, manifest = %manifest.display(), "applying ingress");
        let path = manifest.display().to_string();
        self.file_command(ExecSpec::new("kubectl", ["apply", "-f", path.as_str()]))?
            .run()?;
        Ok(())
    }

    fn install_tls(&self, plan: &SetupPlan) -> Result<String, SetupError> {
        let (cert, key) = self.ensure_certificate(plan)?;
        let cert_arg = format!("--cert={}", cert);
        let key_arg = format!("--key={}", key);

        let mut namespaces = vec![plan.registry.namespace.as_str()];
        if plan.workload.namespace != plan.registry.namespace {
            namespaces.push(plan.workload.namespace.as_str());
        }
        for ns in namespaces {
            self.ensure_namespace(ns)?;
            let yaml = self
                .file_command(ExecSpec::new(
                    "kubectl",
                    [
                        "create",
                        "secret",
                        "tls",
                        TLS_SECRET,
                        cert_arg.as_str(),
                        key_arg.as_str(),
                        "-n",
                        ns,
                        "--dry-run=client",
                        "-o",
                        "yaml",
                    ],
                ))?
                .output()?;
            self.apply_stdin(Some(ns), yaml)?;
        }
        Ok(TLS_SECRET.to_string())
    }

    fn deploy_registry(&self, req: &RegistryDeploy<'_>) -> Result<(), SetupError> {
        self.ensure_namespace(req.namespace)?;
        let vars: Vars = [
            ("NAMESPACE", req.namespace.to_string()),
            ("PORT", req.port.to_string()),
            ("STORAGE", req.storage.to_string()),
            ("SIZE", req.size.to_string()),
        ]
        .into_iter()
        .collect();
        let manifest = template::render_file(&self.in_workspace(req.manifest), &vars)?;
        self.apply_stdin(Some(req.namespace), manifest)
    }

    fn wait_for_available(
        &self,
        namespace: &str,
        deployment: &str,
        timeout: Duration,
    ) -> Result<(), SetupError> {
        let target = format!("deployment/{}", deployment);
        let timeout_arg = format!("--timeout={}s", timeout.as_secs().max(1));
        self.command(ExecSpec::new(
            "kubectl",
            [
                "wait",
                "--for=condition=Available",
                target.as_str(),
                "-n",
                namespace,
                timeout_arg.as_str(),
            ],
        ))?
        .run()?;
        Ok(())
    }

    fn show_registry_info(&self, namespace: &str, port: u16) {
        println!("Registry ready: localhost:{} (namespace {})", port, namespace);
        println!("  docker push localhost:{}/<image>:<tag>", port);
    }

    fn wait_timeout(&self) -> Duration {
        self.settings.wait_timeout
    }

    fn registry_port(&self) -> u16 {
        self.settings.registry_port
    }

    fn crd_exists(&self, name: &str) -> Result<bool, SetupError> {
        match self
            .command(ExecSpec::new("kubectl", ["get", "crd", name]))?
            .run()
        {
            Ok(()) => Ok(true),
            Err(ExecError::Exit { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_image_ref(
        &self,
        external_registry: Option<&str>,
        test_mode: bool,
    ) -> Result<String, SetupError> {
        let registry = match external_registry {
            Some(host) => host.to_string(),
            None => format!("localhost:{}", self.settings.registry_port),
        };
        let tag = if test_mode { "test" } else { "latest" };
        Ok(format!("{}/{}:{}", registry, self.image_name, tag))
    }

    fn build_image(&self, image_ref: &str, plan: &SetupPlan) -> Result<(), SetupError> {
        let context = plan.workload.build_context.display().to_string();
        let dockerfile = plan.workload.build_context.join("Dockerfile");
        let dockerfile = dockerfile.display().to_string();
        let mut cmd = self.file_command(ExecSpec::new(
            "docker",
            [
                "build",
                "-t",
                image_ref,
                "-f",
                dockerfile.as_str(),
                context.as_str(),
            ],
        ))?;
        cmd.set_stderr(Sink::Inherit);
        cmd.run()?;
        Ok(())
    }

    fn publish_image(&self, image_ref: &str, plan: &SetupPlan) -> Result<(), SetupError> {
        let spec = if plan.test_mode {
            cluster::load_image(plan.provider, &plan.cluster_name, image_ref)
        } else {
            ExecSpec::new("docker", ["push", image_ref])
        };
        self.command(spec)?.run()?;
        Ok(())
    }

    fn deploy_workload(&self, image_ref: &str, plan: &SetupPlan) -> Result<(), SetupError> {
        let workload = &plan.workload;
        self.ensure_namespace(&workload.namespace)?;
        let vars: Vars = [
            ("NAME", workload.name.clone()),
            ("NAMESPACE", workload.namespace.clone()),
            ("IMAGE", image_ref.to_string()),
        ]
        .into_iter()
        .collect();
        let manifest = template::render_file(&self.in_workspace(&workload.manifest), &vars)?;
        self.apply_stdin(Some(&workload.namespace), manifest)
    }
}
