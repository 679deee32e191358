//! CLI subcommands: init, plan, up, completions.

use crate::core::parser::{self, ConfigFile};
use crate::core::pipeline::Pipeline;
use crate::core::planner;
use crate::core::types::*;
use crate::platform::ToolDeps;
use crate::transport::local::LocalExecutor;
use crate::transport::Executor;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG: &str = "kindling.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "kindling",
    version,
    about = "Bootstrap a local Kubernetes platform: cluster, ingress, registry, workload"
)]
pub struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter kindling.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show the resolved plan and the steps `up` would run
    Plan {
        #[command(flatten)]
        setup: SetupArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the bootstrap pipeline
    Up {
        #[command(flatten)]
        setup: SetupArgs,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config file selection plus per-field overrides. Flags win over the file.
#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Path to kindling.yaml (default: ./kindling.yaml if present)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub cluster_name: Option<String>,

    #[arg(long, value_enum)]
    pub provider: Option<ClusterProvider>,

    /// Issue a certificate and use the TLS overlays
    #[arg(long)]
    pub tls: bool,

    /// Tag images :test and load them into the cluster instead of pushing
    #[arg(long)]
    pub test_mode: bool,

    #[arg(long)]
    pub registry_namespace: Option<String>,

    #[arg(long, value_enum)]
    pub registry_storage: Option<RegistryStorage>,

    #[arg(long)]
    pub registry_size: Option<String>,

    /// Push to this registry instead of deploying one in-cluster
    #[arg(long)]
    pub external_registry: Option<String>,

    #[arg(long, value_enum)]
    pub ingress_mode: Option<IngressMode>,

    /// Ingress manifest; overrides the overlay chosen by --tls
    #[arg(long)]
    pub ingress_manifest: Option<PathBuf>,

    /// Root of the manifest tree
    #[arg(long)]
    pub manifests_dir: Option<PathBuf>,

    #[arg(long)]
    pub workload_name: Option<String>,

    #[arg(long)]
    pub workload_namespace: Option<String>,

    #[arg(long)]
    pub workload_crd: Option<String>,

    #[arg(long)]
    pub build_context: Option<PathBuf>,

    /// Host port for the in-cluster registry
    #[arg(long)]
    pub registry_port: Option<u16>,

    /// Seconds to wait for each deployment to become Available
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Directory that file arguments must stay inside
    #[arg(long)]
    pub workspace: Option<PathBuf>,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Plan { setup, json } => cmd_plan(&setup, json),
        Commands::Up { setup } => cmd_up(&setup),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kindling", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join(DEFAULT_CONFIG);
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let template = r#"# kindling bootstrap configuration. Every field is optional.
cluster:
  name: platform
  provider: kind          # kind | k3d | minikube

tls: false                # use <manifests_dir>/*/overlays/tls.yaml
test_mode: false          # tag :test and load into the cluster instead of pushing

manifests_dir: deploy

registry:
  namespace: registry
  storage: emptydir       # emptydir | pvc
  size: 10Gi
  # external: ghcr.io/acme

ingress:
  mode: nginx             # nginx | traefik
  # manifest: deploy/ingress/custom.yaml

workload:
  name: platform-operator
  namespace: platform-system
  crd: platforms.kindling.dev
  build_context: .

tools:
  registry_port: 5001
  wait_timeout_secs: 300
  workspace: .
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized kindling project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_plan(args: &SetupArgs, json: bool) -> Result<(), String> {
    let (plan, settings) = resolve(args)?;
    let ctx = SetupContext::new(plan);
    let steps = Pipeline::new(&ctx).step_names();

    if json {
        let out = plan_json(&ctx.plan, &settings, &steps);
        let text = serde_json::to_string_pretty(&out).map_err(|e| format!("JSON error: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    print!("{}", render_plan(&ctx.plan, &settings, &steps));
    Ok(())
}

fn cmd_up(args: &SetupArgs) -> Result<(), String> {
    let (plan, settings) = resolve(args)?;
    let executor = LocalExecutor::new().with_working_dir(&settings.workspace);
    let ctx = run_setup(plan, settings, executor)?;

    println!();
    println!("Platform ready:");
    if let Some(ref context) = ctx.cluster_context {
        println!("  kube context: {}", context);
    }
    if let Some(ref image) = ctx.image_ref {
        println!("  image:        {}", image);
    }
    if let Some(ref secret) = ctx.tls_secret {
        println!("  tls secret:   {}", secret);
    }
    Ok(())
}

/// Run the full pipeline for `plan` with tool collaborators on `executor`.
fn run_setup<E: Executor>(
    plan: SetupPlan,
    settings: ToolSettings,
    executor: E,
) -> Result<SetupContext, String> {
    let deps = ToolDeps::new(executor, settings).with_image_name(&plan.workload.name);
    let span = tracing::info_span!("setup", cluster = %plan.cluster_name);
    let mut ctx = SetupContext::new(plan);
    let mut pipeline = Pipeline::new(&ctx);
    pipeline
        .execute(&span, &deps, &mut ctx)
        .map_err(|e| e.to_string())?;
    Ok(ctx)
}

/// Load config, merge flags over it, resolve and validate.
fn resolve(args: &SetupArgs) -> Result<(SetupPlan, ToolSettings), String> {
    let config = load_config(args.file.as_deref())?;
    let input = merge_input(config.plan_input(), args);
    let settings = merge_settings(config.tool_settings(), args);
    let plan = planner::resolve_plan(&input);

    let errors = parser::validate_plan(&plan, &settings);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(format!("{} validation error(s)", errors.len()));
    }
    Ok((plan, settings))
}

/// An explicit file must exist; the default file is optional.
fn load_config(file: Option<&Path>) -> Result<ConfigFile, String> {
    match file {
        Some(path) => parser::parse_config_file(path),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            parser::parse_config_file(Path::new(DEFAULT_CONFIG))
        }
        None => Ok(ConfigFile::default()),
    }
}

fn merge_input(base: PlanInput, args: &SetupArgs) -> PlanInput {
    PlanInput {
        cluster_name: args.cluster_name.clone().or(base.cluster_name),
        provider: args.provider.or(base.provider),
        tls: args.tls || base.tls,
        test_mode: args.test_mode || base.test_mode,
        registry_namespace: args.registry_namespace.clone().or(base.registry_namespace),
        registry_storage: args.registry_storage.or(base.registry_storage),
        registry_size: args.registry_size.clone().or(base.registry_size),
        external_registry: args.external_registry.clone().or(base.external_registry),
        ingress_mode: args.ingress_mode.or(base.ingress_mode),
        ingress_manifest: args.ingress_manifest.clone().or(base.ingress_manifest),
        manifests_dir: args.manifests_dir.clone().or(base.manifests_dir),
        workload_name: args.workload_name.clone().or(base.workload_name),
        workload_namespace: args.workload_namespace.clone().or(base.workload_namespace),
        workload_crd: args.workload_crd.clone().or(base.workload_crd),
        build_context: args.build_context.clone().or(base.build_context),
    }
}

fn merge_settings(base: ToolSettings, args: &SetupArgs) -> ToolSettings {
    ToolSettings {
        registry_port: args.registry_port.unwrap_or(base.registry_port),
        wait_timeout: args
            .wait_timeout
            .map(Duration::from_secs)
            .unwrap_or(base.wait_timeout),
        workspace: args.workspace.clone().unwrap_or(base.workspace),
    }
}

fn plan_json(plan: &SetupPlan, settings: &ToolSettings, steps: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "plan": plan,
        "registry_port": settings.registry_port,
        "wait_timeout_secs": settings.wait_timeout.as_secs(),
        "steps": steps,
    })
}

fn render_plan(plan: &SetupPlan, settings: &ToolSettings, steps: &[&str]) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| out.push_str(&format!("{:<10} {}\n", label, value));

    line("Cluster:", format!("{} ({})", plan.cluster_name, plan.provider));
    line(
        "TLS:",
        if plan.tls_enabled { "enabled" } else { "disabled" }.to_string(),
    );
    match plan.registry.external {
        Some(ref host) => line("Registry:", format!("external {}", host)),
        None => line(
            "Registry:",
            format!(
                "{} ns, {} {}, localhost:{} ({})",
                plan.registry.namespace,
                plan.registry.storage,
                plan.registry.size,
                settings.registry_port,
                plan.registry.manifest.display()
            ),
        ),
    }
    line(
        "Ingress:",
        format!("{} ({})", plan.ingress.mode, plan.ingress.manifest.display()),
    );
    line(
        "Workload:",
        format!(
            "{} in {} (CRD {}, build {})",
            plan.workload.name,
            plan.workload.namespace,
            plan.workload.crd,
            plan.workload.build_context.display()
        ),
    );
    if plan.test_mode {
        line("Mode:", "test".to_string());
    }
    line("Steps:", steps.join(" -> "));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::recording::{CannedResult, RecordingExecutor};

    #[test]
    fn test_cli_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("project");
        cmd_init(&sub).unwrap();
        let written = sub.join(DEFAULT_CONFIG);
        assert!(written.exists());

        // The starter file parses and resolves to the built-in defaults.
        let config = parser::parse_config_file(&written).unwrap();
        assert_eq!(
            planner::resolve_plan(&config.plan_input()),
            planner::resolve_plan(&PlanInput::default())
        );
        assert_eq!(config.tool_settings(), ToolSettings::default());
    }

    #[test]
    fn test_cli_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG), "exists").unwrap();
        let result = cmd_init(dir.path());
        assert!(result.unwrap_err().contains("already exists"));
    }

    #[test]
    fn test_cli_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kindling.yaml");
        std::fs::write(
            &file,
            "cluster:\n  name: from-file\n  provider: k3d\nregistry:\n  size: 5Gi\ntools:\n  registry_port: 6000\n",
        )
        .unwrap();
        let args = SetupArgs {
            file: Some(file),
            cluster_name: Some("from-flag".into()),
            tls: true,
            wait_timeout: Some(12),
            ..SetupArgs::default()
        };
        let (plan, settings) = resolve(&args).unwrap();
        assert_eq!(plan.cluster_name, "from-flag");
        assert_eq!(plan.provider, ClusterProvider::K3d);
        assert_eq!(plan.registry.size, "5Gi");
        assert!(plan.tls_enabled);
        assert_eq!(settings.registry_port, 6000);
        assert_eq!(settings.wait_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_cli_explicit_missing_file_is_error() {
        let args = SetupArgs {
            file: Some(PathBuf::from("/nonexistent/kindling.yaml")),
            ..SetupArgs::default()
        };
        assert!(resolve(&args).unwrap_err().contains("failed to read"));
    }

    #[test]
    fn test_cli_validation_errors_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kindling.yaml");
        std::fs::write(&file, "").unwrap();
        let args = SetupArgs {
            file: Some(file),
            cluster_name: Some("Bad Name".into()),
            registry_port: Some(0),
            ..SetupArgs::default()
        };
        assert_eq!(resolve(&args).unwrap_err(), "2 validation error(s)");
    }

    #[test]
    fn test_cli_render_plan() {
        let plan = planner::resolve_plan(&PlanInput {
            tls: true,
            test_mode: true,
            ..PlanInput::default()
        });
        let ctx = SetupContext::new(plan);
        let steps = Pipeline::new(&ctx).step_names();
        let text = render_plan(&ctx.plan, &ToolSettings::default(), &steps);
        assert!(text.contains("platform (kind)"));
        assert!(text.contains("TLS:       enabled"));
        assert!(text.contains("localhost:5001"));
        assert!(text.contains("deploy/ingress/overlays/tls.yaml"));
        assert!(text.contains("Mode:      test"));
        assert!(text.contains("cluster -> tls -> registry -> image-build -> image-deploy -> verify"));
    }

    #[test]
    fn test_cli_plan_json() {
        let plan = planner::resolve_plan(&PlanInput {
            tls: true,
            ..PlanInput::default()
        });
        let ctx = SetupContext::new(plan);
        let steps = Pipeline::new(&ctx).step_names();
        let value = plan_json(&ctx.plan, &ToolSettings::default(), &steps);
        let text = serde_json::to_string_pretty(&value).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(
            parsed["steps"],
            serde_json::json!(["cluster", "tls", "registry", "image-build", "image-deploy", "verify"])
        );
        assert_eq!(parsed["plan"]["tls_enabled"], serde_json::json!(true));
        assert_eq!(parsed["plan"]["provider"], serde_json::json!("kind"));
        assert_eq!(
            parsed["plan"]["registry"]["manifest"],
            serde_json::json!("deploy/registry/overlays/tls.yaml")
        );
        assert_eq!(parsed["registry_port"], serde_json::json!(5001));
        assert_eq!(parsed["wait_timeout_secs"], serde_json::json!(300));
    }

    #[test]
    fn test_cli_plan_json_command() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kindling.yaml");
        std::fs::write(&file, "tls: true\n").unwrap();
        let args = SetupArgs {
            file: Some(file),
            ..SetupArgs::default()
        };
        cmd_plan(&args, true).unwrap();
    }

    #[test]
    fn test_cli_render_plan_external_registry() {
        let plan = planner::resolve_plan(&PlanInput {
            external_registry: Some("ghcr.io/acme".into()),
            ..PlanInput::default()
        });
        let text = render_plan(&plan, &ToolSettings::default(), &[]);
        assert!(text.contains("external ghcr.io/acme"));
        assert!(!text.contains("Mode:"));
    }

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, body) in [
            ("deploy/registry/overlays/plain.yaml", "ns: {{NAMESPACE}}\n"),
            ("deploy/workload/workload.yaml", "image: {{IMAGE}}\n"),
        ] {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        dir
    }

    #[test]
    fn test_cli_run_setup_end_to_end() {
        let dir = workspace();
        let rec = RecordingExecutor::new();
        rec.respond("kind get", CannedResult::ok("platform\n"));
        let settings = ToolSettings {
            workspace: dir.path().to_path_buf(),
            ..ToolSettings::default()
        };
        let plan = planner::resolve_plan(&PlanInput::default());

        let ctx = run_setup(plan, settings, rec.clone()).unwrap();
        assert_eq!(ctx.cluster_context.as_deref(), Some("kind-platform"));
        assert_eq!(
            ctx.image_ref.as_deref(),
            Some("localhost:5001/platform-operator:latest")
        );
        assert!(ctx.workload_deployed);
        assert!(rec.contains("docker"));
        assert!(!rec.contains("openssl"));

        let waits: Vec<String> = rec
            .calls_to("kubectl")
            .iter()
            .filter(|s| s.args.first().map(String::as_str) == Some("wait"))
            .map(|s| s.args[2].clone())
            .collect();
        assert_eq!(
            waits,
            vec![
                "deployment/registry",
                "deployment/ingress-nginx-controller",
                "deployment/platform-operator",
            ]
        );
    }

    #[test]
    fn test_cli_run_setup_missing_crd_fails_verify() {
        let dir = workspace();
        let rec = RecordingExecutor::new();
        rec.respond("kind get", CannedResult::ok("platform\n"));
        rec.respond("kubectl get", CannedResult::failure(1, "NotFound"));
        let settings = ToolSettings {
            workspace: dir.path().to_path_buf(),
            ..ToolSettings::default()
        };
        let plan = planner::resolve_plan(&PlanInput::default());
        let err = run_setup(plan, settings, rec).unwrap_err();
        assert!(err.starts_with("step 'verify' failed"), "{}", err);
    }

    #[test]
    fn test_cli_parse_args() {
        let cli = Cli::try_parse_from([
            "kindling",
            "-v",
            "plan",
            "--json",
            "--provider",
            "minikube",
            "--registry-storage",
            "emptydir",
            "--tls",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Plan { setup, json } => {
                assert!(json);
                assert!(setup.tls);
                assert_eq!(setup.provider, Some(ClusterProvider::Minikube));
                assert_eq!(setup.registry_storage, Some(RegistryStorage::EmptyDir));
            }
            other => panic!("unexpected command {:?}", other),
        }
        Cli::command().debug_assert();
    }
}
