//! Node labeller CLI.
//!
//! - `derive`: read capability descriptors and print the derived facts and labels
//! - `run`: keep a node's labels in line with the host until interrupted
//! - `check`: validate the configuration and print the resolved values

use clap::{Args, Parser, Subcommand};
use nl_common::NodeName;
use nl_config::{load_config, ClusterConfig, ResolvedConfig};
use nl_core::capabilities::{Arch, CapabilityManager};
use nl_core::exit_codes::ExitCode;
use nl_core::labels::build_labels;
use nl_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use nl_core::node::FileNodeStore;
use nl_core::probe::{RealtimeCheck, RealtimeProbe, StaticRealtime};
use nl_core::NodeLabeller;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Label cluster nodes with the CPU capabilities of their host
#[derive(Parser)]
#[command(name = "node-labeller")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to labeller.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive capabilities from a descriptor directory and print the labels
    Derive(DeriveArgs),

    /// Reconcile a file-backed node until interrupted
    Run(RunArgs),

    /// Validate configuration and print the resolved values
    Check,
}

#[derive(Args, Debug)]
struct DeriveArgs {
    /// Directory holding the capability descriptors
    #[arg(long)]
    capabilities_dir: Option<PathBuf>,

    /// Architecture rules to apply (amd64, arm64, s390x)
    #[arg(long)]
    arch: Option<Arch>,

    /// Query the realtime scheduling probe instead of assuming no support
    #[arg(long)]
    probe_realtime: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON file holding the node resource
    #[arg(long)]
    node_file: PathBuf,

    /// Node name; defaults to the configured name or NODE_NAME
    #[arg(long)]
    node: Option<String>,

    /// Directory holding the capability descriptors
    #[arg(long)]
    capabilities_dir: Option<PathBuf>,

    /// Architecture rules to apply (amd64, arm64, s390x)
    #[arg(long)]
    arch: Option<Arch>,

    /// Run a single reconcile cycle and exit
    #[arg(long)]
    once: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Ok
            };
            std::process::exit(code.as_i32());
        }
    };

    let mut log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    log_config.level = log_config.level.raised_by(cli.global.verbose);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("node-labeller: failed to initialize logging: {}", e);
    }

    let exit_code = match cli.command {
        Commands::Derive(args) => run_derive(&cli.global, &args),
        Commands::Run(args) => run_labeller(&cli.global, &args),
        Commands::Check => run_check(&cli.global),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Commands
// ============================================================================

fn run_derive(global: &GlobalOpts, args: &DeriveArgs) -> ExitCode {
    let resolved = match resolve_config(global) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let config = &resolved.config;

    let arch = match resolve_arch(args.arch, config.arch.as_deref()) {
        Ok(arch) => arch,
        Err(code) => return code,
    };
    let dir = args
        .capabilities_dir
        .clone()
        .unwrap_or_else(|| config.capabilities_dir.clone());

    let mut manager = CapabilityManager::new(&dir, arch);
    let derived = match manager.reload() {
        Ok(derived) => derived.clone(),
        Err(e) => return report_error(&e.into()),
    };

    let realtime = if args.probe_realtime {
        let probe = RealtimeProbe::new(&config.realtime_probe);
        match build_runtime() {
            Ok(runtime) => runtime.block_on(probe.is_realtime_capable()),
            Err(code) => return code,
        }
    } else {
        false
    };

    let output = build_labels(&derived, &config.obsolete_cpu_models, realtime);
    print_json(&serde_json::json!({
        "capabilities_dir": dir.display().to_string(),
        "arch": arch,
        "derived": derived,
        "labels": output.labels,
        "advisories": output.advisories,
    }))
}

fn run_labeller(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    let resolved = match resolve_config(global) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let config = resolved.config.clone();

    let Some(name) = args.node.clone().or_else(|| config.resolved_node_name()) else {
        eprintln!("node-labeller: node name not set (use --node, node_name in the config, or NODE_NAME)");
        return ExitCode::ArgsError;
    };
    let Some(node) = NodeName::parse(&name) else {
        eprintln!("node-labeller: invalid node name: {}", name);
        return ExitCode::ArgsError;
    };
    let arch = match resolve_arch(args.arch, config.arch.as_deref()) {
        Ok(arch) => arch,
        Err(code) => return code,
    };
    let dir = args
        .capabilities_dir
        .clone()
        .unwrap_or_else(|| config.capabilities_dir.clone());

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };

    runtime.block_on(async {
        let realtime: Arc<dyn RealtimeCheck> = if config.realtime_probe.enabled {
            Arc::new(RealtimeProbe::new(&config.realtime_probe))
        } else {
            Arc::new(StaticRealtime(false))
        };
        let cluster = Arc::new(ClusterConfig::new(config.obsolete_cpu_models.clone()));
        let labeller = NodeLabeller::new(
            node,
            Arc::new(FileNodeStore::new(&args.node_file)),
            Box::new(CapabilityManager::new(&dir, arch)),
            Arc::clone(&cluster),
        )
        .with_realtime(realtime)
        .with_reconcile_config(&config.reconcile);

        if args.once {
            return match labeller.execute().await {
                Ok(outcome) => print_json(&serde_json::json!({
                    "node": labeller.node(),
                    "outcome": outcome,
                })),
                Err(e) => report_error(&e),
            };
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let loop_handle = tokio::spawn(Arc::new(labeller).run(config.reconcile.workers, stop_rx));
        wait_for_shutdown(&cluster, resolved.path.as_deref()).await;
        let _ = stop_tx.send(true);

        match loop_handle.await {
            Ok(()) => ExitCode::Ok,
            Err(e) => {
                error!(error = %e, "reconcile loop panicked");
                ExitCode::InternalError
            }
        }
    })
}

#[derive(Serialize)]
struct CheckReport<'a> {
    status: &'static str,
    source: String,
    path: Option<String>,
    node_name: Option<String>,
    arch: Option<Arch>,
    config: &'a nl_config::LabellerConfig,
}

fn run_check(global: &GlobalOpts) -> ExitCode {
    let resolved = match resolve_config(global) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };
    let arch = match resolve_arch(None, resolved.config.arch.as_deref()) {
        Ok(arch) => Some(arch),
        Err(_) => None,
    };

    print_json(&CheckReport {
        status: "ok",
        source: resolved.source.to_string(),
        path: resolved.path.as_ref().map(|p| p.display().to_string()),
        node_name: resolved.config.resolved_node_name(),
        arch,
        config: &resolved.config,
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_config(global: &GlobalOpts) -> Result<ResolvedConfig, ExitCode> {
    match load_config(global.config.as_deref()) {
        Ok(resolved) => {
            info!(source = %resolved.source, path = ?resolved.path, "configuration loaded");
            Ok(resolved)
        }
        Err(e) => Err(report_error(&e.into())),
    }
}

/// CLI flag first, then the config file, then the build target.
fn resolve_arch(cli: Option<Arch>, configured: Option<&str>) -> Result<Arch, ExitCode> {
    if let Some(arch) = cli {
        return Ok(arch);
    }
    if let Some(value) = configured {
        return value.parse().map_err(|e: String| {
            eprintln!("node-labeller: {}", e);
            ExitCode::ConfigError
        });
    }
    Arch::host().ok_or_else(|| {
        eprintln!(
            "node-labeller: unsupported host architecture {}, pass --arch",
            std::env::consts::ARCH
        );
        ExitCode::ArgsError
    })
}

fn build_runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            eprintln!("node-labeller: failed to start async runtime: {}", e);
            ExitCode::InternalError
        })
}

/// Block until SIGINT/SIGTERM. SIGHUP re-reads the obsolete model list.
#[cfg(unix)]
async fn wait_for_shutdown(cluster: &ClusterConfig, config_path: Option<&Path>) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut hangup, mut terminate) = match (
        signal(SignalKind::hangup()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(hangup), Ok(terminate)) => (hangup, terminate),
        _ => {
            warn!("failed to install signal handlers, waiting for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
            _ = hangup.recv() => match config_path {
                Some(path) => match cluster.reload_from(path) {
                    Ok(changed) => info!(path = %path.display(), changed, "configuration reloaded"),
                    Err(e) => warn!(path = %path.display(), error = %e, "configuration reload failed, keeping previous values"),
                },
                None => info!("no configuration file to reload"),
            },
        }
    }
    info!("shutdown requested");
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_cluster: &ClusterConfig, _config_path: Option<&Path>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

fn report_error(err: &nl_common::Error) -> ExitCode {
    let structured = err.to_structured();
    error!(
        code = structured.code,
        category = %structured.category,
        retryable = structured.retryable,
        "{}",
        structured.message
    );
    eprintln!("node-labeller: {}: {}", err.headline(), err);
    ExitCode::for_error(err)
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::Ok
        }
        Err(e) => report_error(&e.into()),
    }
}
