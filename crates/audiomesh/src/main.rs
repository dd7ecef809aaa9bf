//! `audiomesh` entry point.
//!
//! Loads the config, installs logging, and dispatches to one of the
//! subcommands defined in [`audiomesh::cli`].  `start` commands without
//! `--foreground` re-launch this binary in the background through a PID file
//! and return at once; the foreground process does the actual work and runs
//! until Ctrl-C or SIGTERM.
//!
//! Logs go to stderr.  Peer output goes to stdout, so `--json` output can be
//! piped.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mesh_core::NodeId;
use mesh_discovery::{Announcer, ChannelObserver, Listener};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use audiomesh::application::PeerDirectory;
use audiomesh::cli::{
    ApiArgs, AudioCoreAction, AudioCoreStartArgs, Cli, Command, DiscoveryAction,
    DiscoveryStartArgs, StopArgs,
};
use audiomesh::domain::config::{self, AppConfig};
use audiomesh::infrastructure::daemon::{self, StartOutcome, StopOutcome};
use audiomesh::infrastructure::health;
use audiomesh::infrastructure::pidfile::PidFile;
use audiomesh::infrastructure::stream::StreamSupervisor;

const DISCOVERY: &str = "discovery";
const AUDIO_CORE: &str = "audio-core";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let log_level = loaded
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let mut app_config = loaded.context("failed to load configuration")?;

    let runtime_dir = runtime_dir(cli.config.as_deref())?;

    match cli.command {
        Command::Discovery {
            action: DiscoveryAction::Start(args),
        } => {
            let pid_file = pid_file(args.pid_file.as_deref(), &runtime_dir, DISCOVERY);
            if args.foreground {
                args.apply_to(&mut app_config);
                run_discovery(&app_config, &args, &pid_file).await
            } else {
                start_background(&pid_file, &runtime_dir, DISCOVERY)
            }
        }
        Command::Discovery {
            action: DiscoveryAction::Stop(args),
        } => stop_background(&args, &runtime_dir, DISCOVERY),
        Command::AudioCore {
            action: AudioCoreAction::Start(args),
        } => {
            let pid_file = pid_file(args.pid_file.as_deref(), &runtime_dir, AUDIO_CORE);
            if args.foreground {
                run_audio_core(&app_config, &args, &pid_file).await
            } else {
                start_background(&pid_file, &runtime_dir, AUDIO_CORE)
            }
        }
        Command::AudioCore {
            action: AudioCoreAction::Stop(args),
        } => stop_background(&args, &runtime_dir, AUDIO_CORE),
        Command::Api(args) => run_api(&mut app_config, &args).await,
    }
}

// ── Foreground commands ───────────────────────────────────────────────────────

async fn run_discovery(
    app_config: &AppConfig,
    args: &DiscoveryStartArgs,
    pid_file: &PidFile,
) -> anyhow::Result<()> {
    let node_id: NodeId = app_config.node_id();
    let format = args.output_format();

    let (observer, mut events) = ChannelObserver::new();
    let mut listener = Listener::new(app_config.listener_config(), Arc::new(observer));
    listener
        .start()
        .await
        .context("failed to start discovery listener")?;

    let mut announcer = Announcer::new(app_config.announcer_config(node_id));
    if let Err(e) = announcer.start().await {
        listener.stop().await;
        return Err(e).context("failed to start announcer");
    }
    info!(%node_id, "discovery running; press Ctrl-C to stop");

    let mut directory = PeerDirectory::new();
    let mut stdout = std::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            event = events.recv() => {
                let Some(event) = event else { break Ok(()) };
                let Some(change) = directory.apply(event) else { continue };
                let text = match format.render(&change, &directory) {
                    Ok(text) => text,
                    Err(e) => break Err(anyhow::Error::new(e).context("failed to render peer change")),
                };
                if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
                    break Err(anyhow::Error::new(e).context("failed to write peer output"));
                }
            }
        }
    };

    announcer.stop().await;
    listener.stop().await;
    if let Err(e) = pid_file.remove_if_owned(std::process::id()) {
        warn!("could not remove PID file: {e}");
    }
    result
}

async fn run_audio_core(
    app_config: &AppConfig,
    args: &AudioCoreStartArgs,
    pid_file: &PidFile,
) -> anyhow::Result<()> {
    let mut supervisor = StreamSupervisor::new(app_config.stream.program.clone(), app_config.stop_grace());
    let pid = supervisor
        .start_stream(&args.peer, &args.name)
        .context("failed to start audio stream")?;
    println!("{pid}");

    let exited = tokio::select! {
        _ = shutdown_signal() => None,
        status = supervisor.wait(pid) => Some(status),
    };
    match exited {
        None => {
            for (pid, result) in supervisor.stop_all().await {
                match result {
                    Ok(exit) => info!(pid, ?exit, "stream stopped"),
                    Err(e) => warn!(pid, "failed to stop stream: {e}"),
                }
            }
        }
        Some(Ok(status)) => info!(pid, %status, "stream exited"),
        Some(Err(e)) => warn!(pid, "lost track of stream: {e}"),
    }

    if let Err(e) = pid_file.remove_if_owned(std::process::id()) {
        warn!("could not remove PID file: {e}");
    }
    Ok(())
}

async fn run_api(app_config: &mut AppConfig, args: &ApiArgs) -> anyhow::Result<()> {
    args.apply_to(app_config);
    let addr = app_config.api_addr();
    health::serve(addr, shutdown_signal())
        .await
        .with_context(|| format!("health API failed on {addr}"))
}

// ── Background commands ───────────────────────────────────────────────────────

fn start_background(pid_file: &PidFile, runtime_dir: &Path, name: &str) -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("failed to locate the audiomesh executable")?;
    let args: Vec<_> = std::env::args_os().skip(1).collect();
    let log_path = runtime_dir.join(format!("{name}.log"));
    std::fs::create_dir_all(runtime_dir)
        .with_context(|| format!("failed to create {}", runtime_dir.display()))?;

    match daemon::start_detached(pid_file, &exe, &args, &log_path)
        .with_context(|| format!("failed to start {name} in the background"))?
    {
        StartOutcome::AlreadyRunning(pid) => println!("{name} already running (PID {pid})"),
        StartOutcome::Spawned(pid) => {
            println!("{name} started (PID {pid}); logging to {}", log_path.display())
        }
    }
    Ok(())
}

fn stop_background(args: &StopArgs, runtime_dir: &Path, name: &str) -> anyhow::Result<()> {
    let pid_file = pid_file(args.pid_file.as_deref(), runtime_dir, name);
    match daemon::stop_detached(&pid_file).with_context(|| format!("failed to stop {name}"))? {
        StopOutcome::NotRunning => println!("{name} is not running"),
        StopOutcome::Stale(pid) => println!("{name} was not running (removed stale PID {pid})"),
        StopOutcome::Signalled(pid) => println!("{name} stopped (PID {pid})"),
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Directory for PID and log files: next to an explicit config file, or the
/// platform config dir.
fn runtime_dir(config_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config_path.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.to_path_buf()),
        Some(_) => Ok(PathBuf::from(".")),
        None => config::config_dir().context("failed to resolve runtime directory"),
    }
}

fn pid_file(explicit: Option<&Path>, runtime_dir: &Path, name: &str) -> PidFile {
    match explicit {
        Some(path) => PidFile::new(path),
        None => PidFile::in_dir(runtime_dir, name),
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
