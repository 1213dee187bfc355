// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{load_and_validate, resolve_root};
use crate::config::model::ConfigFile;
use crate::engine::{ControllerCore, WatcherController, shutdown_channel, spawn_signal_listener};
use crate::errors::GowatchError;
use crate::exec::{ProcessSupervisor, ShellProcessController};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{Debouncer, DirectoryRegistry, NotifyBackend};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the notify backend and directory registry
/// - the process supervisor
/// - signal handling
/// - the controller loop
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let root = resolve_root(&config_path, &cfg.root);
    let root = fs
        .canonicalize(&root)
        .map_err(|e| GowatchError::registration(&root, format!("{e:#}")))?;
    info!(root = ?root, cmd = %cfg.cmd, "starting gowatch");

    let core = ControllerCore::from_config(&cfg);

    let (backend, events) = NotifyBackend::new(Arc::clone(&fs))?;
    let registry = DirectoryRegistry::new(backend, fs, root, core.filter().clone());

    let (supervisor, exits) =
        ProcessSupervisor::spawn(ShellProcessController::inherit(), cfg.kill_timeout);

    let (trigger, shutdown) = shutdown_channel();
    spawn_signal_listener(trigger);

    let controller = WatcherController::new(
        core,
        registry,
        supervisor,
        exits,
        events,
        shutdown,
        Debouncer::new(cfg.delay),
    );
    controller.run().await?;

    println!("[gowatch] Stopped");
    Ok(())
}

/// Print the resolved configuration without watching anything.
fn print_dry_run(cfg: &ConfigFile) {
    println!("gowatch dry-run");
    println!("  root = {}", cfg.root.display());
    println!("  cmd = {}", cfg.cmd);
    println!("  delay = {:?}", cfg.delay);
    println!("  kill_timeout = {:?}", cfg.kill_timeout);
    println!();

    let watch = &cfg.watch;
    println!("watch:");
    if !watch.include_files.is_empty() {
        println!("  include_files: {:?}", watch.include_files);
    }
    if !watch.exclude_files.is_empty() {
        println!("  exclude_files: {:?}", watch.exclude_files);
    }
    if !watch.include_dirs.is_empty() {
        println!("  include_dirs: {:?}", watch.include_dirs);
    }
    if !watch.exclude_dirs.is_empty() {
        println!("  exclude_dirs: {:?}", watch.exclude_dirs);
    }

    if !cfg.commands.is_empty() {
        println!();
        println!("commands ({}):", cfg.commands.len());
        for rule in &cfg.commands {
            println!("  *{} -> {}", rule.suffix(), rule.command());
        }
    }

    debug!("dry-run complete (nothing watched)");
}
