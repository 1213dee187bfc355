// tests/process_tree_linux.rs
#![cfg(target_os = "linux")]

mod common;

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use gowatch::engine::{ControllerCore, WatcherController, shutdown_channel};
use gowatch::exec::{OutputLine, OutputMode, ProcessSupervisor, ShellProcessController};
use gowatch::fs::{FileSystem, RealFileSystem};
use gowatch::watch::{Debouncer, DirectoryRegistry, NotifyBackend};
use gowatch_test_utils::builders::ConfigFileBuilder;
use gowatch_test_utils::{init_tracing, with_timeout};

use crate::common::pid_alive;

type TestResult = Result<(), Box<dyn Error>>;

/// Shell snippet that records its own pid and a background child's pid in
/// `pid_file`, then blocks on the child.
fn tree_command(pid_file: &Path, banner: &str) -> String {
    let p = pid_file.display();
    format!("echo $$ >> {p}; sleep 30 & echo $! >> {p}; echo {banner}; wait")
}

fn read_pids(pid_file: &Path) -> Vec<u32> {
    fs::read_to_string(pid_file)
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

async fn wait_for_pids(pid_file: &Path, count: usize) -> Vec<u32> {
    with_timeout(async {
        loop {
            let pids = read_pids(pid_file);
            if pids.len() >= count {
                return pids;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

async fn wait_for_line(lines: &mut mpsc::UnboundedReceiver<OutputLine>, want: &str) {
    with_timeout(async {
        while let Some(line) = lines.recv().await {
            if line.line == want {
                return;
            }
        }
        panic!("output channel closed before {want:?}");
    })
    .await
}

#[tokio::test]
async fn restart_kills_whole_tree_before_new_output() -> TestResult {
    init_tracing();
    let scratch = tempfile::tempdir()?;
    let pid_file = scratch.path().join("pids");

    let (tx, mut lines) = mpsc::unbounded_channel();
    let (sup, _exits) = ProcessSupervisor::spawn(
        ShellProcessController::new(OutputMode::Capture(tx)),
        Duration::from_secs(5),
    );

    sup.start(tree_command(&pid_file, "first")).await?;
    wait_for_line(&mut lines, "first").await;
    let old = wait_for_pids(&pid_file, 2).await;
    assert!(old.iter().all(|pid| pid_alive(*pid)));

    sup.stop().await?;
    sup.start("echo second").await?;
    wait_for_line(&mut lines, "second").await;

    for pid in old {
        assert!(!pid_alive(pid), "pid {pid} from the previous run is still alive");
    }
    sup.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn file_change_restarts_and_shutdown_leaves_nothing_behind() -> TestResult {
    init_tracing();
    let project = tempfile::tempdir()?;
    let scratch = tempfile::tempdir()?;
    let pid_file = scratch.path().join("pids");
    fs::create_dir(project.path().join("cmd"))?;
    fs::write(project.path().join("cmd/main.go"), "package main\n")?;

    let cfg = ConfigFileBuilder::new(&tree_command(&pid_file, "up"))
        .include_file(".go")
        .delay("100ms")
        .kill_timeout("5s")
        .build();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let root = fs.canonicalize(project.path())?;
    let core = ControllerCore::from_config(&cfg);
    let (backend, events) = NotifyBackend::new(Arc::clone(&fs))?;
    let registry = DirectoryRegistry::new(backend, fs, root.clone(), core.filter().clone());
    let (supervisor, exits) =
        ProcessSupervisor::spawn(ShellProcessController::inherit(), cfg.kill_timeout);
    let (trigger, shutdown) = shutdown_channel();

    let controller = WatcherController::new(
        core,
        registry,
        supervisor.clone(),
        exits,
        events,
        shutdown,
        Debouncer::new(cfg.delay),
    );
    let task = tokio::spawn(controller.run());

    let first = wait_for_pids(&pid_file, 2).await;

    fs::write(root.join("cmd/main.go"), "package main\n\nfunc main() {}\n")?;
    let all = wait_for_pids(&pid_file, 4).await;
    for pid in &first {
        assert!(!pid_alive(*pid), "pid {pid} survived the reload");
    }

    trigger.request();
    with_timeout(task).await??;

    for pid in read_pids(&pid_file).into_iter().chain(all) {
        assert!(!pid_alive(pid), "pid {pid} survived shutdown");
    }
    assert_eq!(supervisor.stats().live, 0);
    Ok(())
}
