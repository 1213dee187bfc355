#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Write `contents` to `<dir>/gowatch.toml` and return its path.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("gowatch.toml");
    fs::write(&path, contents).expect("write config");
    path
}

/// Whether `pid` is still a running (non-zombie) process.
#[cfg(target_os = "linux")]
pub fn pid_alive(pid: u32) -> bool {
    // Reaped processes have no /proc entry; unreaped ones show state Z or X.
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            let state = stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .unwrap_or("X");
            !matches!(state, "Z" | "X")
        }
        Err(_) => false,
    }
}

/// Poll `path` until it holds a complete line and return it trimmed.
pub async fn read_line_when_ready(path: &Path) -> String {
    gowatch_test_utils::with_timeout(async {
        loop {
            if let Ok(s) = fs::read_to_string(path) {
                if s.ends_with('\n') {
                    return s.trim().to_string();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}
