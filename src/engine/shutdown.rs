// src/engine/shutdown.rs

//! Shutdown flag shared between the signal listener and the controller.
//!
//! A `watch` channel rather than an event: once set it stays set, so the
//! controller can check it synchronously right before starting a process.

use tokio::sync::watch;
use tracing::{info, warn};

/// Sending half; cloneable, any holder may request shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

/// Receiving half held by the controller.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownTrigger {
            tx: std::sync::Arc::new(tx),
        },
        ShutdownSignal { rx },
    )
}

impl ShutdownTrigger {
    pub fn request(&self) {
        self.tx.send_replace(true);
    }
}

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested. If every trigger is dropped
    /// without requesting, this never resolves.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Listen for SIGINT / SIGTERM / SIGHUP (Ctrl-C on non-Unix platforms) and
/// request shutdown on the first one.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                println!("[gowatch] Received {name}; stopping live reload server");
                info!(signal = name, "shutdown requested");
                trigger.request();
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for shutdown signals");
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}
