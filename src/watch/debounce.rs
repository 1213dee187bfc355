// src/watch/debounce.rs

//! Drain-with-timeout debouncing.
//!
//! The first event of a burst is acted on immediately by the controller;
//! afterwards [`Debouncer::settle`] discards whatever else arrives within a
//! fixed window so that an editor writing several files produces a single
//! reload. Once the window closes the next event is acted on again.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::engine::shutdown::ShutdownSignal;
use crate::watch::ChangeEvent;

/// How a settle call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleEnd {
    /// The window elapsed normally.
    Quiet,
    /// Shutdown was requested while draining; the caller should act on it
    /// right away.
    Shutdown,
    /// The event source closed.
    Closed,
}

/// Result of draining one burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    pub discarded: usize,
    /// At least one swallowed event was for a directory, so the tree may
    /// have new directories that still need registering.
    pub directory_changed: bool,
    pub end: SettleEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Discard events until `window` has passed since the call, then discard
    /// anything already queued without waiting further.
    pub async fn settle(
        &self,
        events: &mut mpsc::UnboundedReceiver<ChangeEvent>,
        shutdown: &mut ShutdownSignal,
    ) -> Settled {
        let now = Instant::now();
        let deadline = now.checked_add(self.window).unwrap_or_else(|| far_future(now));
        let mut settled = Settled {
            discarded: 0,
            directory_changed: false,
            end: SettleEnd::Quiet,
        };

        loop {
            tokio::select! {
                biased;

                _ = shutdown.requested() => {
                    settled.end = SettleEnd::Shutdown;
                    return settled;
                }

                next = timeout_at(deadline, events.recv()) => match next {
                    Ok(Some(event)) => settled.absorb(&event),
                    Ok(None) => {
                        settled.end = SettleEnd::Closed;
                        return settled;
                    }
                    Err(_elapsed) => break,
                },
            }
        }

        while let Ok(event) = events.try_recv() {
            settled.absorb(&event);
        }

        if settled.discarded > 0 {
            debug!(
                discarded = settled.discarded,
                window_ms = self.window.as_millis() as u64,
                "debounced follow-up events"
            );
        }
        settled
    }
}

/// Roughly 30 years out; used when `window` overflows `Instant`.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}

impl Settled {
    fn absorb(&mut self, event: &ChangeEvent) {
        self.discarded += 1;
        self.directory_changed |= event.is_directory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shutdown::shutdown_channel;

    #[tokio::test(start_paused = true)]
    async fn burst_inside_window_is_swallowed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_trigger, mut shutdown) = shutdown_channel();

        for i in 0..5 {
            tx.send(ChangeEvent::file(format!("/p/file{i}.go"))).unwrap();
        }
        tx.send(ChangeEvent::directory("/p/newdir")).unwrap();

        let settled = Debouncer::new(Duration::from_millis(50))
            .settle(&mut rx, &mut shutdown)
            .await;

        assert_eq!(settled.discarded, 6);
        assert!(settled.directory_changed);
        assert_eq!(settled.end, SettleEnd::Quiet);
    }

    #[tokio::test(start_paused = true)]
    async fn events_after_window_are_left_for_the_caller() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_trigger, mut shutdown) = shutdown_channel();

        let late_tx = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            late_tx.send(ChangeEvent::file("/p/late.go")).unwrap();
        });
        tx.send(ChangeEvent::file("/p/early.go")).unwrap();

        let settled = Debouncer::new(Duration::from_millis(50))
            .settle(&mut rx, &mut shutdown)
            .await;
        assert_eq!(settled.discarded, 1);

        let next = rx.recv().await.unwrap();
        assert_eq!(next.path, std::path::PathBuf::from("/p/late.go"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_the_window() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let (trigger, mut shutdown) = shutdown_channel();
        trigger.request();

        let settled = Debouncer::new(Duration::from_secs(60))
            .settle(&mut rx, &mut shutdown)
            .await;
        assert_eq!(settled.end, SettleEnd::Shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_window_does_not_overflow() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (trigger, mut shutdown) = shutdown_channel();
        tx.send(ChangeEvent::file("/p/main.go")).unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.request();
        });

        let settled = Debouncer::new(Duration::from_secs(u64::MAX))
            .settle(&mut rx, &mut shutdown)
            .await;
        assert_eq!(settled.discarded, 1);
        assert_eq!(settled.end, SettleEnd::Shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_source_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let (_trigger, mut shutdown) = shutdown_channel();
        drop(tx);

        let settled = Debouncer::new(Duration::from_millis(50))
            .settle(&mut rx, &mut shutdown)
            .await;
        assert_eq!(settled.end, SettleEnd::Closed);
    }
}
