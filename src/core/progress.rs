// src/core/progress.rs

use crate::constants::{DEFAULT_TICK_INTERVAL_MS, PROGRESS_FRAMES};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Animates a spinner while a blocking operation runs.
#[derive(Debug, Clone, Copy)]
pub struct ProgressNotifier {
    interval: Duration,
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TICK_INTERVAL_MS))
    }
}

impl ProgressNotifier {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `body` on the current thread while a scoped ticker calls
    /// `on_tick` with the next spinner frame, first right away and then once per
    /// interval.
    ///
    /// The ticker is signalled and joined before this returns, on every exit
    /// path: normal return, `Err` results, and panics unwinding out of `body`.
    pub fn with_progress<T, Tick, Body>(&self, on_tick: Tick, body: Body) -> T
    where
        Tick: FnMut(&str) + Send,
        Body: FnOnce() -> T,
    {
        let interval = self.interval;
        thread::scope(|scope| {
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            scope.spawn(move || tick_until_stopped(interval, stop_rx, on_tick));
            // Dropped when `body` returns or unwinds; either way the ticker wakes up.
            let _stop = scopeguard::guard(stop_tx, |tx| {
                let _ = tx.send(());
            });
            body()
        })
    }
}

fn tick_until_stopped(
    interval: Duration,
    stop: mpsc::Receiver<()>,
    mut on_tick: impl FnMut(&str),
) {
    for frame in PROGRESS_FRAMES.iter().copied().cycle() {
        on_tick(frame);
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
