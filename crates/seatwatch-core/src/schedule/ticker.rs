//! Variable-interval tick source
//!
//! Delivery policy: the tick channel holds a single slot. When the consumer
//! has not taken the previous tick yet, the new tick is dropped instead of
//! queued. Losing a tick is acceptable (the next one re-reads everything);
//! building a backlog behind a stalled consumer is not.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::windows::{expand_deadlines, Deadline, ScheduleWindow};

/// Computes the wait before the next tick and drives the tick loop
#[derive(Debug, Clone)]
pub struct AdaptiveTicker {
    default_interval: Duration,
    windows: Arc<[ScheduleWindow]>,
}

impl AdaptiveTicker {
    /// Create a ticker from pre-built windows (evaluated in the given order)
    pub fn new(default_interval: Duration, windows: Vec<ScheduleWindow>) -> Self {
        Self {
            default_interval,
            windows: windows.into(),
        }
    }

    /// Create a ticker whose windows are generated from deadlines
    pub fn from_deadlines(default_interval: Duration, deadlines: &[Deadline]) -> Self {
        Self::new(default_interval, expand_deadlines(deadlines))
    }

    /// Interval used outside every window
    #[must_use]
    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    /// Windows in evaluation order
    #[must_use]
    pub fn windows(&self) -> &[ScheduleWindow] {
        &self.windows
    }

    /// How long to wait, starting at `now`, before the next tick
    ///
    /// Windows are walked in list order against a running candidate that
    /// starts at the default interval:
    /// 1. `now` inside a window: the candidate becomes that window's interval;
    /// 2. the window starts in the future but `now + candidate` reaches its
    ///    start: the candidate shrinks so the tick lands exactly on the start;
    /// 3. otherwise the candidate is kept.
    ///
    /// Every window may overwrite the candidate, so for overlapping windows
    /// the later one in the list wins, even over a tighter earlier one.
    #[must_use]
    pub fn wait_at(&self, now: DateTime<Utc>) -> Duration {
        let mut wait = self.default_interval;
        for window in self.windows.iter() {
            if window.contains(now) {
                wait = window.interval;
            } else if window.from > now {
                if let Ok(until_start) = (window.from - now).to_std() {
                    if wait >= until_start {
                        wait = until_start;
                    }
                }
            }
        }
        wait
    }

    /// Last window (in list order) containing `now`, if any
    #[must_use]
    pub fn active_window(&self, now: DateTime<Utc>) -> Option<&ScheduleWindow> {
        self.windows.iter().rev().find(|w| w.contains(now))
    }

    /// Start the tick loop on the current runtime
    ///
    /// The loop ends when `token` is cancelled or [`TickStream::stop`] is
    /// called; the stream then yields `None`.
    pub fn spawn(self, token: CancellationToken) -> TickStream {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (next_tx, next_rx) = watch::channel(None);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { self.run(tick_tx, next_tx, loop_token).await });

        TickStream {
            rx: tick_rx,
            next_tick: next_rx,
            token,
            handle,
        }
    }

    async fn run(
        self,
        tick_tx: mpsc::Sender<DateTime<Utc>>,
        next_tx: watch::Sender<Option<DateTime<Utc>>>,
        token: CancellationToken,
    ) {
        info!(
            default_interval_secs = self.default_interval.as_secs(),
            windows = self.windows.len(),
            "Adaptive ticker started"
        );

        loop {
            let now = Utc::now();
            let wait = self.wait_at(now);
            let planned = ChronoDuration::from_std(wait)
                .ok()
                .and_then(|d| now.checked_add_signed(d));
            next_tx.send_replace(planned);

            debug!(
                wait_secs = wait.as_secs(),
                window = self.active_window(now).map(|w| w.label.as_str()),
                "Next tick scheduled"
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {
                    match tick_tx.try_send(Utc::now()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!("Previous tick not consumed yet, dropping tick");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("Tick receiver dropped");
                            break;
                        }
                    }
                }
            }
        }

        next_tx.send_replace(None);
        info!("Adaptive ticker stopped");
    }
}

/// Receiving end of a running [`AdaptiveTicker`]
pub struct TickStream {
    rx: mpsc::Receiver<DateTime<Utc>>,
    next_tick: watch::Receiver<Option<DateTime<Utc>>>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickStream {
    /// Wait for the next tick; `None` once the ticker has been stopped
    pub async fn recv(&mut self) -> Option<DateTime<Utc>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            tick = self.rx.recv() => tick,
        }
    }

    /// When the next tick is planned to fire
    #[must_use]
    pub fn next_tick_at(&self) -> Option<DateTime<Utc>> {
        *self.next_tick.borrow()
    }

    /// A watch handle on the planned next tick, for status displays
    #[must_use]
    pub fn next_tick_watch(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.next_tick.clone()
    }

    /// Stop the ticker; no ticks are produced afterwards
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop the ticker and wait for its task to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests;
