//! Failsafe keep-alive task
//!
//! Chargers with a failsafe timer fall back to a safe current (usually zero)
//! when no Modbus write arrives within the configured window. [`Heartbeat`]
//! owns the background task that keeps feeding the timer. The task runs at
//! half the device window so a single missed tick never trips the failsafe.
//!
//! Tick failures are the task's to log, never to propagate: a dead keeper
//! must not take the foreground API down with it, and the device failsafe is
//! the safety net for a dead keeper.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running keep-alive task
///
/// Stops cleanly via [`Heartbeat::stop`]; dropping the handle stops and
/// aborts the task so a forgotten handle never leaves a keeper writing to a
/// connection that outlived its adapter.
pub struct Heartbeat {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
    period: Duration,
}

impl Heartbeat {
    /// Spawn a keeper that awaits `tick` once per `period`
    ///
    /// The first tick fires one full period after spawn; construction and
    /// enable paths have just written the device, so an immediate extra
    /// write buys nothing.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first interval tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => tick().await,
                }
            }
        });
        Self {
            handle,
            stop: stop_tx,
            period,
        }
    }

    /// Tick period of the running keeper
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ask the keeper to exit after the current tick
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
        self.handle.abort();
    }
}
