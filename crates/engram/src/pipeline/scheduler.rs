//! Background archival scheduler
//!
//! Periodically runs the archival pipeline from a spawned tokio task. The
//! wait between passes is cancellable, so `stop()` takes effect mid-interval
//! instead of after the current sleep runs out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::ArchivalPipeline;

/// Periodic driver for `ArchivalPipeline::archive_candidates`.
///
/// Two states: stopped and running. Starting an already running scheduler
/// is a no-op; a stopped scheduler can be started again. Dropping a running
/// scheduler ends the loop at its next wait.
pub struct ArchivalScheduler {
    pipeline: Arc<ArchivalPipeline>,
    interval: Duration,
    target_ratio: f32,
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl ArchivalScheduler {
    pub fn new(pipeline: Arc<ArchivalPipeline>, interval: Duration, target_ratio: f32) -> Self {
        Self {
            pipeline,
            interval,
            target_ratio,
            handle: None,
            stop_tx: None,
        }
    }

    /// Whether the background loop is currently running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the background loop.
    ///
    /// `pressure_provider` is called once per tick for the current token
    /// pressure in [0, 1]; it runs inside the loop task and must not block
    /// indefinitely. Each tick runs one archival pass, then waits up to the
    /// configured interval for a stop signal. Pass errors are logged and
    /// the loop continues at the next tick.
    pub fn start<F>(&mut self, pressure_provider: F)
    where
        F: Fn() -> f32 + Send + 'static,
    {
        if self.is_running() {
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let pipeline = self.pipeline.clone();
        let interval = self.interval;
        let target_ratio = self.target_ratio;

        let handle = tokio::spawn(async move {
            loop {
                // Covers a stop that lands between ticks, when the select
                // below is not watching the channel.
                if *stop_rx.borrow() {
                    break;
                }

                let token_usage = pressure_provider();
                if let Err(e) = pipeline.archive_candidates(token_usage, target_ratio).await {
                    warn!("Archival pass failed: {e}");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => break,
                }
            }
        });

        info!("Archival scheduler started (interval {:?})", self.interval);
        self.handle = Some(handle);
        self.stop_tx = Some(stop_tx);
    }

    /// Stop the background loop and wait for it to exit.
    ///
    /// After this returns no further archival pass will run until the next
    /// `start()`. Stopping a stopped scheduler is a no-op.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
            info!("Archival scheduler stopped");
        }
    }
}
