//! Periodic health check of the tool server connection.
//!
//! Checks once immediately, then every `interval`, and posts each outcome
//! to the UI event queue. The check never retries out of `Failed`; that is
//! left to an explicit reconnect.

use crate::console::AppEvent;
use crate::mcp::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background health monitor.
pub struct HealthMonitor {
    manager: Arc<ConnectionManager>,
    interval: Duration,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl HealthMonitor {
    pub fn new(
        manager: Arc<ConnectionManager>,
        interval: Duration,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            manager,
            interval,
            events,
        }
    }

    /// Run the check loop (call from a tokio::spawn).
    ///
    /// Exits when `cancel` fires or the event receiver is gone.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Health monitor started ({:?} interval)", self.interval);

        loop {
            let report = self.manager.report().await;
            debug!(
                "Health: healthy={} state={} error={:?}",
                report.healthy, report.state, report.error
            );
            if self.events.send(AppEvent::Health(report)).is_err() {
                debug!("Event queue closed, stopping health monitor");
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => {
                    info!("Health monitor shutting down");
                    return;
                }
            }
        }
    }
}
