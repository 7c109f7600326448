use crate::service::AnalyticsService;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to the periodic background refresh loop. At most one loop runs.
#[derive(Default)]
pub struct RefreshTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort any running loop and start a new one ticking every `interval`.
    pub fn restart(&self, service: Arc<AnalyticsService>, interval: Duration) {
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match service.refresh().await {
                    Ok(snapshot) => tracing::info!(
                        sites = snapshot.sites.len(),
                        "Background refresh completed"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Background refresh failed"),
                }
            }
        });

        if let Some(previous) = self.handle.lock().replace(task) {
            previous.abort();
        }
        tracing::debug!(interval_secs = interval.as_secs(), "Background refresh scheduled");
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.stop();
    }
}
