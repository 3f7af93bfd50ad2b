use super::hub::EventHub;
use crate::application::jobs::JobRegistry;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Fold every event from the hub into the job registry until the hub is dropped.
pub fn start(event_hub: Arc<EventHub>, jobs: Arc<JobRegistry>) -> JoinHandle<()> {
    let mut rx = event_hub.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !jobs.apply(&event) {
                        tracing::debug!(job_id = %event.job_id(), "event for untracked run");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "job listener lagged behind, events lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
