use crate::domain::jobs::PipelineEvent;
use crate::ports::events::EventPublisher;
use tokio::sync::broadcast;

#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<PipelineEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        // Capacity of 100 events should be sufficient for now
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    pub fn publish(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for EventHub {
    fn publish(&self, event: PipelineEvent) {
        // No subscribers is fine, progress is best effort.
        if let Err(e) = EventHub::publish(self, event) {
            tracing::debug!(job_id = %e.0.job_id(), "event dropped, no subscribers");
        }
    }
}
