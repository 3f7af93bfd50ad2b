use crate::domain::jobs::PipelineEvent;

/// Sink for pipeline progress. Publishing never fails the pipeline.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: PipelineEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: PipelineEvent) {}
}
