use super::jobs::JobRegistry;
use super::pipeline::{GenerationOutput, GenerationRequest, Pipeline};
use crate::domain::jobs::{JobRecord, PipelineEvent};
use crate::error::PipelineError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs pipelines under a concurrency limit, inline or as background jobs.
#[derive(Clone)]
pub struct GenerationService {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    jobs: Arc<JobRegistry>,
}

impl GenerationService {
    pub fn new(pipeline: Arc<Pipeline>, max_concurrent: usize, jobs: Arc<JobRegistry>) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            jobs,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Wait for a free slot, then run the pipeline to completion.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, PipelineError> {
        let _permit = self.permits.acquire().await.ok();
        self.pipeline.run(request).await
    }

    /// Register the job and run it in the background. Returns the job id.
    ///
    /// The outcome is written to the registry when the run returns, so a job
    /// still finishes if its terminal event never reached the listener.
    pub fn submit(&self, request: GenerationRequest) -> String {
        let job_id = request.run_id.clone();
        self.jobs.insert(JobRecord::queued(
            job_id.as_str(),
            &request.summary,
            &request.language,
        ));

        let service = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            let outcome = match service.generate(request).await {
                Ok(output) => PipelineEvent::Finished {
                    job_id: id,
                    video_path: output.video_path,
                    video_url: output.video_url,
                },
                Err(e) => {
                    tracing::debug!(error = %e, "background job ended with an error");
                    PipelineEvent::Failed {
                        job_id: id,
                        reason: e.to_string(),
                    }
                }
            };
            service.jobs.apply(&outcome);
        });
        job_id
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
