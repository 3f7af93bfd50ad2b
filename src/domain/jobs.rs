use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Progress reported by a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        job_id: String,
    },
    ScriptReady {
        job_id: String,
        scenes: usize,
    },
    SceneRendered {
        job_id: String,
        index: usize,
        clip: PathBuf,
    },
    Finished {
        job_id: String,
        video_path: PathBuf,
        video_url: Option<String>,
    },
    Failed {
        job_id: String,
        reason: String,
    },
}

impl PipelineEvent {
    pub fn job_id(&self) -> &str {
        match self {
            PipelineEvent::Started { job_id }
            | PipelineEvent::ScriptReady { job_id, .. }
            | PipelineEvent::SceneRendered { job_id, .. }
            | PipelineEvent::Finished { job_id, .. }
            | PipelineEvent::Failed { job_id, .. } => job_id,
        }
    }
}

/// State of a background generation job, as served by `GET /api/jobs/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub state: JobState,
    pub summary: String,
    pub language: String,
    pub scenes_total: Option<usize>,
    pub scenes_done: usize,
    pub video_path: Option<PathBuf>,
    pub video_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(id: impl Into<String>, summary: &str, language: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            state: JobState::Queued,
            summary: summary.to_string(),
            language: language.to_string(),
            scenes_total: None,
            scenes_done: 0,
            video_path: None,
            video_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, JobState::Succeeded | JobState::Failed)
    }

    /// Fold one event into the record. Events after a terminal state are ignored.
    pub fn apply(&mut self, event: &PipelineEvent) {
        if self.is_finished() {
            return;
        }
        match event {
            PipelineEvent::Started { .. } => self.state = JobState::Running,
            PipelineEvent::ScriptReady { scenes, .. } => {
                self.state = JobState::Running;
                self.scenes_total = Some(*scenes);
            }
            PipelineEvent::SceneRendered { index, .. } => {
                self.state = JobState::Running;
                self.scenes_done = self.scenes_done.max(index + 1);
            }
            PipelineEvent::Finished {
                video_path,
                video_url,
                ..
            } => {
                self.state = JobState::Succeeded;
                self.video_path = Some(video_path.clone());
                self.video_url = video_url.clone();
            }
            PipelineEvent::Failed { reason, .. } => {
                self.state = JobState::Failed;
                self.error = Some(reason.clone());
            }
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progresses_to_success() {
        let mut record = JobRecord::queued("j1", "letters", "English");
        record.apply(&PipelineEvent::Started {
            job_id: "j1".into(),
        });
        assert_eq!(record.state, JobState::Running);

        record.apply(&PipelineEvent::ScriptReady {
            job_id: "j1".into(),
            scenes: 3,
        });
        record.apply(&PipelineEvent::SceneRendered {
            job_id: "j1".into(),
            index: 1,
            clip: PathBuf::from("b.mp4"),
        });
        assert_eq!(record.scenes_total, Some(3));
        assert_eq!(record.scenes_done, 2);

        record.apply(&PipelineEvent::Finished {
            job_id: "j1".into(),
            video_path: PathBuf::from("outputs/videos/final_j1.mp4"),
            video_url: Some("/static/videos/final_j1.mp4".into()),
        });
        assert_eq!(record.state, JobState::Succeeded);
        assert!(record.is_finished());
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut record = JobRecord::queued("j2", "s", "l");
        record.apply(&PipelineEvent::Failed {
            job_id: "j2".into(),
            reason: "boom".into(),
        });
        record.apply(&PipelineEvent::Started {
            job_id: "j2".into(),
        });
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = PipelineEvent::ScriptReady {
            job_id: "j3".into(),
            scenes: 2,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "script_ready");
        assert_eq!(event.job_id(), "j3");
    }
}
