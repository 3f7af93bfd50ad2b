use crate::domain::jobs::{JobRecord, PipelineEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Finished records kept before the oldest are dropped.
pub const DEFAULT_MAX_FINISHED: usize = 1000;

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<String, JobRecord>,
    /// Ids of finished jobs, oldest first.
    finished: VecDeque<String>,
}

/// In-memory job records, folded from pipeline events.
///
/// Running jobs are always kept. Once more than `max_finished` jobs have
/// finished, the ones that finished first are forgotten.
#[derive(Debug)]
pub struct JobRegistry {
    records: RwLock<Records>,
    max_finished: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_max_finished(DEFAULT_MAX_FINISHED)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_finished(max_finished: usize) -> Self {
        Self {
            records: RwLock::default(),
            max_finished,
        }
    }

    pub fn insert(&self, record: JobRecord) {
        if let Ok(mut records) = self.records.write() {
            records.by_id.insert(record.id.clone(), record);
        }
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.records.read().ok()?.by_id.get(id).cloned()
    }

    /// Apply an event to its job. Events for unknown jobs are dropped.
    pub fn apply(&self, event: &PipelineEvent) -> bool {
        let Ok(mut records) = self.records.write() else {
            return false;
        };
        let Some(record) = records.by_id.get_mut(event.job_id()) else {
            return false;
        };
        let was_finished = record.is_finished();
        record.apply(event);
        if !was_finished && record.is_finished() {
            records.finished.push_back(event.job_id().to_string());
            self.evict(&mut records);
        }
        true
    }

    fn evict(&self, records: &mut Records) {
        while records.finished.len() > self.max_finished {
            let Some(id) = records.finished.pop_front() else {
                break;
            };
            if records.by_id.get(&id).is_some_and(JobRecord::is_finished) {
                records.by_id.remove(&id);
                tracing::debug!(job_id = %id, "finished job evicted");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::JobState;

    fn finish(registry: &JobRegistry, id: &str) {
        registry.apply(&PipelineEvent::Failed {
            job_id: id.into(),
            reason: "stopped".into(),
        });
    }

    #[test]
    fn events_update_known_jobs_only() {
        let registry = JobRegistry::new();
        registry.insert(JobRecord::queued("a", "letters", "English"));

        assert!(registry.apply(&PipelineEvent::Started { job_id: "a".into() }));
        assert!(!registry.apply(&PipelineEvent::Started { job_id: "b".into() }));

        assert_eq!(registry.get("a").unwrap().state, JobState::Running);
        assert!(registry.get("b").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn oldest_finished_jobs_are_evicted() {
        let registry = JobRegistry::with_max_finished(2);
        for id in ["a", "b", "c", "running"] {
            registry.insert(JobRecord::queued(id, "letters", "English"));
        }
        registry.apply(&PipelineEvent::Started {
            job_id: "running".into(),
        });

        finish(&registry, "b");
        finish(&registry, "a");
        // A repeated terminal event does not count twice.
        finish(&registry, "a");
        assert_eq!(registry.len(), 4);

        finish(&registry, "c");
        assert!(registry.get("b").is_none());
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_some());
        assert_eq!(registry.get("running").unwrap().state, JobState::Running);
        assert_eq!(registry.len(), 3);
    }
}
