use std::collections::BTreeMap;
use std::sync::RwLock;

use dashmap::DashMap;
use serde::Serialize;

use crate::types::ScrapeResult;

/// Oldest errors are dropped past this many per run.
const MAX_RECORDED_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// Last run finished with errors and stored nothing.
    Error,
}

#[derive(Debug, Clone, Default, Serialize)]
struct RunSnapshot {
    state: RunState,
    last_started_at_ns: Option<u64>,
    last_finished_at_ns: Option<u64>,
    last_result: Option<ScrapeResult>,
    last_errors: Vec<String>,
    completed_runs: u64,
}

/// What `/scrape/status` returns.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: RunState,
    pub last_started_at_ns: Option<u64>,
    pub last_finished_at_ns: Option<u64>,
    pub last_result: Option<ScrapeResult>,
    pub last_errors: Vec<String>,
    pub completed_runs: u64,
    /// Events stored per category by the most recent run that reached it.
    pub category_counts: BTreeMap<String, usize>,
}

/// Progress and outcome of scrape runs. Written by the orchestrator only,
/// read by the API at any time.
#[derive(Default)]
pub struct ScrapeStatus {
    run: RwLock<RunSnapshot>,
    category_counts: DashMap<String, usize>,
}

impl ScrapeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(&self, now_ns: u64) {
        if let Ok(mut run) = self.run.write() {
            run.state = RunState::Running;
            run.last_started_at_ns = Some(now_ns);
            run.last_errors.clear();
        }
    }

    pub fn record_error(&self, message: String) {
        if let Ok(mut run) = self.run.write() {
            if run.last_errors.len() >= MAX_RECORDED_ERRORS {
                run.last_errors.remove(0);
            }
            run.last_errors.push(message);
        }
    }

    pub fn set_category_count(&self, category: &str, count: usize) {
        self.category_counts.insert(category.to_string(), count);
    }

    pub fn finish_run(&self, result: &ScrapeResult, now_ns: u64) {
        if let Ok(mut run) = self.run.write() {
            run.state = if result.total == 0 && !run.last_errors.is_empty() {
                RunState::Error
            } else {
                RunState::Idle
            };
            run.last_finished_at_ns = Some(now_ns);
            run.last_result = Some(result.clone());
            run.completed_runs += 1;
        }
    }

    pub fn report(&self) -> StatusReport {
        let run = self.run.read().map(|r| r.clone()).unwrap_or_default();
        let category_counts = self
            .category_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        StatusReport {
            state: run.state,
            last_started_at_ns: run.last_started_at_ns,
            last_finished_at_ns: run.last_finished_at_ns,
            last_result: run.last_result,
            last_errors: run.last_errors,
            completed_runs: run.completed_runs,
            category_counts,
        }
    }
}
