//! Run history aggregation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::HISTORY_BREAKDOWN_DAYS;
use crate::types::{DaySummary, HistoryMap, JobStatus, RunHistorySummary, RunRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRunSummary {
    pub job_name: String,
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    pub avg_duration_seconds: Option<f64>,
}

/// Running totals. Durations are averaged only over runs that carry one.
#[derive(Debug, Default)]
struct Tally {
    total: usize,
    successful: usize,
    failed: usize,
    duration_sum: f64,
    duration_count: usize,
}

impl Tally {
    fn add(&mut self, run: &RunRecord) {
        self.total += 1;
        match run.status {
            JobStatus::Completed => self.successful += 1,
            JobStatus::Failed => self.failed += 1,
            _ => {}
        }
        if let Some(d) = run.duration_seconds.filter(|d| d.is_finite()) {
            self.duration_sum += d;
            self.duration_count += 1;
        }
    }

    fn avg_duration(&self) -> Option<f64> {
        (self.duration_count > 0).then(|| self.duration_sum / self.duration_count as f64)
    }
}

pub fn summarize(history: &HistoryMap) -> RunHistorySummary {
    let mut overall = Tally::default();
    let mut per_day = Vec::with_capacity(history.len());

    for (date, jobs) in history {
        let mut day = Tally::default();
        for run in jobs.values().flatten() {
            overall.add(run);
            day.add(run);
        }
        per_day.push(DaySummary {
            date: date.clone(),
            job_count: jobs.len(),
            successful_runs: day.successful,
            total_runs: day.total,
        });
    }

    // ISO dates sort lexically; newest first.
    per_day.sort_by(|a, b| b.date.cmp(&a.date));
    per_day.truncate(HISTORY_BREAKDOWN_DAYS);

    RunHistorySummary {
        total_runs: overall.total,
        successful_runs: overall.successful,
        failed_runs: overall.failed,
        avg_duration_seconds: overall.avg_duration(),
        per_day,
    }
}

/// Totals per job name across all days, ordered by name.
pub fn per_job_summary(history: &HistoryMap) -> Vec<JobRunSummary> {
    let mut by_job: BTreeMap<&str, Tally> = BTreeMap::new();
    for jobs in history.values() {
        for (name, runs) in jobs {
            let tally = by_job.entry(name.as_str()).or_default();
            runs.iter().for_each(|r| tally.add(r));
        }
    }

    by_job
        .into_iter()
        .map(|(name, t)| JobRunSummary {
            job_name: name.to_string(),
            total_runs: t.total,
            successful_runs: t.successful,
            failed_runs: t.failed,
            avg_duration_seconds: t.avg_duration(),
        })
        .collect()
}
