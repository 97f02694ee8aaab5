//! Joins authored presets with backend job records by exact name.
//!
//! There is no shared id between the two sides; a preset and a job belong
//! together only when their names are byte-for-byte equal. No trimming, no
//! case folding. When several jobs share a name the first one in backend
//! order wins.

use serde::Serialize;

use crate::types::{PresetSchedule, ScheduledJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Run,
    Enable,
    Disable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciledPreset<'a> {
    pub preset: &'a PresetSchedule,
    pub job: Option<&'a ScheduledJob>,
}

impl ReconciledPreset<'_> {
    pub fn is_configured(&self) -> bool {
        self.job.is_some()
    }

    /// Actions the UI may offer. A preset without a backend job is read-only.
    pub fn available_actions(&self) -> Vec<JobAction> {
        match self.job {
            None => Vec::new(),
            Some(job) if job.enabled => vec![JobAction::Run, JobAction::Disable],
            Some(_) => vec![JobAction::Run, JobAction::Enable],
        }
    }
}

/// One record per preset, in catalog order.
pub fn reconcile<'a>(
    presets: &'a [PresetSchedule],
    jobs: &'a [ScheduledJob],
) -> Vec<ReconciledPreset<'a>> {
    presets
        .iter()
        .map(|preset| ReconciledPreset {
            preset,
            job: jobs.iter().find(|j| j.name == preset.name),
        })
        .collect()
}

/// Backend jobs that no preset claims.
pub fn unmatched_jobs<'a>(
    presets: &[PresetSchedule],
    jobs: &'a [ScheduledJob],
) -> Vec<&'a ScheduledJob> {
    jobs.iter()
        .filter(|j| !presets.iter().any(|p| p.name == j.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::catalog::PresetCatalog;
    use crate::types::JobStatus;

    fn job(id: &str, name: &str, enabled: bool) -> ScheduledJob {
        ScheduledJob {
            job_id: id.to_string(),
            name: name.to_string(),
            enabled,
            status: JobStatus::Pending,
            next_run: None,
            last_run: None,
            last_duration_seconds: None,
            today_run_count: None,
            last_error: None,
        }
    }

    #[test]
    fn every_preset_yields_exactly_one_record() {
        let catalog = PresetCatalog::builtin();
        let jobs = vec![
            job("j1", "Weekend Deep Analysis", true),
            job("j2", "Something Custom", true),
        ];
        let merged = reconcile(catalog.presets(), &jobs);

        assert_eq!(merged.len(), catalog.len());
        for (rec, preset) in merged.iter().zip(catalog.presets()) {
            assert_eq!(rec.preset.id, preset.id);
        }
        let configured: Vec<_> = merged.iter().filter(|r| r.is_configured()).collect();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].job.unwrap().job_id, "j1");
    }

    #[test]
    fn trailing_space_does_not_match() {
        let catalog = PresetCatalog::builtin();
        let jobs = vec![job("j1", "Pre-Market Preparation ", true)];
        let merged = reconcile(catalog.presets(), &jobs);
        let prep = merged
            .iter()
            .find(|r| r.preset.name == "Pre-Market Preparation")
            .unwrap();
        assert!(!prep.is_configured());
    }

    #[test]
    fn case_differences_do_not_match() {
        let catalog = PresetCatalog::builtin();
        let jobs = vec![job("j1", "weekend deep analysis", true)];
        assert!(reconcile(catalog.presets(), &jobs)
            .iter()
            .all(|r| !r.is_configured()));
    }

    #[test]
    fn first_job_wins_on_duplicate_names() {
        let catalog = PresetCatalog::builtin();
        let jobs = vec![
            job("first", "After-Hours Analysis", false),
            job("second", "After-Hours Analysis", true),
        ];
        let merged = reconcile(catalog.presets(), &jobs);
        let rec = merged.iter().find(|r| r.preset.id == "after-hours").unwrap();
        assert_eq!(rec.job.unwrap().job_id, "first");
    }

    #[test]
    fn actions_follow_configuration_and_enabled_flag() {
        let catalog = PresetCatalog::builtin();
        let jobs = vec![
            job("on", "Pre-Market Preparation", true),
            job("off", "Active Trading Collection", false),
        ];
        let merged = reconcile(catalog.presets(), &jobs);
        let by_id = |id: &str| merged.iter().find(|r| r.preset.id == id).unwrap();

        assert_eq!(
            by_id("pre-market-prep").available_actions(),
            vec![JobAction::Run, JobAction::Disable]
        );
        assert_eq!(
            by_id("active-trading").available_actions(),
            vec![JobAction::Run, JobAction::Enable]
        );
        assert!(by_id("weekend-deep").available_actions().is_empty());
    }

    #[test]
    fn unmatched_jobs_are_reported() {
        let catalog = PresetCatalog::builtin();
        let jobs = vec![
            job("j1", "Weekend Deep Analysis", true),
            job("j2", "Model Retrain", true),
        ];
        let extra = unmatched_jobs(catalog.presets(), &jobs);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].job_id, "j2");
    }
}
