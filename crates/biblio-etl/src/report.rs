//! Structured run reports.

use std::collections::BTreeMap;

use biblio_core::{ReferentialGap, SyncError, SyncMode, WeightAnomaly};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::stage::{RunState, Stage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StageStatus {
    Completed,
    Failed(String),
    Skipped(String),
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub counts: BTreeMap<String, usize>,
}

/// What one stage produced, before it is folded into the report.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub counts: BTreeMap<String, usize>,
    pub gaps: Vec<ReferentialGap>,
    pub anomalies: Vec<WeightAnomaly>,
}

impl StageOutcome {
    pub fn count(mut self, name: impl Into<String>, value: usize) -> Self {
        self.counts.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
    /// Records processed per entity, relationship or table name.
    pub counts: BTreeMap<String, usize>,
    pub gaps: Vec<ReferentialGap>,
    pub anomalies: Vec<WeightAnomaly>,
    /// Set once an error makes every later phase unsafe to start.
    pub aborted: bool,
}

impl RunReport {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            state: RunState::Idle,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            counts: BTreeMap::new(),
            gaps: Vec::new(),
            anomalies: Vec::new(),
            aborted: false,
        }
    }

    /// A run whose source or targets could not be opened: `Prepare` fails
    /// with `err` and nothing else starts.
    pub fn unavailable(mode: SyncMode, err: &SyncError) -> Self {
        let mut report = Self::new(mode);
        report.state = RunState::Preparing;
        report.fail(Stage::Prepare, err);
        for stage in &Stage::ALL[1..] {
            let reason = report
                .blocker(*stage)
                .unwrap_or_else(|| format!("{} did not complete", Stage::Prepare));
            report.skip(*stage, reason);
        }
        report.finish();
        report
    }

    pub fn complete(&mut self, stage: Stage, outcome: StageOutcome) {
        for (name, count) in &outcome.counts {
            *self.counts.entry(name.clone()).or_insert(0) += count;
        }
        self.gaps.extend(outcome.gaps);
        self.anomalies.extend(outcome.anomalies);
        self.push(stage, StageStatus::Completed, outcome.counts);
    }

    pub fn fail(&mut self, stage: Stage, err: &SyncError) {
        if err.aborts_pipeline() {
            self.aborted = true;
        }
        self.push(stage, StageStatus::Failed(err.to_string()), BTreeMap::new());
    }

    pub fn skip(&mut self, stage: Stage, reason: impl Into<String>) {
        self.push(stage, StageStatus::Skipped(reason.into()), BTreeMap::new());
    }

    pub fn cancel(&mut self, stage: Stage) {
        self.push(stage, StageStatus::Cancelled, BTreeMap::new());
    }

    fn push(&mut self, stage: Stage, status: StageStatus, counts: BTreeMap<String, usize>) {
        self.stages.push(StageReport { stage, status, counts });
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| &s.status)
    }

    pub fn completed(&self, stage: Stage) -> bool {
        self.status(stage) == Some(&StageStatus::Completed)
    }

    /// Why `stage` may not start, if anything prevents it.
    pub fn blocker(&self, stage: Stage) -> Option<String> {
        if self.aborted {
            return Some("pipeline aborted".to_string());
        }
        stage
            .depends_on()
            .iter()
            .find(|dep| !self.completed(**dep))
            .map(|dep| format!("{dep} did not complete"))
    }

    /// Settle the final state from the recorded stages.
    pub fn finish(&mut self) {
        let failed = self.stages.iter().find(|s| matches!(s.status, StageStatus::Failed(_)));
        let cancelled = self.stages.iter().find(|s| s.status == StageStatus::Cancelled);
        self.state = match (failed, cancelled) {
            (Some(s), _) => RunState::Failed(s.stage),
            (None, Some(s)) => RunState::Cancelled(s.stage),
            (None, None) => RunState::Complete,
        };
        self.finished_at = Some(Utc::now());
    }

    /// No stage failed or was cancelled. Skipped stages only follow failures.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Complete
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_blocks_only_dependents() {
        let mut report = RunReport::new(SyncMode::Full);
        report.complete(Stage::Prepare, StageOutcome::default());
        report.fail(Stage::GraphNodes, &SyncError::store("connection reset"));
        report.complete(Stage::Dimensions, StageOutcome::default().count("dim_book", 3));

        assert_eq!(
            report.blocker(Stage::GraphRelationships).as_deref(),
            Some("graph_nodes did not complete")
        );
        assert_eq!(report.blocker(Stage::Facts), None);
        assert_eq!(report.counts["dim_book"], 3);
    }

    #[test]
    fn test_constraint_violation_blocks_everything_after() {
        let mut report = RunReport::new(SyncMode::Full);
        report.complete(Stage::Prepare, StageOutcome::default());
        report.fail(Stage::GraphNodes, &SyncError::constraint("Book#1", "duplicate isbn"));
        report.complete(Stage::Dimensions, StageOutcome::default());

        assert_eq!(report.blocker(Stage::Facts).as_deref(), Some("pipeline aborted"));
        report.finish();
        assert_eq!(report.state, RunState::Failed(Stage::GraphNodes));
        assert!(!report.is_success());
    }

    #[test]
    fn test_cancelled_run_is_not_success() {
        let mut report = RunReport::new(SyncMode::Incremental);
        report.complete(Stage::Prepare, StageOutcome::default());
        report.cancel(Stage::GraphNodes);
        report.finish();
        assert_eq!(report.state, RunState::Cancelled(Stage::GraphNodes));
        assert!(!report.is_success());
    }

    #[test]
    fn test_unavailable_source_fails_prepare_and_skips_rest() {
        let err = SyncError::SourceUnavailable("no such file".into());
        let report = RunReport::unavailable(SyncMode::Full, &err);

        assert_eq!(report.state, RunState::Failed(Stage::Prepare));
        assert!(report.aborted);
        assert!(!report.is_success());
        assert_eq!(report.stages.len(), Stage::ALL.len());
        for stage in &Stage::ALL[1..] {
            assert_eq!(
                report.status(*stage),
                Some(&StageStatus::Skipped("pipeline aborted".to_string()))
            );
        }
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_report_json_names_stage_status() {
        let mut report = RunReport::new(SyncMode::Full);
        report.skip(Stage::Bridges, "dimensions did not complete");
        let json = report.to_json().unwrap();
        assert!(json.contains(r#""status": "skipped""#));
        assert!(json.contains(r#""mode": "full""#));
    }
}
