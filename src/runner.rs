//! Runs a planned matrix with bounded concurrency

use crate::{
    matrix::PlannedCase,
    metrics::{CASE_DURATION, CASE_ERRORS, CASES_TOTAL},
    ports::PortPool,
    report::{CaseReport, Outcome},
    scenario::{CaseContext, run_case},
};
use futures::{StreamExt, stream};
use std::num::NonZeroUsize;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub jobs: NonZeroUsize,
    pub context: CaseContext,
    /// Only cases whose id contains this text
    pub filter: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            jobs: NonZeroUsize::MIN,
            context: CaseContext::default(),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

/// Keep only cases whose id contains `filter`
#[must_use]
pub fn select(plan: Vec<PlannedCase>, filter: Option<&str>) -> Vec<PlannedCase> {
    match filter {
        Some(text) => plan
            .into_iter()
            .filter(|case| case.tuple.id().contains(text))
            .collect(),
        None => plan,
    }
}

/// Execute every case, calling `on_report` as each one finishes
///
/// Skipped cases are reported without launching anything. Failures stay
/// local to their case.
pub async fn run<F>(
    plan: Vec<PlannedCase>,
    pool: &PortPool,
    settings: &RunSettings,
    mut on_report: F,
) -> RunSummary
where
    F: FnMut(&CaseReport),
{
    let run_id = Uuid::new_v4();
    let plan = select(plan, settings.filter.as_deref());
    tracing::info!(%run_id, cases = plan.len(), jobs = settings.jobs.get(), "starting run");

    let mut reports = stream::iter(plan)
        .map(|case| {
            let span = tracing::info_span!("case", id = %case.tuple.id());
            execute(run_id, case, pool, &settings.context).instrument(span)
        })
        .buffer_unordered(settings.jobs.get());

    let mut summary = RunSummary::default();
    while let Some(report) = reports.next().await {
        CASES_TOTAL
            .with_label_values(&[report.scenario.as_str(), report.outcome.as_str()])
            .inc();
        summary.record(report.outcome);
        on_report(&report);
    }

    tracing::info!(
        %run_id,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "run finished"
    );
    summary
}

async fn execute(
    run_id: Uuid,
    case: PlannedCase,
    pool: &PortPool,
    context: &CaseContext,
) -> CaseReport {
    if case.is_skipped() {
        return CaseReport::skipped(run_id, &case);
    }

    let start = Instant::now();
    let lease = match pool.lease() {
        Ok(lease) => lease,
        Err(err) => {
            CASE_ERRORS.with_label_values(&[err.kind()]).inc();
            return CaseReport::failed(run_id, &case, None, start.elapsed(), &err);
        }
    };
    let port = lease.port();

    let result = run_case(&case.tuple, port, context).await;
    let elapsed = start.elapsed();
    drop(lease);

    CASE_DURATION
        .with_label_values(&[case.tuple.scenario().as_str()])
        .observe(elapsed.as_secs_f64());

    match result {
        Ok(evidence) => {
            tracing::info!(port, ?elapsed, "passed");
            CaseReport::passed(run_id, &case, port, elapsed, &evidence)
        }
        Err(err) => {
            tracing::warn!(port, kind = err.kind(), "failed: {err}");
            CASE_ERRORS.with_label_values(&[err.kind()]).inc();
            CaseReport::failed(run_id, &case, Some(port), elapsed, &err)
        }
    }
}
