use super::Action;
use crate::{
    config::MatrixFile,
    matrix::PlannedCase,
    metrics::encode_metrics,
    ports::PortPool,
    process::Timeouts,
    runner::{self, RunSettings},
    scenario::CaseContext,
};
use anyhow::{Context, Result, anyhow, bail};
use std::{fs, path::Path};

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::List {
            matrix,
            scenario,
            filter,
        } => {
            let plan = load_plan(&matrix, |file| {
                Ok(file.to_matrix()?.plan(scenario))
            })?;
            for case in runner::select(plan, filter.as_deref()) {
                println!("{}", list_line(&case));
            }
            Ok(())
        }

        Action::Run {
            matrix,
            scenario,
            jobs,
            startup_timeout,
            timeout,
            port_range,
            filter,
            metrics_file,
            inspect_certificates,
        } => {
            let file = MatrixFile::load(&matrix)
                .with_context(|| format!("Failed to load matrix {}", matrix.display()))?;
            let plan = file.to_matrix()?.plan(scenario);

            let defaults = Timeouts::default();
            let timeouts = Timeouts {
                startup: startup_timeout
                    .or_else(|| file.startup_timeout())
                    .unwrap_or(defaults.startup),
                run: timeout.or_else(|| file.timeout()).unwrap_or(defaults.run),
                ..defaults
            };

            let range = match port_range {
                Some(range) => range,
                None => file.port_range()?.unwrap_or_default(),
            };
            let pool = PortPool::new(range.range())?;

            let settings = RunSettings {
                jobs,
                context: CaseContext {
                    timeouts,
                    trust_store: file.trust_store.clone(),
                    inspect_certificates,
                },
                filter,
            };

            tracing::info!(
                matrix = %matrix.display(),
                %scenario,
                ports = %range,
                "loaded matrix"
            );

            let summary = runner::run(plan, &pool, &settings, |report| {
                match serde_json::to_string(report) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::error!("failed to serialize report: {e}"),
                }
            })
            .await;

            if let Some(path) = metrics_file {
                write_metrics(&path)?;
            }

            eprintln!(
                "{} passed, {} failed, {} skipped",
                summary.passed, summary.failed, summary.skipped
            );

            if !summary.is_success() {
                bail!("{} of {} cases failed", summary.failed, summary.total());
            }
            Ok(())
        }
    }
}

fn load_plan<F>(path: &Path, plan: F) -> Result<Vec<PlannedCase>>
where
    F: FnOnce(&MatrixFile) -> crate::error::Result<Vec<PlannedCase>>,
{
    let file = MatrixFile::load(path)
        .with_context(|| format!("Failed to load matrix {}", path.display()))?;
    Ok(plan(&file)?)
}

fn list_line(case: &PlannedCase) -> String {
    match &case.skip {
        Some(reason) => format!("{}\tskip: {reason}", case.tuple.id()),
        None => format!("{}\trun", case.tuple.id()),
    }
}

fn write_metrics(path: &Path) -> Result<()> {
    let encoded = encode_metrics().map_err(|e| anyhow!(e))?;
    fs::write(path, encoded)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
