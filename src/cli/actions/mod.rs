mod run;

use crate::{matrix::Scenario, ports::PortRange};
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Run {
        matrix: PathBuf,
        scenario: Scenario,
        jobs: NonZeroUsize,
        /// Overrides the matrix file when set
        startup_timeout: Option<Duration>,
        timeout: Option<Duration>,
        port_range: Option<PortRange>,
        filter: Option<String>,
        metrics_file: Option<PathBuf>,
        inspect_certificates: bool,
    },
    List {
        matrix: PathBuf,
        scenario: Scenario,
        filter: Option<String>,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute or any case failed
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
