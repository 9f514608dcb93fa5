use crate::{cli::actions::Action, matrix::Scenario, ports::PortRange};
use anyhow::{Context, Result, anyhow};
use clap::{ArgMatches, parser::ValueSource};
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

/// Value of `id` only when the user supplied it (flag or environment)
///
/// Defaults are left to the matrix file, which in turn falls back to the
/// harness defaults.
fn explicit<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    match matches.value_source(id) {
        Some(ValueSource::DefaultValue) | None => None,
        Some(_) => matches.get_one::<T>(id).cloned(),
    }
}

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if required parameters are missing or malformed
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    let matrix = matches
        .get_one::<String>("matrix")
        .map(PathBuf::from)
        .context("matrix file is required")?;

    let scenario = matches
        .get_one::<String>("scenario")
        .map_or(Ok(Scenario::default()), |s| s.parse::<Scenario>())
        .map_err(|e| anyhow!(e))?;

    let filter = matches.get_one::<String>("filter").cloned();

    if matches.get_flag("list") {
        return Ok(Action::List {
            matrix,
            scenario,
            filter,
        });
    }

    let jobs = matches.get_one::<u16>("jobs").copied().unwrap_or(1);
    let jobs = NonZeroUsize::new(usize::from(jobs)).context("jobs must be at least 1")?;

    let port_range = explicit::<String>(matches, "port-range")
        .map(|range| {
            range
                .parse::<PortRange>()
                .map_err(|e| anyhow!(e))
                .context("Invalid --port-range")
        })
        .transpose()?;

    Ok(Action::Run {
        matrix,
        scenario,
        jobs,
        startup_timeout: explicit::<u64>(matches, "startup-timeout").map(Duration::from_millis),
        timeout: explicit::<u64>(matches, "timeout").map(Duration::from_millis),
        port_range,
        filter,
        metrics_file: matches.get_one::<String>("metrics-file").map(PathBuf::from),
        inspect_certificates: !matches.get_flag("no-cert-check"),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_dispatch_defaults() {
        let matches = commands::new()
            .try_get_matches_from(vec!["tlsinterop", "--matrix", "matrix.json"])
            .unwrap();

        match dispatch(&matches).unwrap() {
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
                assert_eq!(matrix, PathBuf::from("matrix.json"));
                assert_eq!(scenario, Scenario::SniMatch);
                assert_eq!(jobs.get(), 1);
                // defaults defer to the matrix file
                assert_eq!(startup_timeout, None);
                assert_eq!(timeout, None);
                assert_eq!(port_range, None);
                assert_eq!(filter, None);
                assert_eq!(metrics_file, None);
                assert!(inspect_certificates);
            }
            Action::List { .. } => panic!("expected run action"),
        }
    }

    #[test]
    fn test_dispatch_explicit_values() {
        let matches = commands::new()
            .try_get_matches_from(vec![
                "tlsinterop",
                "-m",
                "matrix.json",
                "--scenario",
                "handshake",
                "--jobs",
                "4",
                "--startup-timeout",
                "500",
                "--timeout",
                "3000",
                "--port-range",
                "9000-9100",
                "--filter",
                "TLS1.3",
                "--metrics-file",
                "/tmp/metrics.prom",
                "--no-cert-check",
            ])
            .unwrap();

        match dispatch(&matches).unwrap() {
            Action::Run {
                scenario,
                jobs,
                startup_timeout,
                timeout,
                port_range,
                filter,
                metrics_file,
                inspect_certificates,
                ..
            } => {
                assert_eq!(scenario, Scenario::Handshake);
                assert_eq!(jobs.get(), 4);
                assert_eq!(startup_timeout, Some(Duration::from_millis(500)));
                assert_eq!(timeout, Some(Duration::from_secs(3)));
                assert_eq!(
                    port_range,
                    Some(PortRange {
                        start: 9000,
                        end: 9100
                    })
                );
                assert_eq!(filter.as_deref(), Some("TLS1.3"));
                assert_eq!(metrics_file, Some(PathBuf::from("/tmp/metrics.prom")));
                assert!(!inspect_certificates);
            }
            Action::List { .. } => panic!("expected run action"),
        }
    }

    #[test]
    fn test_dispatch_list() {
        let matches = commands::new()
            .try_get_matches_from(vec![
                "tlsinterop",
                "-m",
                "matrix.json",
                "--list",
                "-f",
                "s2n",
            ])
            .unwrap();

        match dispatch(&matches).unwrap() {
            Action::List {
                matrix,
                scenario,
                filter,
            } => {
                assert_eq!(matrix, PathBuf::from("matrix.json"));
                assert_eq!(scenario, Scenario::SniMatch);
                assert_eq!(filter.as_deref(), Some("s2n"));
            }
            Action::Run { .. } => panic!("expected list action"),
        }
    }

    #[test]
    fn test_dispatch_invalid_port_range() {
        let matches = commands::new()
            .try_get_matches_from(vec![
                "tlsinterop",
                "-m",
                "matrix.json",
                "--port-range",
                "9000",
            ])
            .unwrap();

        let result = dispatch(&matches);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid --port-range")
        );
    }
}
