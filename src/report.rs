use crate::{
    error::HarnessError,
    matrix::{PlannedCase, Scenario},
    scenario::CaseEvidence,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One JSON line per case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub run_id: Uuid,
    pub id: String,
    pub scenario: String,
    pub time: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_certificate: Option<String>,
}

impl CaseReport {
    fn new(run_id: Uuid, id: String, scenario: Scenario, outcome: Outcome) -> Self {
        Self {
            run_id,
            id,
            scenario: scenario.to_string(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            outcome,
            duration_ms: 0,
            port: None,
            protocol: None,
            skip_reason: None,
            error_kind: None,
            error: None,
            expected_certificate: None,
        }
    }

    #[must_use]
    pub fn skipped(run_id: Uuid, case: &PlannedCase) -> Self {
        let mut report = Self::new(
            run_id,
            case.tuple.id(),
            case.tuple.scenario(),
            Outcome::Skipped,
        );
        report.skip_reason = case.skip.as_ref().map(ToString::to_string);
        report
    }

    #[must_use]
    pub fn passed(
        run_id: Uuid,
        case: &PlannedCase,
        port: u16,
        duration: Duration,
        evidence: &CaseEvidence,
    ) -> Self {
        let mut report = Self::new(
            run_id,
            case.tuple.id(),
            case.tuple.scenario(),
            Outcome::Passed,
        );
        report.port = Some(port);
        report.duration_ms = millis(duration);
        report.protocol = Some(evidence.expected.protocol.to_string());
        report
            .expected_certificate
            .clone_from(&evidence.expected_certificate);
        report
    }

    #[must_use]
    pub fn failed(
        run_id: Uuid,
        case: &PlannedCase,
        port: Option<u16>,
        duration: Duration,
        error: &HarnessError,
    ) -> Self {
        let mut report = Self::new(
            run_id,
            case.tuple.id(),
            case.tuple.scenario(),
            Outcome::Failed,
        );
        report.port = port;
        report.duration_ms = millis(duration);
        report.error_kind = Some(error.kind().to_string());
        report.error = Some(error.to_string());
        report
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::{
        endpoint::{CertKeyPair, Protocol, cipher::TLS_AES_128_GCM_SHA256},
        matrix::{CaseParams, ScenarioTuple, cases::CertTestCase, filter::SkipReason},
        provider::{Provider, ProviderBinaries, ProviderKind},
    };

    fn planned(skip: Option<SkipReason>) -> PlannedCase {
        let binaries = ProviderBinaries::default();
        PlannedCase {
            tuple: ScenarioTuple {
                provider: Provider::new(ProviderKind::OpenSsl, &binaries),
                other_provider: Provider::new(ProviderKind::S2n, &binaries),
                protocol: Protocol::Tls12,
                params: CaseParams::Sni(CertTestCase {
                    name: None,
                    client_sni: Some("www.example.com".to_string()),
                    client_ciphers: vec![TLS_AES_128_GCM_SHA256],
                    server_certs: vec![CertKeyPair::new("a.pem", "a.key")],
                }),
            },
            skip,
        }
    }

    #[test]
    fn test_skipped_report_json() {
        let case = planned(Some(SkipReason::BelowLowestCipher {
            protocol: Protocol::Tls12,
            lowest: Protocol::Tls13,
        }));
        let report = CaseReport::skipped(Uuid::new_v4(), &case);
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("\"outcome\":\"skipped\""));
        assert!(json.contains("\"scenario\":\"sni-match\""));
        assert!(json.contains("older than every client cipher"));
        assert!(!json.contains("error_kind"));
        assert!(!json.contains("\"port\""));
    }

    #[test]
    fn test_failed_report_json() {
        let case = planned(None);
        let err = HarnessError::configuration("bad bundle");
        let report = CaseReport::failed(
            Uuid::new_v4(),
            &case,
            Some(9000),
            Duration::from_millis(1500),
            &err,
        );
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("\"outcome\":\"failed\""));
        assert!(json.contains("\"error_kind\":\"configuration\""));
        assert!(json.contains("\"duration_ms\":1500"));
        assert!(json.contains("\"port\":9000"));
    }

    #[test]
    fn test_report_round_trip() {
        let report = CaseReport::skipped(Uuid::new_v4(), &planned(None));
        let json = serde_json::to_string(&report).unwrap();
        let parsed: CaseReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.outcome, Outcome::Skipped);
        assert!(parsed.error.is_none());
    }
}
