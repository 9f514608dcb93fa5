//! Combinatorial case generation
//!
//! A [`TestCaseMatrix`] is the cross product provider x other_provider x
//! protocol x case. `provider` always plays the client and `other_provider`
//! the server. The skip predicate runs on every tuple before anything is
//! instantiated.

pub mod cases;
pub mod filter;

use crate::{
    endpoint::{Cipher, Protocol},
    error::Result,
    provider::Provider,
};
use cases::{CertTestCase, Certificate};
use filter::{Parameters, SkipReason, filter_cipher_list, invalid_test_parameters};
use serde::Serialize;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Multi-certificate server, client selects by SNI
    #[default]
    SniMatch,
    /// One cipher, one certificate
    Handshake,
}

impl Scenario {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SniMatch => "sni-match",
            Self::Handshake => "handshake",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "sni-match" | "sni" => Ok(Self::SniMatch),
            "handshake" => Ok(Self::Handshake),
            _ => Err(format!("Invalid scenario: {s}")),
        }
    }
}

/// Scenario-specific part of a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseParams {
    Sni(CertTestCase),
    Handshake {
        cipher: Cipher,
        certificate: Certificate,
    },
}

impl CaseParams {
    #[must_use]
    pub const fn scenario(&self) -> Scenario {
        match self {
            Self::Sni(_) => Scenario::SniMatch,
            Self::Handshake { .. } => Scenario::Handshake,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Sni(case) => case.label(),
            Self::Handshake {
                cipher,
                certificate,
            } => format!("{cipher}-{}", certificate.name),
        }
    }
}

/// One concrete combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioTuple {
    /// Client side
    pub provider: Provider,
    /// Server side
    pub other_provider: Provider,
    pub protocol: Protocol,
    pub params: CaseParams,
}

impl ScenarioTuple {
    #[must_use]
    pub const fn scenario(&self) -> Scenario {
        self.params.scenario()
    }

    /// Stable id, e.g. `sni-match/openssl-s2n/TLS1.3/www.example.com-2certs`
    #[must_use]
    pub fn id(&self) -> String {
        format!(
            "{}/{}-{}/{}/{}",
            self.scenario(),
            self.provider,
            self.other_provider,
            self.protocol,
            self.params.label()
        )
    }

    /// Why this tuple should not run, if it should not
    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match &self.params {
            CaseParams::Sni(case) => {
                filter_cipher_list(&self.provider, &self.other_provider, self.protocol, case)
            }
            CaseParams::Handshake {
                cipher,
                certificate,
            } => invalid_test_parameters(&Parameters {
                provider: &self.provider,
                other_provider: &self.other_provider,
                protocol: self.protocol,
                cipher: Some(cipher),
                certificate: Some(certificate.algorithm),
            }),
        }
    }
}

/// A tuple and its skip decision
#[derive(Debug, Clone)]
pub struct PlannedCase {
    pub tuple: ScenarioTuple,
    pub skip: Option<SkipReason>,
}

impl PlannedCase {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestCaseMatrix {
    pub providers: Vec<Provider>,
    pub other_providers: Vec<Provider>,
    pub protocols: Vec<Protocol>,
    pub cert_test_cases: Vec<CertTestCase>,
    pub ciphers: Vec<Cipher>,
    pub certificates: Vec<Certificate>,
}

impl TestCaseMatrix {
    /// # Errors
    ///
    /// Returns `Configuration` for a malformed cert test case
    pub fn validate(&self) -> Result<()> {
        self.cert_test_cases
            .iter()
            .try_for_each(CertTestCase::validate)
    }

    /// Every tuple of `scenario`, in declaration order
    #[must_use]
    pub fn tuples(&self, scenario: Scenario) -> Vec<ScenarioTuple> {
        let params: Vec<CaseParams> = match scenario {
            Scenario::SniMatch => self
                .cert_test_cases
                .iter()
                .cloned()
                .map(CaseParams::Sni)
                .collect(),
            Scenario::Handshake => self
                .ciphers
                .iter()
                .flat_map(|cipher| {
                    self.certificates
                        .iter()
                        .map(move |certificate| CaseParams::Handshake {
                            cipher: *cipher,
                            certificate: certificate.clone(),
                        })
                })
                .collect(),
        };

        let mut tuples = Vec::new();
        for provider in &self.providers {
            for other_provider in &self.other_providers {
                for protocol in &self.protocols {
                    for p in &params {
                        tuples.push(ScenarioTuple {
                            provider: provider.clone(),
                            other_provider: other_provider.clone(),
                            protocol: *protocol,
                            params: p.clone(),
                        });
                    }
                }
            }
        }
        tuples
    }

    /// Tuples with their skip decisions
    #[must_use]
    pub fn plan(&self, scenario: Scenario) -> Vec<PlannedCase> {
        self.tuples(scenario)
            .into_iter()
            .map(|tuple| {
                let skip = tuple.skip_reason();
                if let Some(reason) = &skip {
                    tracing::debug!(id = %tuple.id(), %reason, "skipping");
                }
                PlannedCase { tuple, skip }
            })
            .collect()
    }
}
