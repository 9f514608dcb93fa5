//! Matrix file: the JSON description of what a run covers
//!
//! ```json
//! {
//!   "providers": ["openssl"],
//!   "other_providers": ["s2n"],
//!   "protocols": ["TLS1.3", "TLS1.2"],
//!   "cert_dir": "certs",
//!   "cert_test_cases": [
//!     {
//!       "client_sni": "www.example.com",
//!       "client_ciphers": ["TLS_AES_128_GCM_SHA256"],
//!       "server_certs": [{"cert": "alligator_cert.pem", "key": "alligator_key.pem"}]
//!     }
//!   ]
//! }
//! ```
//!
//! Relative certificate paths resolve against `cert_dir`, which itself
//! resolves against the file's directory.

use crate::{
    endpoint::{Cipher, Protocol},
    error::{HarnessError, Result},
    matrix::{
        TestCaseMatrix,
        cases::{CertTestCase, Certificate},
    },
    ports::PortRange,
    provider::{Provider, ProviderBinaries, ProviderKind},
};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixFile {
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,
    #[serde(default = "default_other_providers")]
    pub other_providers: Vec<ProviderKind>,
    #[serde(default = "default_protocols")]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub ciphers: Vec<Cipher>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub cert_test_cases: Vec<CertTestCase>,
    #[serde(default)]
    pub binaries: ProviderBinaries,
    #[serde(default)]
    pub trust_store: Option<PathBuf>,
    #[serde(default)]
    pub cert_dir: Option<PathBuf>,
    /// `START-END`
    #[serde(default)]
    pub port_range: Option<String>,
    #[serde(default)]
    pub startup_timeout_ms: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_providers() -> Vec<ProviderKind> {
    vec![ProviderKind::OpenSsl]
}

fn default_other_providers() -> Vec<ProviderKind> {
    vec![ProviderKind::S2n]
}

fn default_protocols() -> Vec<Protocol> {
    vec![Protocol::Tls13, Protocol::Tls12]
}

impl MatrixFile {
    /// Read and parse a matrix file, resolving relative paths
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Configuration` if it is
    /// not a valid matrix
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut file = Self::parse(&text).map_err(|e| match e {
            HarnessError::Configuration(message) => {
                HarnessError::configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        file.resolve_paths(base);
        Ok(file)
    }

    /// Parse without touching the filesystem
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for malformed JSON or unknown names
    pub fn parse(text: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(text)
            .map_err(|e| HarnessError::configuration(format!("invalid matrix: {e}")))?;
        file.port_range()?;
        Ok(file)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let cert_dir = self
            .cert_dir
            .as_deref()
            .map_or_else(|| base.to_path_buf(), |dir| resolve(base, dir));

        for case in &mut self.cert_test_cases {
            for pair in &mut case.server_certs {
                pair.cert = resolve(&cert_dir, &pair.cert);
                pair.key = resolve(&cert_dir, &pair.key);
            }
        }
        for certificate in &mut self.certificates {
            certificate.cert = resolve(&cert_dir, &certificate.cert);
            certificate.key = resolve(&cert_dir, &certificate.key);
        }
        if let Some(trust_store) = &self.trust_store {
            self.trust_store = Some(resolve(&cert_dir, trust_store));
        }
        self.cert_dir = Some(cert_dir);
    }

    /// # Errors
    ///
    /// Returns `Configuration` for a malformed range
    pub fn port_range(&self) -> Result<Option<PortRange>> {
        self.port_range
            .as_deref()
            .map(str::parse::<PortRange>)
            .transpose()
            .map_err(HarnessError::Configuration)
    }

    #[must_use]
    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Build the case matrix with providers bound to the configured binaries
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if any cert test case is malformed
    pub fn to_matrix(&self) -> Result<TestCaseMatrix> {
        let bind = |kinds: &[ProviderKind]| -> Vec<Provider> {
            kinds
                .iter()
                .map(|kind| Provider::new(*kind, &self.binaries))
                .collect()
        };

        let matrix = TestCaseMatrix {
            providers: bind(&self.providers),
            other_providers: bind(&self.other_providers),
            protocols: self.protocols.clone(),
            cert_test_cases: self.cert_test_cases.clone(),
            ciphers: self.ciphers.clone(),
            certificates: self.certificates.clone(),
        };
        matrix.validate()?;
        Ok(matrix)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
