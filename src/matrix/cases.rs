use crate::{
    endpoint::{CertKeyPair, Cipher, Protocol},
    error::{HarnessError, Result},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// Key algorithm of a server certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KeyAlgorithm {
    #[default]
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "RSAPSS")]
    RsaPss,
    #[serde(rename = "ECDSA")]
    Ecdsa,
}

impl KeyAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::RsaPss => "RSAPSS",
            Self::Ecdsa => "ECDSA",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named server certificate used by the handshake scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    pub cert: PathBuf,
    pub key: PathBuf,
    #[serde(default)]
    pub algorithm: KeyAlgorithm,
}

impl Certificate {
    #[must_use]
    pub fn pair(&self) -> CertKeyPair {
        CertKeyPair::new(self.cert.clone(), self.key.clone())
    }
}

/// Multi-certificate server setup and the client parameters that should
/// select one of its certificates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertTestCase {
    /// Short label used in case ids; derived from the SNI value when absent
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client_sni: Option<String>,
    pub client_ciphers: Vec<Cipher>,
    pub server_certs: Vec<CertKeyPair>,
}

impl CertTestCase {
    /// # Errors
    ///
    /// Returns `Configuration` when the cipher list or the bundle is empty
    pub fn validate(&self) -> Result<()> {
        if self.client_ciphers.is_empty() {
            return Err(HarnessError::configuration(format!(
                "cert test case {} has no client ciphers",
                self.label()
            )));
        }
        if self.server_certs.is_empty() {
            return Err(HarnessError::configuration(format!(
                "cert test case {} has no server certificates",
                self.label()
            )));
        }
        Ok(())
    }

    /// Oldest protocol any of the client's ciphers can run under
    #[must_use]
    pub fn lowest_cipher_version(&self) -> Option<Protocol> {
        Cipher::lowest_version(&self.client_ciphers).map(|c| c.min_version)
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            format!(
                "{}-{}certs",
                self.client_sni.as_deref().unwrap_or("no-sni"),
                self.server_certs.len()
            )
        })
    }
}
