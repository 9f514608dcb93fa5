use super::{Cipher, Protocol};
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// Which side of the handshake an endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate chain and its private key, both PEM files
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertKeyPair {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CertKeyPair {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }
}

/// Launch configuration for one endpoint
///
/// Built once per case and never mutated after validation. An empty
/// `ciphers` list means "provider default"; use [`EndpointOptions::with_ciphers`]
/// to set an explicit, non-empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOptions {
    pub role: Role,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub ciphers: Vec<Cipher>,
    pub server_name: Option<String>,
    pub certificates: Vec<CertKeyPair>,
    pub insecure: bool,
    pub verify_hostname: bool,
    pub trust_store: Option<PathBuf>,
    pub data_to_send: Option<Vec<u8>>,
    pub extra_flags: Vec<String>,
    explicit_ciphers: bool,
}

impl EndpointOptions {
    #[must_use]
    pub fn client(port: u16, protocol: Protocol) -> Self {
        Self::new(Role::Client, port, protocol)
    }

    #[must_use]
    pub fn server(port: u16, protocol: Protocol) -> Self {
        Self::new(Role::Server, port, protocol)
    }

    fn new(role: Role, port: u16, protocol: Protocol) -> Self {
        Self {
            role,
            host: "127.0.0.1".to_string(),
            port,
            protocol,
            ciphers: Vec::new(),
            server_name: None,
            certificates: Vec::new(),
            insecure: true,
            verify_hostname: false,
            trust_store: None,
            data_to_send: None,
            extra_flags: Vec::new(),
            explicit_ciphers: false,
        }
    }

    #[must_use]
    pub fn with_ciphers(mut self, ciphers: Vec<Cipher>) -> Self {
        self.ciphers = ciphers;
        self.explicit_ciphers = true;
        self
    }

    #[must_use]
    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name;
        self
    }

    #[must_use]
    pub fn with_certificates(mut self, certificates: Vec<CertKeyPair>) -> Self {
        self.certificates = certificates;
        self
    }

    /// Verify the peer: turns off `insecure` and checks the hostname
    #[must_use]
    pub fn verifying(mut self, trust_store: Option<PathBuf>) -> Self {
        self.insecure = false;
        self.verify_hostname = true;
        self.trust_store = trust_store;
        self
    }

    /// Verify the peer chain against `trust_store` without a hostname check
    #[must_use]
    pub fn with_trust_store(mut self, trust_store: Option<PathBuf>) -> Self {
        self.insecure = false;
        self.trust_store = trust_store;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data_to_send = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_extra_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_flags.extend(flags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        self.role == Role::Server
    }

    /// Check the invariants every provider relies on
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Configuration` if a client carries certificates,
    /// an explicit cipher list is empty, or the port is zero
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(HarnessError::configuration(format!(
                "{} port must be non-zero",
                self.role
            )));
        }

        if self.role == Role::Client && !self.certificates.is_empty() {
            return Err(HarnessError::configuration(
                "a client endpoint never carries a certificate bundle",
            ));
        }

        if self.explicit_ciphers && self.ciphers.is_empty() {
            return Err(HarnessError::configuration(format!(
                "{} cipher list must not be empty",
                self.role
            )));
        }

        if self.verify_hostname && self.role == Role::Client && self.server_name.is_none() {
            return Err(HarnessError::configuration(
                "hostname verification requires a server name",
            ));
        }

        Ok(())
    }

    /// Validate that a server in a certificate-selection scenario has a bundle
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Configuration` when the bundle is empty
    pub fn require_bundle(&self) -> Result<()> {
        if self.role == Role::Server && self.certificates.is_empty() {
            return Err(HarnessError::configuration(
                "certificate selection needs a non-empty server bundle",
            ));
        }
        Ok(())
    }
}
