//! TLS implementations driven by the harness
//!
//! Each provider translates [`EndpointOptions`] into an [`Invocation`] of its
//! own client or server binary, and answers capability questions without
//! launching anything. Expected output markers are owned by the provider too:
//! the harness only ever checks for substring containment.
//!
//! - `s2n` - `s2nc` / `s2nd`
//! - `openssl` - `openssl s_client` / `openssl s_server`
//! - `gnutls` - `gnutls-cli` / `gnutls-serv`

pub mod gnutls;
pub mod openssl;
pub mod s2n;

use crate::{
    endpoint::{Cipher, EndpointOptions, Protocol, Role},
    error::{HarnessError, Result},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

pub use gnutls::GnuTls;
pub use openssl::OpenSsl;
pub use s2n::S2n;

/// How the harness decides that a server is ready for its client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Ready as soon as it is running (clients)
    None,
    /// Ready once this text shows up on stdout
    OutputMarker(String),
    /// Ready once a TCP connection to the port succeeds
    PortOpen { host: String, port: u16 },
}

/// Concrete command line for one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub readiness: Readiness,
    /// Output after which the process is terminated and counted as complete
    pub kill_marker: Option<String>,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            readiness: Readiness::None,
            kill_marker: None,
            stdin: None,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering for logs
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Paths to the provider binaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderBinaries {
    pub s2nc: PathBuf,
    pub s2nd: PathBuf,
    pub openssl: PathBuf,
    pub gnutls_cli: PathBuf,
    pub gnutls_serv: PathBuf,
}

impl Default for ProviderBinaries {
    fn default() -> Self {
        Self {
            s2nc: "s2nc".into(),
            s2nd: "s2nd".into(),
            openssl: "openssl".into(),
            gnutls_cli: "gnutls-cli".into(),
            gnutls_serv: "gnutls-serv".into(),
        }
    }
}

/// Capability interface shared by every provider variant
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Translate options into a command line
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Configuration` for combinations the provider
    /// cannot express
    fn build_invocation(&self, options: &EndpointOptions) -> Result<Invocation>;

    fn supports_protocol(&self, protocol: Protocol) -> bool;

    fn supports_cipher(&self, cipher: &Cipher) -> bool;

    /// Whether an explicit cipher list restricts what the endpoint offers
    fn pins_ciphers(&self) -> bool {
        true
    }

    /// Text a server prints once it negotiated `protocol`
    fn version_marker(&self, protocol: Protocol) -> String;

    /// Text a server prints for a matched SNI value, when it reports one
    fn server_name_marker(&self, server_name: &str) -> Option<String>;

    /// Text a client prints for the negotiated cipher, when it reports one
    fn cipher_marker(&self, cipher: &Cipher) -> Option<String>;
}

/// Variant tag used in matrix files and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    S2n,
    OpenSsl,
    GnuTls,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s2n" => Ok(Self::S2n),
            "openssl" => Ok(Self::OpenSsl),
            "gnutls" => Ok(Self::GnuTls),
            _ => Err(format!("Invalid provider: {s}")),
        }
    }
}

/// Closed set of TLS implementations, dispatched by tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    S2n(S2n),
    OpenSsl(OpenSsl),
    GnuTls(GnuTls),
}

impl Provider {
    #[must_use]
    pub fn new(kind: ProviderKind, binaries: &ProviderBinaries) -> Self {
        match kind {
            ProviderKind::S2n => Self::S2n(S2n::new(&binaries.s2nc, &binaries.s2nd)),
            ProviderKind::OpenSsl => Self::OpenSsl(OpenSsl::new(&binaries.openssl)),
            ProviderKind::GnuTls => {
                Self::GnuTls(GnuTls::new(&binaries.gnutls_cli, &binaries.gnutls_serv))
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::S2n(_) => ProviderKind::S2n,
            Self::OpenSsl(_) => ProviderKind::OpenSsl,
            Self::GnuTls(_) => ProviderKind::GnuTls,
        }
    }

    fn backend(&self) -> &dyn Backend {
        match self {
            Self::S2n(p) => p,
            Self::OpenSsl(p) => p,
            Self::GnuTls(p) => p,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.backend().name()
    }

    /// Translate options into a command line for this provider
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Configuration` before anything is launched when
    /// the options are invalid or the provider cannot express them
    pub fn build_invocation(&self, options: &EndpointOptions) -> Result<Invocation> {
        options.validate()?;
        if !self.supports_protocol(options.protocol) {
            return Err(HarnessError::configuration(format!(
                "{} does not support {}",
                self.name(),
                options.protocol
            )));
        }
        if let Some(cipher) = options.ciphers.iter().find(|c| !self.supports_cipher(c)) {
            return Err(HarnessError::configuration(format!(
                "{} does not offer {cipher}",
                self.name()
            )));
        }
        // newer suites may ride along in a mixed list, but one must fit
        if !options.ciphers.is_empty()
            && !options
                .ciphers
                .iter()
                .any(|c| self.supports(options.protocol, c))
        {
            return Err(HarnessError::configuration(format!(
                "{} has no cipher usable under {}",
                self.name(),
                options.protocol
            )));
        }
        self.backend().build_invocation(options)
    }

    #[must_use]
    pub fn supports_protocol(&self, protocol: Protocol) -> bool {
        self.backend().supports_protocol(protocol)
    }

    /// Whether the provider can offer `cipher` when running `protocol`
    #[must_use]
    pub fn supports(&self, protocol: Protocol, cipher: &Cipher) -> bool {
        self.supports_protocol(protocol)
            && cipher.min_version <= protocol
            && self.backend().supports_cipher(cipher)
    }

    #[must_use]
    pub fn supports_cipher(&self, cipher: &Cipher) -> bool {
        self.backend().supports_cipher(cipher)
    }

    #[must_use]
    pub fn pins_ciphers(&self) -> bool {
        self.backend().pins_ciphers()
    }

    #[must_use]
    pub fn version_marker(&self, protocol: Protocol) -> String {
        self.backend().version_marker(protocol)
    }

    #[must_use]
    pub fn server_name_marker(&self, server_name: &str) -> Option<String> {
        self.backend().server_name_marker(server_name)
    }

    #[must_use]
    pub fn cipher_marker(&self, cipher: &Cipher) -> Option<String> {
        self.backend().cipher_marker(cipher)
    }

    /// Label used in case ids and logs, e.g. `s2n-server`
    #[must_use]
    pub fn endpoint_label(&self, role: Role) -> String {
        format!("{}-{role}", self.name())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Highest protocol at or below `requested` that both peers support
#[must_use]
pub fn negotiated_protocol(a: &Provider, b: &Provider, requested: Protocol) -> Option<Protocol> {
    let mut candidate = Some(requested);
    while let Some(protocol) = candidate {
        if a.supports_protocol(protocol) && b.supports_protocol(protocol) {
            return Some(protocol);
        }
        candidate = protocol.previous();
    }
    None
}

/// Shared argument validation for server bundles
pub(crate) fn check_bundle(
    name: &str,
    options: &EndpointOptions,
    max_certificates: Option<usize>,
) -> Result<()> {
    if !options.is_server() {
        return Ok(());
    }
    if let Some(max) = max_certificates
        && options.certificates.len() > max
    {
        return Err(HarnessError::configuration(format!(
            "{name} server supports at most {max} certificate(s), got {}",
            options.certificates.len()
        )));
    }
    Ok(())
}
