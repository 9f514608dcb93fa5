use super::{Backend, Invocation, Readiness, check_bundle};
use crate::{
    endpoint::{Cipher, EndpointOptions, Protocol, Role},
    error::{HarnessError, Result},
};
use std::path::{Path, PathBuf};

/// OpenSSL 1.1.1+ driven through `openssl s_client` / `openssl s_server`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSsl {
    binary: PathBuf,
}

impl OpenSsl {
    #[must_use]
    pub fn new(binary: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
        }
    }

    const fn protocol_flag(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Ssl3 => "-ssl3",
            Protocol::Tls10 => "-tls1",
            Protocol::Tls11 => "-tls1_1",
            Protocol::Tls12 => "-tls1_2",
            Protocol::Tls13 => "-tls1_3",
        }
    }

    const fn version_name(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Ssl3 => "SSLv3",
            Protocol::Tls10 => "TLSv1",
            Protocol::Tls11 => "TLSv1.1",
            Protocol::Tls12 => "TLSv1.2",
            Protocol::Tls13 => "TLSv1.3",
        }
    }

    /// TLS1.3 suites and older suites are configured through separate flags
    fn cipher_args(ciphers: &[Cipher]) -> Vec<String> {
        let (tls13, legacy): (Vec<&Cipher>, Vec<&Cipher>) =
            ciphers.iter().partition(|c| c.is_tls13());

        let mut args = Vec::new();
        if !tls13.is_empty() {
            args.push("-ciphersuites".to_string());
            args.push(join_names(&tls13));
        }
        if !legacy.is_empty() {
            args.push("-cipher".to_string());
            args.push(join_names(&legacy));
        }
        args
    }
}

fn join_names(ciphers: &[&Cipher]) -> String {
    ciphers.iter().map(|c| c.name).collect::<Vec<_>>().join(":")
}

impl Backend for OpenSsl {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn build_invocation(&self, options: &EndpointOptions) -> Result<Invocation> {
        // s_server has no multi-certificate selection beyond a single chain
        check_bundle(self.name(), options, Some(1))?;

        let mut invocation = Invocation::new(&self.binary);

        match options.role {
            Role::Client => {
                invocation.args([
                    "s_client".to_string(),
                    "-connect".to_string(),
                    format!("{}:{}", options.host, options.port),
                ]);
                invocation.arg(Self::protocol_flag(options.protocol));
                invocation.args(Self::cipher_args(&options.ciphers));
                if let Some(name) = &options.server_name {
                    invocation.args(["-servername", name.as_str()]);
                    if options.verify_hostname {
                        invocation.args(["-verify_hostname", name.as_str()]);
                    }
                }
                if !options.insecure {
                    invocation.arg("-verify_return_error");
                }
                if let Some(trust_store) = &options.trust_store {
                    invocation
                        .arg("-CAfile")
                        .arg(trust_store.display().to_string());
                }
                invocation.stdin.clone_from(&options.data_to_send);
            }
            Role::Server => {
                let pair = options.certificates.first().ok_or_else(|| {
                    HarnessError::configuration("openssl server requires a certificate")
                })?;
                invocation.args([
                    "s_server".to_string(),
                    "-accept".to_string(),
                    options.port.to_string(),
                    "-naccept".to_string(),
                    "1".to_string(),
                ]);
                invocation.arg(Self::protocol_flag(options.protocol));
                invocation.args(Self::cipher_args(&options.ciphers));
                invocation
                    .arg("-cert")
                    .arg(pair.cert.display().to_string())
                    .arg("-key")
                    .arg(pair.key.display().to_string());
                invocation.readiness = Readiness::OutputMarker("ACCEPT".to_string());
            }
        }

        invocation.args(options.extra_flags.iter().cloned());

        Ok(invocation)
    }

    fn supports_protocol(&self, protocol: Protocol) -> bool {
        protocol >= Protocol::Tls10
    }

    fn supports_cipher(&self, cipher: &Cipher) -> bool {
        cipher.openssl
    }

    fn version_marker(&self, protocol: Protocol) -> String {
        format!("Protocol version: {}", Self::version_name(protocol))
    }

    fn server_name_marker(&self, _server_name: &str) -> Option<String> {
        None
    }

    fn cipher_marker(&self, cipher: &Cipher) -> Option<String> {
        Some(format!("Cipher is {}", cipher.name))
    }
}
