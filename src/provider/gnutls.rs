use super::{Backend, Invocation, Readiness, check_bundle};
use crate::{
    endpoint::{Cipher, EndpointOptions, Protocol, Role},
    error::{HarnessError, Result},
};
use std::path::{Path, PathBuf};

/// GnuTLS driven through `gnutls-cli` / `gnutls-serv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GnuTls {
    client: PathBuf,
    server: PathBuf,
}

impl GnuTls {
    #[must_use]
    pub fn new(client: &Path, server: &Path) -> Self {
        Self {
            client: client.to_path_buf(),
            server: server.to_path_buf(),
        }
    }

    const fn version_token(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Ssl3 => "VERS-SSL3.0",
            Protocol::Tls10 => "VERS-TLS1.0",
            Protocol::Tls11 => "VERS-TLS1.1",
            Protocol::Tls12 => "VERS-TLS1.2",
            Protocol::Tls13 => "VERS-TLS1.3",
        }
    }

    /// Priority string pinning the protocol and, when given, the bulk ciphers
    fn priority(protocol: Protocol, ciphers: &[Cipher]) -> String {
        let mut priority = format!("NORMAL:-VERS-ALL:+{}", Self::version_token(protocol));
        if !ciphers.is_empty() {
            priority.push_str(":-CIPHER-ALL");
            let mut seen: Vec<&str> = Vec::new();
            for name in ciphers.iter().filter_map(|c| c.gnutls) {
                if !seen.contains(&name) {
                    seen.push(name);
                    priority.push_str(":+");
                    priority.push_str(name);
                }
            }
        }
        priority
    }
}

impl Backend for GnuTls {
    fn name(&self) -> &'static str {
        "gnutls"
    }

    fn build_invocation(&self, options: &EndpointOptions) -> Result<Invocation> {
        check_bundle(self.name(), options, None)?;

        let priority = Self::priority(options.protocol, &options.ciphers);

        let invocation = match options.role {
            Role::Client => {
                let mut invocation = Invocation::new(&self.client);
                invocation.args([
                    "--port".to_string(),
                    options.port.to_string(),
                    "--priority".to_string(),
                    priority,
                ]);
                if options.insecure {
                    invocation.arg("--insecure");
                }
                if let Some(trust_store) = &options.trust_store {
                    invocation
                        .arg("--x509cafile")
                        .arg(trust_store.display().to_string());
                }
                if let Some(name) = &options.server_name {
                    invocation.args(["--sni-hostname", name.as_str()]);
                    if options.verify_hostname {
                        invocation.args(["--verify-hostname", name.as_str()]);
                    }
                }
                invocation.args(options.extra_flags.iter().cloned());
                invocation.arg(options.host.clone());
                invocation.stdin.clone_from(&options.data_to_send);
                invocation
            }
            Role::Server => {
                if options.certificates.is_empty() {
                    return Err(HarnessError::configuration(
                        "gnutls server requires at least one certificate",
                    ));
                }
                let mut invocation = Invocation::new(&self.server);
                invocation.args([
                    "--port".to_string(),
                    options.port.to_string(),
                    "--priority".to_string(),
                    priority,
                    "--echo".to_string(),
                ]);
                for pair in &options.certificates {
                    invocation
                        .arg("--x509certfile")
                        .arg(pair.cert.display().to_string())
                        .arg("--x509keyfile")
                        .arg(pair.key.display().to_string());
                }
                invocation.args(options.extra_flags.iter().cloned());
                invocation.readiness = Readiness::OutputMarker("listening".to_string());
                // gnutls-serv keeps accepting until killed
                invocation.kill_marker =
                    Some("Peer has closed the GnuTLS connection".to_string());
                invocation
            }
        };

        Ok(invocation)
    }

    fn supports_protocol(&self, protocol: Protocol) -> bool {
        protocol >= Protocol::Tls10
    }

    fn supports_cipher(&self, cipher: &Cipher) -> bool {
        cipher.gnutls.is_some()
    }

    fn version_marker(&self, protocol: Protocol) -> String {
        let version = match protocol {
            Protocol::Ssl3 => "SSL3.0",
            other => other.as_str(),
        };
        format!("- Version: {version}")
    }

    fn server_name_marker(&self, server_name: &str) -> Option<String> {
        Some(format!("Given server name[1]: {server_name}"))
    }

    fn cipher_marker(&self, _cipher: &Cipher) -> Option<String> {
        None
    }
}
