use super::{Backend, Invocation, Readiness, check_bundle};
use crate::{
    endpoint::{Cipher, EndpointOptions, Protocol, Role},
    error::Result,
};
use std::path::{Path, PathBuf};

/// s2n-tls driven through its `s2nc` / `s2nd` utilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S2n {
    client: PathBuf,
    server: PathBuf,
}

impl S2n {
    #[must_use]
    pub fn new(client: &Path, server: &Path) -> Self {
        Self {
            client: client.to_path_buf(),
            server: server.to_path_buf(),
        }
    }

    /// s2n negotiates from a named security policy rather than a raw suite
    /// list, so the policy is picked from the protocol under test. Explicit
    /// ciphers are still checked for support before this is reached, and
    /// the peer is the side that pins them.
    const fn security_policy(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Tls13 => "default_tls13",
            Protocol::Tls12 => "test_all_tls12",
            _ => "test_all",
        }
    }
}

impl Backend for S2n {
    fn name(&self) -> &'static str {
        "s2n"
    }

    fn build_invocation(&self, options: &EndpointOptions) -> Result<Invocation> {
        check_bundle(self.name(), options, None)?;

        let program = match options.role {
            Role::Client => &self.client,
            Role::Server => &self.server,
        };
        let mut invocation = Invocation::new(program);
        invocation.env("S2N_DONT_MLOCK", "1");
        invocation.args(["-c", Self::security_policy(options.protocol)]);

        match options.role {
            Role::Client => {
                if options.insecure {
                    invocation.arg("--insecure");
                }
                if let Some(trust_store) = &options.trust_store {
                    invocation.arg("-f").arg(trust_store.display().to_string());
                }
                if let Some(name) = &options.server_name {
                    invocation.args(["--name", name.as_str()]);
                }
                invocation.stdin.clone_from(&options.data_to_send);
            }
            Role::Server => {
                invocation.arg("--self-service-blinding");
                for pair in &options.certificates {
                    invocation
                        .arg("--cert")
                        .arg(pair.cert.display().to_string())
                        .arg("--key")
                        .arg(pair.key.display().to_string());
                }
                invocation.readiness = Readiness::OutputMarker("Listening on".to_string());
            }
        }

        invocation.args(options.extra_flags.iter().cloned());
        invocation.args([options.host.clone(), options.port.to_string()]);

        Ok(invocation)
    }

    fn supports_protocol(&self, protocol: Protocol) -> bool {
        protocol >= Protocol::Tls10
    }

    fn supports_cipher(&self, _cipher: &Cipher) -> bool {
        true
    }

    fn pins_ciphers(&self) -> bool {
        false
    }

    fn version_marker(&self, protocol: Protocol) -> String {
        format!("Actual protocol version: {}", protocol.code())
    }

    fn server_name_marker(&self, server_name: &str) -> Option<String> {
        Some(format!("Server name: {server_name}"))
    }

    fn cipher_marker(&self, cipher: &Cipher) -> Option<String> {
        Some(format!("Cipher negotiated: {}", cipher.name))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::endpoint::CertKeyPair;

    fn s2n() -> S2n {
        S2n::new(Path::new("/opt/s2n/bin/s2nc"), Path::new("/opt/s2n/bin/s2nd"))
    }

    #[test]
    fn test_server_bundle_order_preserved() {
        let options = EndpointOptions::server(8000, Protocol::Tls13).with_certificates(vec![
            CertKeyPair::new("rsa.pem", "rsa.key"),
            CertKeyPair::new("ecdsa.pem", "ecdsa.key"),
        ]);
        let invocation = s2n().build_invocation(&options).unwrap();

        assert_eq!(invocation.program, PathBuf::from("/opt/s2n/bin/s2nd"));
        assert_eq!(
            invocation.args,
            vec![
                "-c",
                "default_tls13",
                "--self-service-blinding",
                "--cert",
                "rsa.pem",
                "--key",
                "rsa.key",
                "--cert",
                "ecdsa.pem",
                "--key",
                "ecdsa.key",
                "127.0.0.1",
                "8000",
            ]
        );
        assert_eq!(
            invocation.readiness,
            Readiness::OutputMarker("Listening on".to_string())
        );
    }

    #[test]
    fn test_client_arguments() {
        let options = EndpointOptions::client(8000, Protocol::Tls12)
            .with_server_name(Some("www.example.com".to_string()))
            .verifying(Some("ca.pem".into()))
            .with_data(b"hello".to_vec());
        let invocation = s2n().build_invocation(&options).unwrap();

        assert_eq!(invocation.program, PathBuf::from("/opt/s2n/bin/s2nc"));
        assert_eq!(
            invocation.args,
            vec![
                "-c",
                "test_all_tls12",
                "-f",
                "ca.pem",
                "--name",
                "www.example.com",
                "127.0.0.1",
                "8000",
            ]
        );
        assert_eq!(invocation.readiness, Readiness::None);
        assert_eq!(invocation.stdin.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_insecure_client() {
        let options = EndpointOptions::client(8000, Protocol::Tls11);
        let invocation = s2n().build_invocation(&options).unwrap();
        assert!(invocation.args.contains(&"--insecure".to_string()));
        assert!(invocation.args.contains(&"test_all".to_string()));
    }

    #[test]
    fn test_cipher_list_maps_to_protocol_policy() {
        use crate::endpoint::cipher::{TLS_AES_128_GCM_SHA256, TLS_AES_256_GCM_SHA384};

        let a = EndpointOptions::client(8443, Protocol::Tls13)
            .with_ciphers(vec![TLS_AES_128_GCM_SHA256]);
        let b = EndpointOptions::client(8443, Protocol::Tls13)
            .with_ciphers(vec![TLS_AES_256_GCM_SHA384]);

        let a = s2n().build_invocation(&a).unwrap();
        let b = s2n().build_invocation(&b).unwrap();
        assert_eq!(a.args, b.args);
        assert!(a.args.starts_with(&["-c".to_string(), "default_tls13".to_string()]));
        assert!(!s2n().pins_ciphers());
    }

    #[test]
    fn test_markers() {
        let s2n = s2n();
        assert_eq!(
            s2n.version_marker(Protocol::Tls13),
            "Actual protocol version: 34"
        );
        assert_eq!(
            s2n.server_name_marker("www.example.com").as_deref(),
            Some("Server name: www.example.com")
        );
    }
}
