//! Skip predicates applied before a case is instantiated
//!
//! A skipped combination is inapplicable, not failed: it is reported with
//! its [`SkipReason`] and never launches a process.

use super::cases::{CertTestCase, KeyAlgorithm};
use crate::{
    endpoint::{Cipher, Protocol},
    provider::Provider,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ProtocolUnsupported {
        provider: &'static str,
        protocol: Protocol,
    },
    /// Protocol older than every cipher the client offers
    BelowLowestCipher {
        protocol: Protocol,
        lowest: Protocol,
    },
    CipherTooNew {
        cipher: &'static str,
        protocol: Protocol,
    },
    /// Suites predating TLS1.3 cannot be negotiated under TLS1.3
    LegacyCipherUnderTls13 { cipher: &'static str },
    CipherUnsupported {
        provider: &'static str,
        cipher: &'static str,
    },
    /// RSA-PSS certificates need TLS1.3
    RsaPssBelowTls13 { protocol: Protocol },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolUnsupported { provider, protocol } => {
                write!(f, "{provider} does not support {protocol}")
            }
            Self::BelowLowestCipher { protocol, lowest } => {
                write!(f, "{protocol} is older than every client cipher (lowest {lowest})")
            }
            Self::CipherTooNew { cipher, protocol } => {
                write!(f, "{cipher} cannot be negotiated under {protocol}")
            }
            Self::LegacyCipherUnderTls13 { cipher } => {
                write!(f, "{cipher} predates TLS1.3")
            }
            Self::CipherUnsupported { provider, cipher } => {
                write!(f, "{provider} does not offer {cipher}")
            }
            Self::RsaPssBelowTls13 { protocol } => {
                write!(f, "RSA-PSS certificates require TLS1.3, got {protocol}")
            }
        }
    }
}

/// Inputs of the generic skip predicate
#[derive(Debug, Clone, Copy)]
pub struct Parameters<'a> {
    pub provider: &'a Provider,
    pub other_provider: &'a Provider,
    pub protocol: Protocol,
    pub cipher: Option<&'a Cipher>,
    pub certificate: Option<KeyAlgorithm>,
}

/// Generic compatibility rules shared by every scenario
#[must_use]
pub fn invalid_test_parameters(params: &Parameters<'_>) -> Option<SkipReason> {
    let protocol = params.protocol;
    let providers = [params.provider, params.other_provider];

    if protocol < Protocol::Tls13 && params.certificate == Some(KeyAlgorithm::RsaPss) {
        return Some(SkipReason::RsaPssBelowTls13 { protocol });
    }

    if let Some(provider) = providers.iter().find(|p| !p.supports_protocol(protocol)) {
        return Some(SkipReason::ProtocolUnsupported {
            provider: provider.name(),
            protocol,
        });
    }

    if let Some(cipher) = params.cipher {
        if cipher.min_version > protocol {
            return Some(SkipReason::CipherTooNew {
                cipher: cipher.name,
                protocol,
            });
        }
        if protocol == Protocol::Tls13 && cipher.min_version < protocol {
            return Some(SkipReason::LegacyCipherUnderTls13 {
                cipher: cipher.name,
            });
        }
        if let Some(provider) = providers.iter().find(|p| !p.supports_cipher(cipher)) {
            return Some(SkipReason::CipherUnsupported {
                provider: provider.name(),
                cipher: cipher.name,
            });
        }
    }

    None
}

/// SNI-scenario predicate
///
/// Client ciphers are grouped per case rather than per tuple, so the generic
/// per-cipher filtering does not apply. Skip when the protocol is older than
/// the lowest cipher's minimum version, then defer to the generic rules.
#[must_use]
pub fn filter_cipher_list(
    provider: &Provider,
    other_provider: &Provider,
    protocol: Protocol,
    case: &CertTestCase,
) -> Option<SkipReason> {
    if let Some(lowest) = case.lowest_cipher_version()
        && protocol < lowest
    {
        return Some(SkipReason::BelowLowestCipher { protocol, lowest });
    }

    invalid_test_parameters(&Parameters {
        provider,
        other_provider,
        protocol,
        cipher: None,
        certificate: None,
    })
}
