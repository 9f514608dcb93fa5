use super::Protocol;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// A cipher suite known to the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cipher {
    /// OpenSSL-style name for suites up to TLS1.2, IANA name for TLS1.3
    pub name: &'static str,
    /// IANA registry name
    pub iana_name: &'static str,
    /// Oldest protocol able to negotiate this suite
    pub min_version: Protocol,
    /// Available in the OpenSSL 1.1.1 default build
    pub openssl: bool,
    /// Bulk cipher priority item understood by GnuTLS
    pub gnutls: Option<&'static str>,
}

impl Cipher {
    const fn new(
        name: &'static str,
        iana_name: &'static str,
        min_version: Protocol,
        openssl: bool,
        gnutls: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            iana_name,
            min_version,
            openssl,
            gnutls,
        }
    }

    /// TLS1.3 suites use a separate negotiation space from older suites
    #[must_use]
    pub fn is_tls13(&self) -> bool {
        self.min_version == Protocol::Tls13
    }

    /// Look a cipher up in the catalogue by its name or IANA name
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        CATALOGUE
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name) || c.iana_name.eq_ignore_ascii_case(name))
            .copied()
    }

    /// Cipher with the oldest `min_version` in the list
    #[must_use]
    pub fn lowest_version(ciphers: &[Self]) -> Option<&Self> {
        ciphers.iter().min_by_key(|c| c.min_version)
    }
}

pub const TLS_AES_128_GCM_SHA256: Cipher = Cipher::new(
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_128_GCM_SHA256",
    Protocol::Tls13,
    true,
    Some("AES-128-GCM"),
);
pub const TLS_AES_256_GCM_SHA384: Cipher = Cipher::new(
    "TLS_AES_256_GCM_SHA384",
    "TLS_AES_256_GCM_SHA384",
    Protocol::Tls13,
    true,
    Some("AES-256-GCM"),
);
pub const TLS_CHACHA20_POLY1305_SHA256: Cipher = Cipher::new(
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_CHACHA20_POLY1305_SHA256",
    Protocol::Tls13,
    true,
    Some("CHACHA20-POLY1305"),
);
pub const ECDHE_RSA_AES128_GCM_SHA256: Cipher = Cipher::new(
    "ECDHE-RSA-AES128-GCM-SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    Protocol::Tls12,
    true,
    Some("AES-128-GCM"),
);
pub const ECDHE_RSA_AES256_GCM_SHA384: Cipher = Cipher::new(
    "ECDHE-RSA-AES256-GCM-SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    Protocol::Tls12,
    true,
    Some("AES-256-GCM"),
);
pub const ECDHE_ECDSA_AES128_GCM_SHA256: Cipher = Cipher::new(
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    Protocol::Tls12,
    true,
    Some("AES-128-GCM"),
);
pub const ECDHE_ECDSA_AES256_GCM_SHA384: Cipher = Cipher::new(
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    Protocol::Tls12,
    true,
    Some("AES-256-GCM"),
);
pub const ECDHE_RSA_CHACHA20_POLY1305: Cipher = Cipher::new(
    "ECDHE-RSA-CHACHA20-POLY1305",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    Protocol::Tls12,
    true,
    Some("CHACHA20-POLY1305"),
);
pub const AES256_GCM_SHA384: Cipher = Cipher::new(
    "AES256-GCM-SHA384",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
    Protocol::Tls12,
    true,
    Some("AES-256-GCM"),
);
pub const ECDHE_RSA_AES128_SHA: Cipher = Cipher::new(
    "ECDHE-RSA-AES128-SHA",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    Protocol::Tls10,
    true,
    Some("AES-128-CBC"),
);
pub const ECDHE_ECDSA_AES128_SHA: Cipher = Cipher::new(
    "ECDHE-ECDSA-AES128-SHA",
    "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
    Protocol::Tls10,
    true,
    Some("AES-128-CBC"),
);
pub const AES128_SHA: Cipher = Cipher::new(
    "AES128-SHA",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
    Protocol::Ssl3,
    true,
    Some("AES-128-CBC"),
);
pub const DES_CBC3_SHA: Cipher = Cipher::new(
    "DES-CBC3-SHA",
    "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
    Protocol::Ssl3,
    false,
    Some("3DES-CBC"),
);

/// Every cipher the harness can name in a matrix file
pub const CATALOGUE: &[Cipher] = &[
    TLS_AES_128_GCM_SHA256,
    TLS_AES_256_GCM_SHA384,
    TLS_CHACHA20_POLY1305_SHA256,
    ECDHE_RSA_AES128_GCM_SHA256,
    ECDHE_RSA_AES256_GCM_SHA384,
    ECDHE_ECDSA_AES128_GCM_SHA256,
    ECDHE_ECDSA_AES256_GCM_SHA384,
    ECDHE_RSA_CHACHA20_POLY1305,
    AES256_GCM_SHA384,
    ECDHE_RSA_AES128_SHA,
    ECDHE_ECDSA_AES128_SHA,
    AES128_SHA,
    DES_CBC3_SHA,
];

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Cipher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| format!("Unknown cipher: {s}"))
    }
}

impl Serialize for Cipher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

impl<'de> Deserialize<'de> for Cipher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
