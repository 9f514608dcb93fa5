use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// TLS protocol version under test
///
/// Variants are declared oldest first so the derived `Ord` is the protocol's
/// total order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Protocol {
    #[serde(rename = "SSLv3")]
    Ssl3,
    #[serde(rename = "TLS1.0")]
    Tls10,
    #[serde(rename = "TLS1.1")]
    Tls11,
    #[serde(rename = "TLS1.2")]
    Tls12,
    #[default]
    #[serde(rename = "TLS1.3")]
    Tls13,
}

impl Protocol {
    pub const ALL: [Self; 5] = [
        Self::Ssl3,
        Self::Tls10,
        Self::Tls11,
        Self::Tls12,
        Self::Tls13,
    ];

    /// Numeric code as printed by s2n (`S2N_TLS13` is 34)
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ssl3 => 30,
            Self::Tls10 => 31,
            Self::Tls11 => 32,
            Self::Tls12 => 33,
            Self::Tls13 => 34,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssl3 => "SSLv3",
            Self::Tls10 => "TLS1.0",
            Self::Tls11 => "TLS1.1",
            Self::Tls12 => "TLS1.2",
            Self::Tls13 => "TLS1.3",
        }
    }

    /// The next older protocol, if any
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Ssl3 => None,
            Self::Tls10 => Some(Self::Ssl3),
            Self::Tls11 => Some(Self::Tls10),
            Self::Tls12 => Some(Self::Tls11),
            Self::Tls13 => Some(Self::Tls12),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', 'v'], ".").as_str() {
            "ssl.3" | "ssl3" | "ssl.3.0" => Ok(Self::Ssl3),
            "tls1.0" | "tls.1.0" | "tls10" => Ok(Self::Tls10),
            "tls1.1" | "tls.1.1" | "tls11" => Ok(Self::Tls11),
            "tls1.2" | "tls.1.2" | "tls12" => Ok(Self::Tls12),
            "tls1.3" | "tls.1.3" | "tls13" => Ok(Self::Tls13),
            _ => Err(format!("Invalid protocol: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_protocol_total_order() {
        assert!(Protocol::Ssl3 < Protocol::Tls10);
        assert!(Protocol::Tls10 < Protocol::Tls11);
        assert!(Protocol::Tls11 < Protocol::Tls12);
        assert!(Protocol::Tls12 < Protocol::Tls13);
        assert_eq!(Protocol::ALL.iter().max(), Some(&Protocol::Tls13));
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("TLS1.3".parse::<Protocol>().unwrap(), Protocol::Tls13);
        assert_eq!("tls1.2".parse::<Protocol>().unwrap(), Protocol::Tls12);
        assert_eq!("TLSv1.1".parse::<Protocol>().unwrap(), Protocol::Tls11);
        assert_eq!("tls13".parse::<Protocol>().unwrap(), Protocol::Tls13);
        assert_eq!("SSLv3".parse::<Protocol>().unwrap(), Protocol::Ssl3);
        assert!("tls2.0".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_protocol_display_round_trips() {
        for protocol in Protocol::ALL {
            assert_eq!(protocol.to_string().parse::<Protocol>().unwrap(), protocol);
        }
    }

    #[test]
    fn test_protocol_codes() {
        assert_eq!(Protocol::Tls13.code(), 34);
        assert_eq!(Protocol::Tls12.code(), 33);
        assert_eq!(Protocol::Ssl3.code(), 30);
    }

    #[test]
    fn test_protocol_previous() {
        assert_eq!(Protocol::Tls13.previous(), Some(Protocol::Tls12));
        assert_eq!(Protocol::Ssl3.previous(), None);
    }

    #[test]
    fn test_protocol_serde_names() {
        let json = serde_json::to_string(&Protocol::Tls13).unwrap();
        assert_eq!(json, "\"TLS1.3\"");
        let parsed: Protocol = serde_json::from_str("\"TLS1.2\"").unwrap();
        assert_eq!(parsed, Protocol::Tls12);
    }
}
