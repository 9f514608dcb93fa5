//! PEM/X.509 inspection of server certificate bundles
//!
//! Bundles are checked before anything is launched, and the parsed names let
//! a case report which certificate an SNI value should select.

use crate::{
    endpoint::CertKeyPair,
    error::{HarnessError, Result},
};
use chrono::Utc;
use rustls_pemfile::{certs, private_key};
use std::{io::Cursor, path::Path};
use tokio::fs;
use x509_parser::{
    extensions::GeneralName,
    prelude::{FromDer, X509Certificate},
};

/// Names and validity of the leaf certificate in a PEM file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    /// DNS subject alternative names, or the common name when there are none
    pub dns_names: Vec<String>,
    /// Days until expiry (negative if expired)
    pub expiry_days: i64,
}

impl CertSummary {
    /// Whether this certificate is valid for `server_name`
    ///
    /// A leading `*.` label matches exactly one label.
    #[must_use]
    pub fn matches(&self, server_name: &str) -> bool {
        self.matches_exact(server_name) || self.matches_wildcard(server_name)
    }

    fn matches_exact(&self, server_name: &str) -> bool {
        self.dns_names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(server_name))
    }

    fn matches_wildcard(&self, server_name: &str) -> bool {
        let Some((_, parent)) = server_name.split_once('.') else {
            return false;
        };
        self.dns_names.iter().any(|name| {
            name.strip_prefix("*.")
                .is_some_and(|suffix| suffix.eq_ignore_ascii_case(parent))
        })
    }
}

/// Parse the first certificate of a PEM file
///
/// # Errors
///
/// Returns `Configuration` if the file is unreadable or holds no valid
/// certificate
pub async fn inspect(path: &Path) -> Result<CertSummary> {
    let data = fs::read(path).await.map_err(|e| {
        HarnessError::configuration(format!(
            "failed to read certificate {}: {e}",
            path.display()
        ))
    })?;

    let mut reader = Cursor::new(data);
    let chain = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            HarnessError::configuration(format!(
                "invalid certificate PEM {}: {e}",
                path.display()
            ))
        })?;

    let leaf = chain.first().ok_or_else(|| {
        HarnessError::configuration(format!("no certificates found in {}", path.display()))
    })?;

    summarize(leaf.as_ref()).map_err(|e| {
        HarnessError::configuration(format!("{}: {e}", path.display()))
    })
}

fn summarize(der: &[u8]) -> std::result::Result<CertSummary, String> {
    let (_, cert) =
        X509Certificate::from_der(der).map_err(|e| format!("failed to parse certificate: {e}"))?;

    let mut dns_names: Vec<String> = match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some((*dns).to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => return Err(format!("invalid subject alternative name: {e}")),
    };

    if dns_names.is_empty()
        && let Some(cn) = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
    {
        dns_names.push(cn.to_string());
    }

    let raw = cert.validity().not_after.to_datetime();
    let not_after = chrono::DateTime::<Utc>::from_timestamp(raw.unix_timestamp(), raw.nanosecond())
        .ok_or_else(|| "invalid certificate expiry timestamp".to_string())?;

    Ok(CertSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        dns_names,
        expiry_days: (not_after - Utc::now()).num_days(),
    })
}

/// Make sure a PEM file holds a private key
///
/// # Errors
///
/// Returns `Configuration` if the file is unreadable or holds no key
pub async fn check_key(path: &Path) -> Result<()> {
    let data = fs::read(path).await.map_err(|e| {
        HarnessError::configuration(format!(
            "failed to read private key {}: {e}",
            path.display()
        ))
    })?;

    let mut reader = Cursor::new(data);
    private_key(&mut reader)
        .map_err(|e| {
            HarnessError::configuration(format!(
                "invalid private key PEM {}: {e}",
                path.display()
            ))
        })?
        .map(|_| ())
        .ok_or_else(|| {
            HarnessError::configuration(format!("no private key found in {}", path.display()))
        })
}

/// Inspect a certificate and check its key
///
/// # Errors
///
/// Returns `Configuration` when either file is unusable
pub async fn validate_pair(pair: &CertKeyPair) -> Result<CertSummary> {
    let summary = inspect(&pair.cert).await?;
    check_key(&pair.key).await?;
    if summary.expiry_days < 0 {
        tracing::warn!(
            cert = %pair.cert.display(),
            days = summary.expiry_days,
            "certificate has expired"
        );
    }
    Ok(summary)
}

/// Index of the certificate a server should present for `server_name`
///
/// Exact names win over wildcards; without SNI, or with no match, the
/// server falls back to its first certificate.
#[must_use]
pub fn select_for_sni(bundle: &[CertSummary], server_name: Option<&str>) -> Option<usize> {
    if bundle.is_empty() {
        return None;
    }
    let Some(name) = server_name else {
        return Some(0);
    };
    bundle
        .iter()
        .position(|cert| cert.matches_exact(name))
        .or_else(|| bundle.iter().position(|cert| cert.matches_wildcard(name)))
        .or(Some(0))
}
