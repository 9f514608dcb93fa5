//! End-to-end assembly of one case: options, launch order and assertions

use crate::{
    certs,
    endpoint::{EndpointOptions, Protocol, Role},
    error::{HarnessError, Result},
    matrix::{CaseParams, ScenarioTuple},
    process::{ManagedProcess, Timeouts},
    provider::negotiated_protocol,
    results::ProcessResult,
};
use std::path::PathBuf;

/// Per-run settings every case shares
#[derive(Debug, Clone, Default)]
pub struct CaseContext {
    pub timeouts: Timeouts,
    /// CA bundle handed to verifying clients
    pub trust_store: Option<PathBuf>,
    /// Parse server certificates before launching anything
    pub inspect_certificates: bool,
}

/// Markers the case must find once both endpoints succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectations {
    pub protocol: Protocol,
    /// Server stdout
    pub version: String,
    /// Server stdout, when SNI is set and the server reports it
    pub server_name: Option<String>,
    /// Client stdout, when the client reports the negotiated cipher
    pub cipher: Option<String>,
}

/// What a passing case observed
#[derive(Debug, Clone)]
pub struct CaseEvidence {
    pub client: ProcessResult,
    pub server: ProcessResult,
    pub expected: Expectations,
    /// Subject of the certificate the SNI value selects
    pub expected_certificate: Option<String>,
}

/// Client and server options for a tuple
///
/// # Errors
///
/// Returns `Configuration` when the tuple cannot form valid endpoints
pub fn build_endpoints(
    tuple: &ScenarioTuple,
    port: u16,
    trust_store: Option<PathBuf>,
) -> Result<(EndpointOptions, EndpointOptions)> {
    let (client, server) = match &tuple.params {
        CaseParams::Sni(case) => {
            let server = EndpointOptions::server(port, tuple.protocol)
                .with_certificates(case.server_certs.clone());
            server.require_bundle()?;

            let client = EndpointOptions::client(port, tuple.protocol)
                .with_ciphers(case.client_ciphers.clone())
                .with_server_name(case.client_sni.clone());
            let client = if case.client_sni.is_some() {
                client.verifying(trust_store)
            } else {
                // nothing to verify the hostname against
                client.with_trust_store(trust_store)
            };
            (client, server)
        }
        CaseParams::Handshake {
            cipher,
            certificate,
        } => {
            // both sides pin, so a provider that cannot express the list
            // still negotiates the suite its peer insists on
            let server = EndpointOptions::server(port, tuple.protocol)
                .with_certificates(vec![certificate.pair()])
                .with_ciphers(vec![*cipher]);
            let client =
                EndpointOptions::client(port, tuple.protocol).with_ciphers(vec![*cipher]);
            (client, server)
        }
    };

    client.validate()?;
    server.validate()?;
    Ok((client, server))
}

/// Markers for a tuple, formatted by whichever side prints them
///
/// # Errors
///
/// Returns `Configuration` when the providers share no protocol at or below
/// the requested one
pub fn expectations(tuple: &ScenarioTuple) -> Result<Expectations> {
    let protocol = negotiated_protocol(&tuple.provider, &tuple.other_provider, tuple.protocol)
        .ok_or_else(|| {
            HarnessError::configuration(format!(
                "{} and {} share no protocol at or below {}",
                tuple.provider, tuple.other_provider, tuple.protocol
            ))
        })?;

    let (server_name, cipher) = match &tuple.params {
        CaseParams::Sni(case) => (
            case.client_sni
                .as_deref()
                .and_then(|sni| tuple.other_provider.server_name_marker(sni)),
            None,
        ),
        CaseParams::Handshake { cipher, .. } => {
            let pinned =
                tuple.provider.pins_ciphers() || tuple.other_provider.pins_ciphers();
            (None, pinned.then(|| tuple.provider.cipher_marker(cipher)).flatten())
        }
    };

    Ok(Expectations {
        protocol,
        version: tuple.other_provider.version_marker(protocol),
        server_name,
        cipher,
    })
}

/// Start the server, wait until it listens, then start the client and
/// drain both
///
/// The client is never launched when the server fails to start.
///
/// # Errors
///
/// Returns `StartupTimeout` or `Launch` from the server, or `Launch` from
/// the client
pub async fn run_pair(
    server: &mut ManagedProcess,
    client: &mut ManagedProcess,
) -> Result<(ProcessResult, ProcessResult)> {
    server.start_server()?;
    let listening = server.wait_until_listening().await?;

    if let Err(err) = client.start_client(&listening) {
        server.terminate().await;
        return Err(err);
    }

    let (mut client_results, mut server_results) =
        tokio::join!(client.get_results(), server.get_results());

    let missing = |endpoint: &str| {
        HarnessError::configuration(format!("{endpoint} produced no results"))
    };
    let client_result = client_results
        .next()
        .ok_or_else(|| missing(client.endpoint()))?;
    let server_result = server_results
        .next()
        .ok_or_else(|| missing(server.endpoint()))?;

    Ok((client_result, server_result))
}

/// Run one tuple on `port` and check everything it promises
///
/// # Errors
///
/// Returns the first failure: configuration, startup, process exit, run
/// timeout or a missing marker
pub async fn run_case(tuple: &ScenarioTuple, port: u16, ctx: &CaseContext) -> Result<CaseEvidence> {
    let (client_options, server_options) =
        build_endpoints(tuple, port, ctx.trust_store.clone())?;
    let expected = expectations(tuple)?;

    let expected_certificate = if ctx.inspect_certificates {
        expected_certificate(tuple, &server_options).await?
    } else {
        None
    };

    let server_invocation = tuple.other_provider.build_invocation(&server_options)?;
    let client_invocation = tuple.provider.build_invocation(&client_options)?;

    let mut server = ManagedProcess::new(
        tuple.other_provider.endpoint_label(Role::Server),
        Role::Server,
        server_invocation,
        ctx.timeouts,
    );
    let mut client = ManagedProcess::new(
        tuple.provider.endpoint_label(Role::Client),
        Role::Client,
        client_invocation,
        ctx.timeouts,
    );

    let outcome = run_pair(&mut server, &mut client).await;
    client.terminate().await;
    server.terminate().await;
    let (client_result, server_result) = outcome?;

    client_result.assert_success()?;
    server_result.assert_success()?;

    server_result.assert_stdout_contains(&expected.version)?;
    match (&expected.server_name, &tuple.params) {
        (Some(marker), _) => server_result.assert_stdout_contains(marker)?,
        (None, CaseParams::Sni(case)) if case.client_sni.is_some() => {
            tracing::debug!(
                server = %tuple.other_provider,
                "server does not report SNI, skipping server name check"
            );
        }
        _ => {}
    }
    match (&expected.cipher, &tuple.params) {
        (Some(marker), _) => client_result.assert_stdout_contains(marker)?,
        (None, CaseParams::Handshake { cipher, .. }) => {
            tracing::debug!(
                client = %tuple.provider,
                server = %tuple.other_provider,
                %cipher,
                "cipher not pinned by either side, skipping cipher check"
            );
        }
        _ => {}
    }

    Ok(CaseEvidence {
        client: client_result,
        server: server_result,
        expected,
        expected_certificate,
    })
}

async fn expected_certificate(
    tuple: &ScenarioTuple,
    server: &EndpointOptions,
) -> Result<Option<String>> {
    let mut bundle = Vec::with_capacity(server.certificates.len());
    for pair in &server.certificates {
        bundle.push(certs::validate_pair(pair).await?);
    }

    let sni = match &tuple.params {
        CaseParams::Sni(case) => case.client_sni.as_deref(),
        CaseParams::Handshake { .. } => None,
    };
    Ok(certs::select_for_sni(&bundle, sni)
        .and_then(|index| bundle.get(index))
        .map(|cert| cert.subject.clone()))
}
