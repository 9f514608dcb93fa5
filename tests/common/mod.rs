#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};
use tempfile::TempDir;
use tlsinterop::{
    endpoint::{CertKeyPair, Protocol, cipher::TLS_AES_128_GCM_SHA256},
    matrix::{CaseParams, ScenarioTuple, cases::CertTestCase},
    process::Timeouts,
    provider::{Provider, ProviderBinaries, ProviderKind},
    scenario::CaseContext,
};

pub const SNI: &str = "www.example.com";

/// Directory of shell scripts standing in for the provider binaries
///
/// Scripts share the directory, so they can leave marker files for each
/// other: the server touches `listening` before it announces readiness and
/// the client touches `client-started` when it runs.
pub struct FakeProviders {
    dir: TempDir,
}

impl FakeProviders {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn marker(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn client_started(&self) -> bool {
        self.marker("client-started").exists()
    }

    /// Write an executable `/bin/sh` script
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// s2nd that records its pid, announces readiness, waits for the client
    /// and then prints `lines`
    pub fn s2nd(&self, lines: &[&str]) -> PathBuf {
        let dir = self.path().display().to_string();
        let echoes: String = lines.iter().map(|l| format!("echo \"{l}\"\n")).collect();
        self.script(
            "s2nd",
            &format!(
                "echo $$ > {dir}/server.pid\n\
                 touch {dir}/listening\n\
                 echo \"Listening on $*\"\n\
                 i=0\n\
                 while [ ! -f {dir}/client-started ] && [ $i -lt 50 ]; do sleep 0.1; i=$((i+1)); done\n\
                 [ -f {dir}/client-started ] || exit 3\n\
                 {echoes}exit 0"
            ),
        )
    }

    /// s2nd that records its pid and runs `tail` after writing the pid
    pub fn s2nd_raw(&self, tail: &str) -> PathBuf {
        let dir = self.path().display().to_string();
        self.script("s2nd", &format!("echo $$ > {dir}/server.pid\n{tail}"))
    }

    /// openssl client that refuses to run before the server listens
    pub fn openssl(&self, lines: &[&str]) -> PathBuf {
        let dir = self.path().display().to_string();
        let echoes: String = lines.iter().map(|l| format!("echo \"{l}\"\n")).collect();
        self.script(
            "openssl",
            &format!(
                "touch {dir}/client-started\n\
                 [ -f {dir}/listening ] || exit 2\n\
                 echo CONNECTED\n\
                 {echoes}exit 0"
            ),
        )
    }

    pub fn server_pid(&self) -> Option<u32> {
        fs::read_to_string(self.marker("server.pid"))
            .ok()
            .and_then(|pid| pid.trim().parse().ok())
    }

    pub fn binaries(&self) -> ProviderBinaries {
        ProviderBinaries {
            s2nc: self.marker("s2nc"),
            s2nd: self.marker("s2nd"),
            openssl: self.marker("openssl"),
            gnutls_cli: self.marker("gnutls-cli"),
            gnutls_serv: self.marker("gnutls-serv"),
        }
    }
}

pub fn sni_case(client_sni: Option<&str>) -> CertTestCase {
    CertTestCase {
        name: None,
        client_sni: client_sni.map(str::to_string),
        client_ciphers: vec![TLS_AES_128_GCM_SHA256],
        server_certs: vec![CertKeyPair::new("alligator_cert.pem", "alligator_key.pem")],
    }
}

/// openssl client against an s2n server
pub fn sni_tuple(binaries: &ProviderBinaries, protocol: Protocol, case: CertTestCase) -> ScenarioTuple {
    ScenarioTuple {
        provider: Provider::new(ProviderKind::OpenSsl, binaries),
        other_provider: Provider::new(ProviderKind::S2n, binaries),
        protocol,
        params: CaseParams::Sni(case),
    }
}

pub fn context(startup: Duration, run: Duration) -> CaseContext {
    CaseContext {
        timeouts: Timeouts {
            startup,
            run,
            drain: Duration::from_millis(500),
        },
        trust_store: None,
        inspect_certificates: false,
    }
}

pub fn process_alive(pid: u32) -> bool {
    fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
        stat.rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .is_some_and(|state| state != 'Z')
    })
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
