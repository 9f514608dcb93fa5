//! Scoped lifecycle of one endpoint subprocess
//!
//! A [`ManagedProcess`] walks `Created -> Starting -> Listening (servers) ->
//! Running -> {Completed, TimedOut, Crashed}`. A client can only be started
//! with the [`Listening`] witness returned by its server's
//! [`ManagedProcess::wait_until_listening`], so the server-before-client
//! ordering cannot race.
//!
//! Children are spawned with kill-on-drop and `Drop` kills anything still
//! running, so no endpoint outlives the scope that created it.

pub mod output;

use crate::{
    endpoint::Role,
    error::{CapturedOutput, HarnessError, Result},
    metrics::{
        PROCESS_DURATION, PROCESS_OUTCOMES, PROCESSES_ACTIVE, PROCESSES_STARTED, STARTUP_DURATION,
    },
    provider::{Invocation, Readiness},
    results::{ProcessResult, ResultStream, Status},
};
use output::{Markers, SharedBuffer, Signals, spawn_reader};
use std::{process::ExitStatus, process::Stdio, sync::Arc, time::Duration};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    process::{Child, Command},
    sync::watch,
    task::JoinHandle,
    time::{self, Instant},
};

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time budgets for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long a server may take to signal readiness
    pub startup: Duration,
    /// Overall budget from launch to exit
    pub run: Duration,
    /// How long to wait for output readers once the process is gone
    pub drain: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            startup: Duration::from_secs(2),
            run: Duration::from_secs(5),
            drain: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Starting,
    Listening,
    Running,
    Completed,
    TimedOut,
    Crashed,
}

impl ProcessState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Crashed)
    }
}

/// Proof that a server reached `Listening`
///
/// Only [`ManagedProcess::wait_until_listening`] can create one.
#[derive(Debug)]
pub struct Listening {
    endpoint: String,
}

impl Listening {
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

enum Startup {
    Ready,
    Closed,
    Exited(Option<ExitStatus>),
    Elapsed,
}

enum Termination {
    Exited(std::io::Result<ExitStatus>),
    KillMarker,
    Elapsed,
}

pub struct ManagedProcess {
    endpoint: String,
    role: Role,
    invocation: Invocation,
    timeouts: Timeouts,
    state: ProcessState,
    child: Option<Child>,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    tasks: Vec<JoinHandle<()>>,
    signals: Option<watch::Receiver<Signals>>,
    started_at: Option<Instant>,
    exit: Option<ExitStatus>,
    results_taken: bool,
    active: bool,
}

impl ManagedProcess {
    pub fn new(
        endpoint: impl Into<String>,
        role: Role,
        invocation: Invocation,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            role,
            invocation,
            timeouts,
            state: ProcessState::Created,
            child: None,
            stdout: SharedBuffer::default(),
            stderr: SharedBuffer::default(),
            tasks: Vec::new(),
            signals: None,
            started_at: None,
            exit: None,
            results_taken: false,
            active: false,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Launch a server endpoint
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if this is not a fresh server, or `Launch` if
    /// the OS refuses to start it
    pub fn start_server(&mut self) -> Result<()> {
        if self.role != Role::Server {
            return Err(HarnessError::configuration(format!(
                "{} is not a server endpoint",
                self.endpoint
            )));
        }
        self.spawn()
    }

    /// Launch a client endpoint once its server is listening
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if this is not a fresh client, or `Launch` if
    /// the OS refuses to start it
    pub fn start_client(&mut self, server: &Listening) -> Result<()> {
        if self.role != Role::Client {
            return Err(HarnessError::configuration(format!(
                "{} is not a client endpoint",
                self.endpoint
            )));
        }
        tracing::debug!(client = %self.endpoint, server = %server.endpoint(), "server listening, starting client");
        self.spawn()?;
        self.state = ProcessState::Running;
        Ok(())
    }

    fn spawn(&mut self) -> Result<()> {
        if self.state != ProcessState::Created {
            return Err(HarnessError::configuration(format!(
                "{} was already started ({:?})",
                self.endpoint, self.state
            )));
        }
        self.state = ProcessState::Starting;

        let mut command = Command::new(&self.invocation.program);
        command
            .args(&self.invocation.args)
            .envs(self.invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if self.invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = ProcessState::Crashed;
                return Err(HarnessError::Launch {
                    endpoint: self.endpoint.clone(),
                    program: self.invocation.program.display().to_string(),
                    source,
                });
            }
        };

        self.started_at = Some(Instant::now());
        self.active = true;
        PROCESSES_ACTIVE.inc();
        PROCESSES_STARTED.with_label_values(&[self.endpoint.as_str()]).inc();

        tracing::debug!(
            endpoint = %self.endpoint,
            pid = ?child.id(),
            command = %self.invocation.command_line(),
            "launched"
        );

        let (tx, rx) = watch::channel(Signals::default());
        let tx = Arc::new(tx);
        self.signals = Some(rx);

        let ready = match &self.invocation.readiness {
            Readiness::OutputMarker(marker) => Some(marker.clone()),
            Readiness::None | Readiness::PortOpen { .. } => None,
        };

        if let Some(stdout) = child.stdout.take() {
            self.tasks.push(spawn_reader(
                self.endpoint.clone(),
                stdout,
                self.stdout.clone(),
                Markers {
                    ready,
                    kill: self.invocation.kill_marker.clone(),
                },
                Arc::clone(&tx),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            self.tasks.push(spawn_reader(
                self.endpoint.clone(),
                stderr,
                self.stderr.clone(),
                Markers::default(),
                tx,
            ));
        }
        if let (Some(mut stdin), Some(data)) = (child.stdin.take(), self.invocation.stdin.clone())
        {
            let endpoint = self.endpoint.clone();
            self.tasks.push(tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&data).await {
                    tracing::debug!(%endpoint, "failed to write stdin: {err}");
                }
                // dropping stdin closes the pipe
            }));
        }

        self.child = Some(child);
        Ok(())
    }

    /// Wait for a server's readiness signal, bounded by the startup timeout
    ///
    /// # Errors
    ///
    /// Returns `StartupTimeout` when the server neither signals readiness in
    /// time nor stays alive long enough to do so; the server is killed first.
    pub async fn wait_until_listening(&mut self) -> Result<Listening> {
        if self.role != Role::Server || self.state != ProcessState::Starting {
            return Err(HarnessError::configuration(format!(
                "{} cannot wait for readiness in state {:?}",
                self.endpoint, self.state
            )));
        }

        let startup = self.timeouts.startup;
        let deadline = Instant::now() + startup;
        let readiness = self.invocation.readiness.clone();
        let signals = self.signals.clone();

        let mut outcome = match self.child.as_mut() {
            Some(child) => {
                tokio::select! {
                    biased;
                    ready = readiness_reached(&readiness, signals) => if ready { Startup::Ready } else { Startup::Closed },
                    status = child.wait() => Startup::Exited(status.ok()),
                    () = time::sleep_until(deadline) => Startup::Elapsed,
                }
            }
            None => Startup::Exited(None),
        };

        // output closed without the marker: the process is on its way out
        if matches!(outcome, Startup::Closed)
            && let Some(child) = self.child.as_mut()
        {
            let status = time::timeout(self.timeouts.drain, child.wait()).await;
            outcome = Startup::Exited(status.ok().and_then(std::result::Result::ok));
        }

        if let Startup::Exited(status) = &outcome {
            self.exit = *status;
        }

        // a server may print its marker and exit before the readers catch up
        let ready = match outcome {
            Startup::Ready => true,
            Startup::Exited(_) => {
                self.drain_readers().await;
                self.signals.as_ref().is_some_and(|rx| rx.borrow().ready)
            }
            Startup::Closed | Startup::Elapsed => false,
        };

        if ready {
            self.state = ProcessState::Listening;
            if let Some(started) = self.started_at {
                STARTUP_DURATION
                    .with_label_values(&[self.endpoint.as_str()])
                    .observe(started.elapsed().as_secs_f64());
            }
            tracing::debug!(endpoint = %self.endpoint, "listening");
            return Ok(Listening {
                endpoint: self.endpoint.clone(),
            });
        }

        tracing::warn!(endpoint = %self.endpoint, ?startup, "server did not start listening");
        self.kill_and_reap().await;
        self.drain_readers().await;
        self.state = ProcessState::TimedOut;
        self.results_taken = true;
        self.record_outcome(Status::Timeout);
        self.release();

        Err(HarnessError::StartupTimeout {
            endpoint: self.endpoint.clone(),
            timeout: startup,
            exit_code: self.exit.and_then(|status| status.code()),
            output: self.captured(),
        })
    }

    /// Await termination and drain the endpoint's output
    ///
    /// The first call yields this run's results; any later call yields an
    /// empty stream. A process that outlives the run timeout is killed and
    /// reported as `Timeout`.
    pub async fn get_results(&mut self) -> ResultStream {
        if self.results_taken {
            return ResultStream::empty();
        }
        self.results_taken = true;

        let Some(started) = self.started_at else {
            return ResultStream::empty();
        };
        if self.state == ProcessState::Listening {
            self.state = ProcessState::Running;
        }

        let remaining = self.timeouts.run.saturating_sub(started.elapsed());
        let watch_kill = self.invocation.kill_marker.is_some();
        let signals = self.signals.clone();

        let termination = match (self.exit, self.child.as_mut()) {
            (Some(status), _) => Termination::Exited(Ok(status)),
            (None, Some(child)) => {
                tokio::select! {
                    biased;
                    status = child.wait() => Termination::Exited(status),
                    () = kill_marker_seen(signals, watch_kill) => Termination::KillMarker,
                    () = time::sleep(remaining) => Termination::Elapsed,
                }
            }
            (None, None) => Termination::Exited(Err(std::io::Error::other("process handle missing"))),
        };

        let status = match termination {
            Termination::Exited(Ok(exit)) => {
                self.exit = Some(exit);
                self.state = ProcessState::Completed;
                if exit.success() {
                    Status::Success
                } else {
                    Status::Failure
                }
            }
            Termination::Exited(Err(err)) => {
                tracing::error!(endpoint = %self.endpoint, "failed to wait for process: {err}");
                self.kill_and_reap().await;
                self.state = ProcessState::Crashed;
                Status::Failure
            }
            Termination::KillMarker => {
                self.kill_and_reap().await;
                self.state = ProcessState::Completed;
                Status::Success
            }
            Termination::Elapsed => {
                tracing::warn!(endpoint = %self.endpoint, timeout = ?self.timeouts.run, "run timeout, killing");
                self.kill_and_reap().await;
                self.state = ProcessState::TimedOut;
                Status::Timeout
            }
        };

        self.drain_readers().await;
        self.record_outcome(status);
        self.release();

        let duration = started.elapsed();
        PROCESS_DURATION
            .with_label_values(&[self.endpoint.as_str()])
            .observe(duration.as_secs_f64());

        let captured = self.captured();
        ResultStream::single(ProcessResult {
            endpoint: self.endpoint.clone(),
            status,
            // a kill marker or timeout terminates by signal, so no exit code
            exit_code: match status {
                Status::Timeout => None,
                _ => self.exit.and_then(|exit| exit.code()),
            },
            stdout: captured.stdout,
            stderr: captured.stderr,
            duration,
            timeout: self.timeouts.run,
        })
    }

    /// Kill the process if it is still running and release its handles
    pub async fn terminate(&mut self) {
        self.kill_and_reap().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if !self.state.is_terminal() && self.state != ProcessState::Created {
            self.state = ProcessState::Completed;
        }
        self.release();
    }

    fn captured(&self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.snapshot(),
            stderr: self.stderr.snapshot(),
        }
    }

    async fn kill_and_reap(&mut self) {
        if self.exit.is_some() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            if let Err(err) = child.kill().await {
                tracing::debug!(endpoint = %self.endpoint, "kill failed: {err}");
            }
            if let Ok(Some(status)) = child.try_wait() {
                self.exit = Some(status);
            }
        }
    }

    async fn drain_readers(&mut self) {
        for mut task in self.tasks.drain(..) {
            if time::timeout(self.timeouts.drain, &mut task).await.is_err() {
                tracing::debug!(endpoint = %self.endpoint, "output reader did not finish, aborting");
                task.abort();
            }
        }
    }

    fn record_outcome(&self, status: Status) {
        PROCESS_OUTCOMES
            .with_label_values(&[self.endpoint.as_str(), status.as_str()])
            .inc();
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            PROCESSES_ACTIVE.dec();
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.exit.is_none()
            && let Some(child) = self.child.as_mut()
            && matches!(child.try_wait(), Ok(None))
        {
            tracing::debug!(endpoint = %self.endpoint, "killing endpoint on scope exit");
            if let Err(err) = child.start_kill() {
                tracing::debug!(endpoint = %self.endpoint, "kill failed: {err}");
            }
        }
        for task in &self.tasks {
            task.abort();
        }
        self.release();
    }
}

async fn readiness_reached(readiness: &Readiness, signals: Option<watch::Receiver<Signals>>) -> bool {
    match readiness {
        Readiness::None => true,
        Readiness::OutputMarker(_) => match signals {
            Some(mut rx) => rx.wait_for(|s| s.ready).await.is_ok(),
            None => false,
        },
        Readiness::PortOpen { host, port } => loop {
            if TcpStream::connect((host.as_str(), *port)).await.is_ok() {
                return true;
            }
            time::sleep(PORT_POLL_INTERVAL).await;
        },
    }
}

async fn kill_marker_seen(signals: Option<watch::Receiver<Signals>>, enabled: bool) {
    if enabled
        && let Some(mut rx) = signals
        && rx.wait_for(|s| s.kill).await.is_ok()
    {
        return;
    }
    std::future::pending::<()>().await;
}
