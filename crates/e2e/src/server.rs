//! Backend process management - spawning, health checking and stopping the
//! live backend the suite talks to

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use perkharness_common::env::{HarnessEnv, PORT};
use perkharness_common::{api_base_url, Poll, PollError, Probe};

use crate::error::{E2eError, E2eResult};

/// What to do with the backend's stdout/stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the harness's own streams
    Inherit,
    /// Re-emit each line through `tracing` under the `backend` target
    #[default]
    Forward,
    Discard,
}

/// Configuration for spawning a backend
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Executable to run
    pub program: PathBuf,

    pub args: Vec<String>,

    /// Working directory (None = inherit)
    pub working_dir: Option<PathBuf>,

    /// Port exported as `PORT` (0 = find a free port)
    pub port: u16,

    /// Extra environment on top of the inherited one
    pub envs: Vec<(String, String)>,

    /// Health polling budget
    pub readiness: Poll,

    pub output: OutputMode,

    /// How long to wait for a graceful exit after SIGTERM
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            port: 0,
            envs: Vec::new(),
            readiness: Poll::readiness(),
            output: OutputMode::default(),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Forward every resolved harness variable to the backend
    pub fn harness_env(mut self, env: &HarnessEnv) -> Self {
        self.envs
            .extend(env.vars().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn readiness(mut self, poll: Poll) -> Self {
        self.readiness = poll;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

impl Default for ServerConfig {
    /// The Node backend as laid out in the app repository
    fn default() -> Self {
        Self::new("node").arg("src/index.js").current_dir("server")
    }
}

/// Handle to a running backend process
pub struct ServerHandle {
    child: Child,
    origin: String,
    port: u16,
    readiness: Poll,
    shutdown_grace: Duration,
    forwarders: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Spawn the backend without waiting for it. Must be called from within
    /// a tokio runtime.
    pub fn start(config: ServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            0 => find_free_port()?,
            port => port,
        };
        let origin = format!("http://127.0.0.1:{}", port);

        info!("Spawning backend on port {}: {}", port, config.program.display());

        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .envs(config.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(PORT, port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        match config.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Forward => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.program.display(),
                e
            ))
        })?;

        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_lines(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_lines(stderr, "stderr"));
        }

        Ok(Self {
            child,
            origin,
            port,
            readiness: config.readiness,
            shutdown_grace: config.shutdown_grace,
            forwarders,
        })
    }

    /// Spawn the backend and wait until it answers its health check. The
    /// process is stopped again if it never becomes ready.
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let mut handle = Self::start(config)?;

        if let Err(e) = handle.wait_until_ready().await {
            if let Err(stop_err) = handle.stop().await {
                warn!("Backend did not stop cleanly: {}", stop_err);
            }
            return Err(e);
        }

        Ok(handle)
    }

    /// Poll `GET <api>/health` until it succeeds. Fails immediately with
    /// [`E2eError::PrematureExit`] if the process dies first, and with
    /// [`E2eError::ReadinessTimeout`] once the attempt budget is spent.
    /// Returns the number of attempts it took.
    pub async fn wait_until_ready(&mut self) -> E2eResult<u32> {
        let health_url = format!("{}/health", self.api_base_url());
        let client = health_client()?;
        let child = &mut self.child;

        let result = self
            .readiness
            .until(|attempt| {
                let exited = child.try_wait();
                let client = client.clone();
                let url = health_url.clone();
                async move {
                    match exited {
                        Ok(Some(status)) => {
                            return Probe::Abort(E2eError::PrematureExit {
                                status: status.to_string(),
                            })
                        }
                        Err(e) => return Probe::Abort(E2eError::Io(e)),
                        Ok(None) => {}
                    }
                    probe_health(&client, &url, attempt).await
                }
            })
            .await;

        let attempts = readiness_outcome(&health_url, result)?;
        info!("Backend is healthy at {} after {} attempt(s)", self.origin, attempts);
        Ok(attempts)
    }

    /// Origin such as `http://127.0.0.1:4100`
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Origin plus the API prefix
    pub fn api_base_url(&self) -> String {
        api_base_url(&self.origin)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status if the process has already terminated
    pub fn try_exit_status(&mut self) -> E2eResult<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Ask the backend to terminate and wait for it to exit. Escalates to
    /// SIGKILL after the grace period.
    pub async fn stop(&mut self) -> E2eResult<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            debug!("Backend already exited ({})", status);
            return Ok(status);
        }

        info!("Stopping backend (pid: {:?})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    warn!("SIGTERM to {} failed: {}", pid, e);
                }
            }
        }
        #[cfg(not(unix))]
        self.child.start_kill()?;

        let status = match timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    "Backend did not exit within {:?}; killing it",
                    self.shutdown_grace
                );
                self.child.kill().await?;
                self.child.wait().await?
            }
        };

        for forwarder in self.forwarders.drain(..) {
            let _ = timeout(Duration::from_secs(1), forwarder).await;
        }

        info!("Backend stopped ({})", status);
        Ok(status)
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("origin", &self.origin)
            .field("port", &self.port)
            .field("pid", &self.child.id())
            .finish()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            warn!("Backend handle dropped while running; killing pid {:?}", self.child.id());
            let _ = self.child.start_kill();
        }
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}

/// Poll a health endpoint of a backend this process does not own
pub async fn wait_for_health(url: &str, poll: Poll) -> E2eResult<u32> {
    let client = health_client()?;

    let result = poll
        .until(|attempt| {
            let client = client.clone();
            async move { probe_health(&client, url, attempt).await }
        })
        .await;

    readiness_outcome(url, result)
}

fn health_client() -> E2eResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?)
}

async fn probe_health(client: &reqwest::Client, url: &str, attempt: u32) -> Probe<u32, E2eError> {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => Probe::Ready(attempt),
        Ok(resp) => {
            warn!("Health check returned {}", resp.status());
            Probe::Pending(format!("health check returned {}", resp.status()))
        }
        Err(e) => {
            if attempt == 1 {
                info!("Waiting for backend to start...");
            }
            // Connection refused is expected while the backend is starting
            if !e.is_connect() {
                warn!("Health check error: {}", e);
            }
            Probe::Pending(e.to_string())
        }
    }
}

fn readiness_outcome(url: &str, result: Result<u32, PollError<E2eError>>) -> E2eResult<u32> {
    match result {
        Ok(attempts) => Ok(attempts),
        Err(PollError::Aborted(e)) => Err(e),
        Err(PollError::Exhausted { attempts, last }) => Err(E2eError::ReadinessTimeout {
            url: url.to_string(),
            attempts,
            last,
        }),
    }
}

fn forward_lines<R>(reader: R, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "backend", stream, "{}", line);
        }
    })
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
