//! Cross-process orchestration: backend up, test runner, backend down
//!
//! A run walks `Starting -> Ready -> RunningTests -> ShuttingDown -> Done`.
//! Any failure before the tests finish jumps straight to `ShuttingDown`, so
//! the backend is stopped on every path out of [`Orchestrator::run`].

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use perkharness_common::env::{HarnessEnv, TEST_BASE_URL};

use crate::error::{E2eError, E2eResult};
use crate::server::{ServerConfig, ServerHandle};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Starting,
    Ready,
    RunningTests,
    ShuttingDown,
    Done,
}

impl Phase {
    /// Whether `next` may follow `self`
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Starting, Ready)
                | (Starting, ShuttingDown)
                | (Ready, RunningTests)
                | (Ready, ShuttingDown)
                | (RunningTests, ShuttingDown)
                | (ShuttingDown, Done)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Ready => "ready",
            Phase::RunningTests => "running-tests",
            Phase::ShuttingDown => "shutting-down",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// The front-end test runner invocation
#[derive(Debug, Clone)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl TestCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            envs: Vec::new(),
        }
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn harness_env(mut self, env: &HarnessEnv) -> Self {
        self.envs
            .extend(env.vars().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    /// Run to completion with inherited stdio and `TEST_BASE_URL` set.
    /// Returns the exit code; termination by signal counts as 1.
    pub async fn run(&self, api_base_url: &str) -> E2eResult<i32> {
        info!("Running tests: {} {}", self.program, self.args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(TEST_BASE_URL, api_base_url)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::TestRunnerSpawn(format!("{}: {}", self.program, e)))?;

        let status = child.wait().await?;
        match status.code() {
            Some(code) => Ok(code),
            None => {
                warn!("Test runner terminated without an exit code ({})", status);
                Ok(1)
            }
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The test runner's exit code
    pub exit_code: i32,
    pub api_base_url: String,
    pub readiness_attempts: u32,
    /// Every phase the run went through, in order
    pub phases: Vec<Phase>,
    pub duration: Duration,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Backend lifecycle around one test-runner invocation
#[derive(Debug)]
pub struct Orchestrator {
    server: ServerConfig,
    tests: TestCommand,
    phase: Phase,
    phases: Vec<Phase>,
}

impl Orchestrator {
    pub fn new(server: ServerConfig, tests: TestCommand) -> Self {
        Self {
            server,
            tests,
            phase: Phase::Starting,
            phases: vec![Phase::Starting],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    fn advance(&mut self, next: Phase) {
        if !self.phase.can_advance_to(next) {
            error!("Refusing phase transition {} -> {}", self.phase, next);
            return;
        }
        debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        self.phases.push(next);
    }

    /// Start the backend, run the tests against it and stop it again. The
    /// backend is stopped whether readiness, the test runner or the tests
    /// themselves fail; errors are returned only after shutdown.
    pub async fn run(mut self) -> E2eResult<RunReport> {
        let started = Instant::now();

        let mut server = match ServerHandle::start(self.server.clone()) {
            Ok(server) => server,
            Err(e) => {
                self.advance(Phase::ShuttingDown);
                self.advance(Phase::Done);
                return Err(e);
            }
        };

        let outcome = self.drive(&mut server).await;

        self.advance(Phase::ShuttingDown);
        if let Err(e) = server.stop().await {
            warn!("Backend did not stop cleanly: {}", e);
        }
        self.advance(Phase::Done);

        let (readiness_attempts, exit_code) = outcome?;
        let report = RunReport {
            exit_code,
            api_base_url: server.api_base_url(),
            readiness_attempts,
            phases: self.phases,
            duration: started.elapsed(),
        };

        if report.success() {
            info!("Tests passed in {:?}", report.duration);
        } else {
            error!("Tests failed with exit code {}", report.exit_code);
        }
        Ok(report)
    }

    async fn drive(&mut self, server: &mut ServerHandle) -> E2eResult<(u32, i32)> {
        let attempts = server.wait_until_ready().await?;
        self.advance(Phase::Ready);

        self.advance(Phase::RunningTests);
        let exit_code = self.tests.run(&server.api_base_url()).await?;
        Ok((attempts, exit_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Phase::Starting, Phase::Ready, true)]
    #[test_case(Phase::Starting, Phase::ShuttingDown, true)]
    #[test_case(Phase::Starting, Phase::RunningTests, false)]
    #[test_case(Phase::Ready, Phase::RunningTests, true)]
    #[test_case(Phase::RunningTests, Phase::Ready, false)]
    #[test_case(Phase::RunningTests, Phase::Done, false)]
    #[test_case(Phase::ShuttingDown, Phase::Done, true)]
    #[test_case(Phase::Done, Phase::Starting, false)]
    fn test_transitions(from: Phase, to: Phase, allowed: bool) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[test]
    fn test_invalid_transition_is_refused() {
        let mut orchestrator = Orchestrator::new(ServerConfig::default(), TestCommand::new("true"));
        orchestrator.advance(Phase::Done);
        assert_eq!(orchestrator.phase(), Phase::Starting);
        assert_eq!(orchestrator.phases(), [Phase::Starting]);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::RunningTests.to_string(), "running-tests");
        assert_eq!(Phase::ShuttingDown.to_string(), "shutting-down");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_exit_code_and_base_url() {
        let cmd = TestCommand::new("sh").args([
            "-c",
            "[ \"$TEST_BASE_URL\" = http://127.0.0.1:1/api ] && exit 7; exit 1",
        ]);
        assert_eq!(cmd.run("http://127.0.0.1:1/api").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_runner_spawn_failure() {
        let err = TestCommand::new("/nonexistent/test-runner")
            .run("http://127.0.0.1:1/api")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::TestRunnerSpawn(_)));
    }
}
