//! Full harness run: backend up, tests, backend down

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use perkharness_common::EnvLoader;
use perkharness_e2e::{Orchestrator, OutputMode, RunReport, ServerConfig, TestCommand};

use crate::output::{self, OutputFormat, TableDisplay};

/// Jest invocation used when no test command follows `--`
const DEFAULT_TEST_COMMAND: [&str; 4] = [
    "node",
    "--experimental-vm-modules",
    "../node_modules/jest/bin/jest.js",
    "--runInBand",
];

#[derive(Args)]
pub struct RunArgs {
    /// Backend port (defaults to TEST_SERVER_PORT, then 4100)
    #[arg(long)]
    port: Option<u16>,

    /// Program that starts the backend
    #[arg(long, default_value = "node")]
    server_program: String,

    /// Arguments for the backend program
    #[arg(long = "server-arg", default_value = "src/index.js")]
    server_args: Vec<String>,

    /// Working directory of the backend
    #[arg(long, default_value = "server")]
    server_dir: PathBuf,

    /// Working directory of the test command
    #[arg(long, default_value = "client")]
    test_dir: PathBuf,

    /// Route backend output through the log instead of the terminal
    #[arg(short, long)]
    quiet: bool,

    /// Test command and its arguments
    #[arg(last = true)]
    test_command: Vec<String>,
}

#[derive(Serialize)]
struct RunSummary {
    api_base_url: String,
    readiness_attempts: u32,
    phases: Vec<String>,
    duration_ms: u128,
    exit_code: i32,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            api_base_url: report.api_base_url.clone(),
            readiness_attempts: report.readiness_attempts,
            phases: report.phases.iter().map(ToString::to_string).collect(),
            duration_ms: report.duration.as_millis(),
            exit_code: report.exit_code,
        }
    }
}

impl TableDisplay for RunSummary {
    fn headers() -> Vec<&'static str> {
        vec!["API", "Ready After", "Phases", "Duration", "Exit Code"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.api_base_url.clone(),
            format!("{} attempts", self.readiness_attempts),
            self.phases.join(" -> "),
            format!("{} ms", self.duration_ms),
            self.exit_code.to_string(),
        ]
    }
}

fn test_command(args: &RunArgs) -> TestCommand {
    match args.test_command.split_first() {
        Some((program, rest)) => TestCommand::new(program.as_str()).args(rest),
        None => TestCommand::new(DEFAULT_TEST_COMMAND[0]).args(DEFAULT_TEST_COMMAND[1..].iter().copied()),
    }
}

/// Returns the test runner's exit code
pub async fn execute(args: RunArgs, env_file: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let env = EnvLoader::new()
        .with_file(env_file)
        .load()
        .context("Failed to resolve the harness environment")?;

    let port = args.port.unwrap_or_else(|| env.server_port());
    let server = ServerConfig::new(&args.server_program)
        .args(&args.server_args)
        .current_dir(&args.server_dir)
        .port(port)
        .harness_env(&env)
        .output(if args.quiet {
            OutputMode::Forward
        } else {
            OutputMode::Inherit
        });

    let tests = test_command(&args)
        .current_dir(&args.test_dir)
        .harness_env(&env);

    let report = match Orchestrator::new(server, tests).run().await {
        Ok(report) => report,
        Err(e) => {
            output::print_error(&format!("Harness run failed: {}", e));
            return Ok(1);
        }
    };

    output::print_item(&RunSummary::from(&report), format);
    if report.success() {
        output::print_success("Integration tests passed");
    } else {
        output::print_error(&format!("Integration tests failed (exit code {})", report.exit_code));
    }

    Ok(report.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    use perkharness_e2e::Phase;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_defaults() {
        let args = Harness::parse_from(["perkharness"]).run;
        assert_eq!(args.server_program, "node");
        assert_eq!(args.server_args, vec!["src/index.js"]);
        assert_eq!(args.server_dir, PathBuf::from("server"));
        assert!(args.port.is_none());

        let cmd = test_command(&args);
        assert_eq!(cmd.program, "node");
        assert_eq!(cmd.args, &DEFAULT_TEST_COMMAND[1..]);
    }

    #[test]
    fn test_trailing_test_command() {
        let args = Harness::parse_from(["perkharness", "--port", "4200", "--", "npm", "test"]).run;
        assert_eq!(args.port, Some(4200));

        let cmd = test_command(&args);
        assert_eq!(cmd.program, "npm");
        assert_eq!(cmd.args, vec!["test"]);
    }

    #[test]
    fn test_summary_row() {
        let report = RunReport {
            exit_code: 0,
            api_base_url: "http://127.0.0.1:4100/api".into(),
            readiness_attempts: 2,
            phases: vec![Phase::Starting, Phase::Ready],
            duration: Duration::from_millis(1500),
        };

        let row = RunSummary::from(&report).row();
        assert_eq!(row[1], "2 attempts");
        assert_eq!(row[2], "starting -> ready");
        assert_eq!(row[3], "1500 ms");
    }
}
