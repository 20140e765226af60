//! Test support for the CLI suites: a static configuration loader, a fake
//! HTTP server and the BDD world.

mod fake_server;

use std::cell::RefCell;
use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use courier_config::Config;
use rstest::fixture;

use crate::{AppError, ConfigLoader, run_with_loader};

pub(super) use fake_server::{FakeServer, StallingServer};

/// A config loader that returns a fixed configuration for tests.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Test world holding the fake server and captured CLI output.
#[derive(Default)]
pub(super) struct TestWorld {
    pub config: Config,
    pub server: Option<FakeServer>,
    pub port: Option<u16>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<ExitCode>,
    pub requests: Vec<String>,
}

impl TestWorld {
    pub fn start_server(&mut self, reply: &str, connections: usize) {
        let server = FakeServer::replying(reply, connections);
        self.port = Some(server.port());
        self.server = Some(server);
    }

    pub fn use_unused_port(&mut self) {
        self.port = Some(fake_server::unused_port());
    }

    /// Runs the CLI against the world's port with `flags` before the
    /// positional arguments.
    pub fn request(&mut self, target: &str, flags: &str) -> Result<()> {
        let port = self.port.context("no server port chosen")?.to_string();
        let mut command = vec!["courier".to_owned()];
        command.extend(flags.split_whitespace().map(str::to_owned));
        command.extend(["127.0.0.1".to_owned(), port, target.to_owned()]);
        self.run(command);
        if let Some(server) = self.server.take() {
            self.requests = server.requests();
        }
        Ok(())
    }

    /// Runs the CLI with a whitespace-separated argument line.
    pub fn run_line(&mut self, line: &str) {
        let command = std::iter::once("courier".to_owned())
            .chain(line.split_whitespace().map(str::to_owned))
            .collect();
        self.run(command);
    }

    fn run(&mut self, command: Vec<String>) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let loader = StaticConfigLoader::new(self.config.clone());
        let exit = run_with_loader(
            command.into_iter().map(OsString::from),
            &mut stdout,
            &mut stderr,
            &loader,
        );
        self.exit_code = Some(exit);
        self.stdout = String::from_utf8_lossy(&stdout).into_owned();
        self.stderr = String::from_utf8_lossy(&stderr).into_owned();
    }

    pub fn assert_exit(&self, expected: ExitCode) -> Result<()> {
        let actual = self.exit_code.context("the CLI has not run")?;
        ensure!(
            actual == expected,
            "exit code {actual:?} != {expected:?}; stderr: {}",
            self.stderr
        );
        Ok(())
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
