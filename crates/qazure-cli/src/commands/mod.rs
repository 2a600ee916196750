//! `%azure.*` command implementations.
//!
//! A [`Session`] owns one [`AzureClient`] and runs command lines against it
//! in order. Client errors are already printed by the client's output
//! channel; a session only stops early on fatal configuration errors.
//!
//! While lines are read, Ctrl-C cancels the running command, or ends the
//! session when it arrives at the prompt.

pub mod common;
pub mod connect;
pub mod jobs;
pub mod submit;
pub mod target;
pub mod version;

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use console::style;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use qazure_client::{AzureClient, AzureClientError, AzureResult, MagicCommand, ProgramCatalog};
use qazure_hal::{EnvironmentKind, TokenCache};

use crate::config::Config;
use crate::terminal::ConsoleChannel;

/// Commands understood by a session, with a one-line description.
pub const COMMANDS: &[(&str, &str)] = &[
    ("%azure.connect", "Connect to a workspace, or list the targets of the current one"),
    ("%azure.target", "Set the active target, or show it"),
    ("%azure.target-capability", "Override the capability of the active target, or show it"),
    ("%azure.submit", "Submit an operation to the active target"),
    ("%azure.execute", "Submit an operation and wait for its result"),
    ("%azure.status", "Show the status of a job (default: the last one submitted)"),
    ("%azure.output", "Show the output of a completed job"),
    ("%azure.jobs", "List jobs, optionally filtered, newest first"),
    ("%azure.quotas", "List workspace quotas"),
    ("%lsmagic", "List available commands"),
];

/// What an interrupt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The running command was cancelled.
    Cancelled,
    /// No command was running; the session stops reading lines.
    Idle,
}

/// An interactive or scripted command session.
pub struct Session {
    pub(crate) client: AzureClient,
    pub(crate) config: Config,
    failures: usize,
    running: Arc<Mutex<Option<CancellationToken>>>,
    idle_interrupt: Arc<Notify>,
}

impl Session {
    /// Build a session from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = AzureClient::builder().output(ConsoleChannel);
        if let Some(ref env) = config.environment {
            builder = builder.environment(env.clone());
        }
        if config.environment_kind() != EnvironmentKind::Mock {
            builder = builder.token_cache(Arc::new(TokenCache::open(TokenCache::default_dir())));
        }
        if let Some(ref path) = config.catalog {
            let catalog = ProgramCatalog::from_file(path)
                .with_context(|| format!("Failed to load program catalog {}", path.display()))?;
            builder = builder.entry_points(Arc::new(catalog));
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            config,
            failures: 0,
            running: Arc::new(Mutex::new(None)),
            idle_interrupt: Arc::new(Notify::new()),
        })
    }

    /// Number of commands that failed so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Connect to the configured workspace.
    pub async fn connect_configured(&mut self) -> Result<()> {
        self.run_line("%azure.connect").await
    }

    /// Run every line of `reader`, prompting when attended.
    pub async fn run_lines<R: AsyncBufRead + Unpin>(&mut self, reader: R, prompt: bool) -> Result<()> {
        let listener = self.listen_for_interrupts();
        let result = self.read_lines(reader, prompt).await;
        listener.abort();
        result
    }

    async fn read_lines<R: AsyncBufRead + Unpin>(&mut self, reader: R, prompt: bool) -> Result<()> {
        let mut lines = reader.lines();
        loop {
            if prompt {
                print!("{} ", style("qazure>").cyan().bold());
                std::io::stdout().flush().ok();
            }
            let idle = Arc::clone(&self.idle_interrupt);
            let next = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                () = idle.notified() => {
                    debug!("interrupted at prompt");
                    if prompt {
                        println!();
                    }
                    None
                }
            };
            let Some(line) = next else {
                break;
            };
            self.run_line(&line).await?;
        }
        Ok(())
    }

    /// Route one interrupt to the running command, or to the prompt.
    pub fn interrupt(&self) -> Interrupt {
        route_interrupt(&self.running, &self.idle_interrupt)
    }

    fn listen_for_interrupts(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let idle = Arc::clone(&self.idle_interrupt);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                route_interrupt(&running, &idle);
            }
        })
    }

    /// Run one command line. Fails only on fatal errors.
    pub async fn run_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        let command = match MagicCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.report(&e.to_string());
                self.failures += 1;
                return Ok(());
            }
        };
        debug!(command = %command.name, "running command");

        let cancel = CancellationToken::new();
        self.set_running(Some(cancel.clone()));
        let result = self.dispatch(&command, &cancel).await;
        self.set_running(None);

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(_) => {
                self.failures += 1;
                Ok(())
            }
        }
    }

    async fn dispatch(&mut self, command: &MagicCommand, cancel: &CancellationToken) -> AzureResult<()> {
        match command.name.as_str() {
            "azure.connect" => connect::execute(self, &command.args, cancel).await,
            "azure.target" => target::execute(self, &command.args, cancel).await,
            "azure.target-capability" => target::execute_capability(self, &command.args),
            "azure.submit" => submit::execute_submit(self, &command.args, cancel).await,
            "azure.execute" => submit::execute_run(self, &command.args, cancel).await,
            "azure.status" => jobs::execute_status(self, &command.args, cancel).await,
            "azure.output" => jobs::execute_output(self, &command.args, cancel).await,
            "azure.jobs" => jobs::execute_list(self, &command.args, cancel).await,
            "azure.quotas" => jobs::execute_quotas(self, cancel).await,
            "lsmagic" | "help" => {
                common::print_commands();
                Ok(())
            }
            other => {
                self.report(&format!("Unknown command %{other}. Run %lsmagic to list commands."));
                self.failures += 1;
                Ok(())
            }
        }
    }

    fn set_running(&self, token: Option<CancellationToken>) {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Print an error raised before the client was reached.
    pub(crate) fn report(&self, message: &str) {
        eprintln!("{} {message}", style("Error:").red().bold());
    }

    /// Print and return an error raised before the client was reached.
    pub(crate) fn reject<T>(&self, error: AzureClientError) -> AzureResult<T> {
        self.report(&error.to_string());
        Err(error)
    }
}

fn route_interrupt(running: &Mutex<Option<CancellationToken>>, idle: &Notify) -> Interrupt {
    match running.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
        Some(token) => {
            token.cancel();
            Interrupt::Cancelled
        }
        None => {
            idle.notify_one();
            Interrupt::Idle
        }
    }
}
