//! Invocation of the PCP command-line client

use super::clock::{Clock, SystemClock};
use super::parse::parse_output;
use crate::portmap::{MapError, Request, Response};
use std::sync::Arc;
use tracing::{debug, info};

/// How to run the PCP client
#[derive(Debug, Clone)]
pub struct Command {
    /// Program to execute
    pub command_name: String,

    /// Arguments placed before the generated flags
    pub command_args: Vec<String>,

    /// PCP server to talk to
    ///
    /// If unset, the client attempts server autodiscovery, which may fail
    /// depending on the runtime environment.
    pub server_addr: Option<String>,

    clock: Arc<dyn Clock>,
}

impl Command {
    /// Run `command_name` against the given server
    pub fn new(command_name: impl Into<String>, server_addr: Option<String>) -> Self {
        Self {
            command_name: command_name.into(),
            command_args: Vec::new(),
            server_addr,
            clock: Arc::new(SystemClock),
        }
    }

    /// Prepend arguments to every invocation
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Use `clock` when computing remaining lifetimes
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Full argument list for `req`
    pub fn args(&self, req: &Request) -> Vec<String> {
        let mut args = self.command_args.clone();
        args.extend([
            "--protocol".to_string(),
            req.protocol.0.to_string(),
            "--internal".to_string(),
            format!(":{}", req.node_port),
            "--external".to_string(),
            format!(":{}", req.gateway_port),
            "--lifetime".to_string(),
            req.lifetime.0.to_string(),
        ]);

        if let Some(server) = self.server_addr.as_deref().filter(|s| !s.is_empty()) {
            args.push("--server".to_string());
            args.push(server.to_string());
        }

        args
    }

    /// Run the client for `req` and parse what it printed
    ///
    /// The process always runs to completion; callers that lose interest
    /// simply drop the result.
    pub async fn exec(&self, req: &Request) -> Result<Response, MapError> {
        let args = self.args(req);
        debug!("Running {} {}", self.command_name, args.join(" "));

        let output = tokio::process::Command::new(&self.command_name)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(MapError::Internal)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            info!("{} exited with {}", self.command_name, output.status);
            return Err(MapError::Cli {
                status: output.status,
                stderr,
            });
        }

        parse_output(&output.stdout, self.clock.as_ref())
    }
}
