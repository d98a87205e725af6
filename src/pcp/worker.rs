//! Serialized PCP worker
//!
//! The PCP client is not safe to run concurrently against the same gateway,
//! so every request goes through one mailbox and one loop that runs the
//! client for a single request at a time, in arrival order.
//!
//! # Example
//!
//! ```no_run
//! use pcp_portmap::pcp::{self, Command};
//! use pcp_portmap::portmap::{Lifetime, MapContext, Mapper, Port, Protocol, Request};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (pcp, worker) = pcp::new(Command::new("pcp", None));
//! let stop = CancellationToken::new();
//! let task = worker.spawn(stop.clone());
//!
//! let req = Request {
//!     protocol: Protocol::TCP,
//!     node_port: Port(32100),
//!     gateway_port: Port(80),
//!     lifetime: Lifetime(120),
//! };
//! let res = pcp.map(&MapContext::background(), &req).await?;
//! println!("Mapped to {}:{}", res.gateway_ip, res.gateway_port);
//!
//! stop.cancel();
//! task.await?;
//! # Ok(())
//! # }
//! ```

use super::command::Command;
use crate::portmap::{MapContext, MapError, Mapper, Request, Response};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Requests waiting to be taken by the loop
const MAILBOX_CAPACITY: usize = 1;

type Reply = Result<Response, MapError>;

#[derive(Debug)]
struct Op {
    ctx: MapContext,
    request: Request,
    reply: oneshot::Sender<Reply>,
}

/// Handle for submitting requests to a [`PcpWorker`]
#[derive(Debug, Clone)]
pub struct Pcp {
    control: mpsc::Sender<Op>,
}

/// The loop that owns the PCP client
#[derive(Debug)]
pub struct PcpWorker {
    control: mpsc::Receiver<Op>,
    cmd: Command,
}

/// Create a connected handle and worker running `cmd`
pub fn new(cmd: Command) -> (Pcp, PcpWorker) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (Pcp { control: tx }, PcpWorker { control: rx, cmd })
}

impl PcpWorker {
    /// Service requests until `stop` is cancelled or every handle is gone
    ///
    /// Requests still queued when the loop ends are dropped, which their
    /// callers observe as [`MapError::WorkerStopped`].
    pub async fn run(mut self, stop: CancellationToken) {
        info!("PCP worker started ({})", self.cmd.command_name);

        loop {
            let op = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                op = self.control.recv() => match op {
                    Some(op) => op,
                    None => break,
                },
            };
            self.service(op).await;
        }

        self.control.close();
        info!("PCP worker stopped");
    }

    /// Run the worker loop on the tokio runtime
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }

    async fn service(&self, op: Op) {
        let res = self.cmd.exec(&op.request).await;

        // Nobody is waiting for this one anymore.
        if op.ctx.is_done() || op.reply.is_closed() {
            debug!(request = ?op.request, "Discarding reply for abandoned request");
            return;
        }

        match &res {
            Ok(mapped) => debug!(request = ?op.request, response = ?mapped, "PCP request done"),
            Err(e) => debug!(request = ?op.request, "PCP request failed: {}", e),
        }

        let _ = op.reply.send(res);
    }
}

impl Mapper for Pcp {
    async fn map(&self, ctx: &MapContext, req: &Request) -> Result<Response, MapError> {
        if let Some(e) = ctx.error() {
            return Err(e);
        }

        let (tx, rx) = oneshot::channel();
        let op = Op {
            ctx: ctx.clone(),
            request: *req,
            reply: tx,
        };

        tokio::select! {
            e = ctx.done_error() => return Err(e),
            sent = self.control.send(op) => sent.map_err(|_| MapError::WorkerStopped)?,
        }

        tokio::select! {
            e = ctx.done_error() => Err(e),
            reply = rx => match reply {
                Ok(res) => res,
                Err(_) => Err(MapError::WorkerStopped),
            },
        }
    }
}
