//! Channel-driven [`Mapper`] test double
//!
//! Every `map` call is handed to the [`MockControl`] side, which decides
//! what the call returns.

use crate::portmap::{MapContext, MapError, Mapper, Request, Response};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Address granted by [`MockControl::auto`]
pub const AUTO_GATEWAY_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 0, 0, 0));

/// A call observed by the mock
#[derive(Debug, Clone)]
pub struct RequestWrap {
    /// Caller context
    pub ctx: MapContext,
    /// Requested mapping
    pub request: Request,
}

type Reply = Result<Response, MapError>;

/// Mapper half of the mock
#[derive(Debug)]
pub struct MockMapper {
    requests: mpsc::Sender<RequestWrap>,
    replies: Mutex<mpsc::Receiver<Reply>>,
}

/// Control half of the mock
#[derive(Debug)]
pub struct MockControl {
    requests: mpsc::Receiver<RequestWrap>,
    replies: mpsc::Sender<Reply>,
}

impl MockMapper {
    /// Create a connected mapper and control
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MockMapper, MockControl) {
        let (req_tx, req_rx) = mpsc::channel(1);
        let (res_tx, res_rx) = mpsc::channel(1);
        (
            MockMapper {
                requests: req_tx,
                replies: Mutex::new(res_rx),
            },
            MockControl {
                requests: req_rx,
                replies: res_tx,
            },
        )
    }
}

impl Mapper for MockMapper {
    async fn map(&self, ctx: &MapContext, req: &Request) -> Result<Response, MapError> {
        // One call at a time so replies pair up with requests.
        let mut replies = self.replies.lock().await;

        self.requests
            .send(RequestWrap {
                ctx: ctx.clone(),
                request: *req,
            })
            .await
            .map_err(|_| MapError::WorkerStopped)?;

        replies.recv().await.unwrap_or(Err(MapError::WorkerStopped))
    }
}

impl MockControl {
    /// Wait for the next call and check that it asked for `req`
    ///
    /// # Panics
    ///
    /// Panics on timeout or when the request differs.
    pub async fn expect(&mut self, req: &Request, timeout: Duration) -> RequestWrap {
        match tokio::time::timeout(timeout, self.requests.recv()).await {
            Ok(Some(call)) => {
                assert_eq!(&call.request, req, "unexpected port map request");
                call
            }
            Ok(None) => panic!("mock mapper dropped while waiting for a request"),
            Err(_) => panic!("timeout while waiting for a request"),
        }
    }

    /// Hand `reply` to the pending call
    ///
    /// # Panics
    ///
    /// Panics on timeout or when the mapper is gone.
    pub async fn inject(&self, reply: Result<Response, MapError>, timeout: Duration) {
        match tokio::time::timeout(timeout, self.replies.send(reply)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => panic!("mock mapper dropped while injecting a response"),
            Err(_) => panic!("timeout while injecting response"),
        }
    }

    /// Grant every request as asked, at [`AUTO_GATEWAY_IP`], until the
    /// returned token is cancelled
    pub fn auto(mut self) -> CancellationToken {
        let stop = CancellationToken::new();
        let done = stop.clone();

        tokio::spawn(async move {
            loop {
                let call = tokio::select! {
                    _ = done.cancelled() => return,
                    call = self.requests.recv() => match call {
                        Some(call) => call,
                        None => return,
                    },
                };

                let req = call.request;
                let res = Response {
                    protocol: req.protocol,
                    node_port: req.node_port,
                    gateway_port: req.gateway_port,
                    gateway_ip: AUTO_GATEWAY_IP,
                    lifetime: req.lifetime,
                };
                if self.replies.send(Ok(res)).await.is_err() {
                    return;
                }
            }
        });

        stop
    }
}
