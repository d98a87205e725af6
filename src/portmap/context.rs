//! Caller-side cancellation and deadlines for mapping requests

use super::error::MapError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope of a mapping request
///
/// A context is done once its token is cancelled or its deadline has
/// passed. Derived contexts are cancelled together with their parent but
/// never cancel it.
#[derive(Debug, Clone)]
pub struct MapContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl MapContext {
    /// A context that is never done unless cancelled
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context driven by an existing token
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context that can be cancelled on its own
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child context that is done after `timeout`
    ///
    /// The earlier of the parent's deadline and the new one wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(parent) if parent < deadline => parent,
                _ => deadline,
            }),
        }
    }

    /// Cancel this context and all contexts derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context is cancelled or past its deadline
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The error describing why the context is done, `None` while it is live
    pub fn error(&self) -> Option<MapError> {
        if self.token.is_cancelled() {
            Some(MapError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(MapError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Wait until the context is done
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Wait until the context is done and return its error
    pub(crate) async fn done_error(&self) -> MapError {
        self.done().await;
        self.error().unwrap_or(MapError::Cancelled)
    }
}

impl Default for MapContext {
    fn default() -> Self {
        Self::background()
    }
}
