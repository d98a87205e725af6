//! Error taxonomy for mapping operations

use super::types::Port;
use crate::pcp::ParseError;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors produced while servicing a single mapping request
#[derive(Debug, Error)]
pub enum MapError {
    /// The tool reported a timeout or a mapping still in progress
    #[error("port map didn't complete in time")]
    NotDone,

    /// The tool reported a non-zero result code
    #[error("port map failed (result code {code}, state {status:?})")]
    Failed {
        /// Result code from the tool
        code: u16,
        /// Result state token from the tool
        status: String,
    },

    /// No usable response line in the tool output
    #[error("unable to parse the response, no response lines found")]
    NotFound,

    /// Malformed tool output
    #[error("unable to parse response line: {0}")]
    Parse(#[from] ParseError),

    /// The tool exited with a non-zero status
    #[error("PCP CLI failed: {status}: {stderr}")]
    Cli {
        /// Exit status of the process
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },

    /// The tool could not be started or its output could not be read
    #[error("internal PCP error: {0}")]
    Internal(#[source] std::io::Error),

    /// The caller cancelled the request
    #[error("context cancelled")]
    Cancelled,

    /// The caller's deadline passed before a reply arrived
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The worker stopped before the request was serviced
    #[error("port map worker stopped")]
    WorkerStopped,
}

impl MapError {
    /// Exit code of a failed tool invocation, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Cli { status, .. } => status.code(),
            _ => None,
        }
    }

    /// Whether the failure stems from the tool output ending early
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Self::Parse(err) if err.is_end_of_input())
    }

    /// Whether the caller abandoned the request
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Whether a later attempt may succeed without fixing the tool
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::Parse(_))
    }
}

/// A granted mapping that differs from what was requested
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoherenceError {
    /// The gateway picked a different public port
    #[error("mapped gateway port ({mapped}) is different from the requested port ({requested})")]
    GatewayPortMismatch {
        /// Port in the request
        requested: Port,
        /// Port in the response
        mapped: Port,
    },
}

/// Outcome of a checked mapping attempt
#[derive(Debug, Error)]
pub enum MapPortError {
    /// The mapping itself failed
    #[error(transparent)]
    Map(#[from] MapError),

    /// The mapping was granted on unacceptable terms and was unwound
    #[error("{source}")]
    Incoherent {
        /// What differed
        #[source]
        source: CoherenceError,
        /// Failure of the compensating delete, if it failed
        compensation: Option<MapError>,
    },
}

impl MapPortError {
    /// The coherence error, if this is one
    pub fn coherence(&self) -> Option<&CoherenceError> {
        match self {
            Self::Incoherent { source, .. } => Some(source),
            Self::Map(_) => None,
        }
    }

    /// Failure of the compensating delete, if one was attempted and failed
    pub fn compensation_error(&self) -> Option<&MapError> {
        match self {
            Self::Incoherent { compensation, .. } => compensation.as_ref(),
            Self::Map(_) => None,
        }
    }
}
