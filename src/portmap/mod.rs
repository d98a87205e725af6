//! Port mapping model
//!
//! This module holds everything that does not depend on how a mapping is
//! obtained:
//! - Request and response types
//! - The [`Mapper`] seam implemented by the PCP worker and the mock
//! - Caller cancellation through [`MapContext`]
//! - The coherence check and compensating delete

pub mod coherence;
pub mod context;
pub mod error;
pub mod types;

use std::future::Future;

pub use coherence::{check_coherence, map_port};
pub use context::MapContext;
pub use error::{CoherenceError, MapError, MapPortError};
pub use types::{Lifetime, Port, Protocol, Request, Response};

/// Something that turns mapping requests into granted mappings
pub trait Mapper: Send + Sync {
    /// Apply `req`, giving up when `ctx` is done
    fn map(
        &self,
        ctx: &MapContext,
        req: &Request,
    ) -> impl Future<Output = Result<Response, MapError>> + Send;
}
