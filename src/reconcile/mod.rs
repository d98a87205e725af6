//! Boundary for the reconciliation layer
//!
//! Whatever discovers the ports to expose calls in here once per pass:
//! decode the per-port overrides, plan one request per port, map them
//! through a [`Mapper`](crate::portmap::Mapper), publish the deduplicated
//! external addresses and come back before the shortest mapping expires.

pub mod overrides;
pub mod plan;

pub use overrides::{Override, Overrides, OverridesError, PortDescriptor, OVERRIDES_V1_KEY};
pub use plan::{map_ports, plan_requests, requeue_after, MapOutcome, ServicePort};
