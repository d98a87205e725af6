//! Request planning and result aggregation for a reconciliation pass

use super::overrides::Overrides;
use crate::portmap::{
    map_port, Lifetime, MapContext, MapPortError, Mapper, Port, Protocol, Request, Response,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Renew this long before a mapping would expire
const RENEWAL_MARGIN_SECS: u32 = 2;

/// Never wait longer than this between passes
const MAX_REQUEUE_SECS: u32 = 12 * 60 * 60;

/// A port a service wants reachable from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    /// Protocol name (`TCP`, `UDP` or `SCTP`)
    pub protocol: String,
    /// Exposed port, requested as the gateway port
    pub port: u16,
    /// Port the nodes listen on
    pub node_port: u16,
}

/// Build one request per service port
///
/// Skipped ports produce no request; overridden ports request the override
/// as the gateway port.
pub fn plan_requests(
    ports: &[ServicePort],
    overrides: &Overrides,
    default_lifetime: Lifetime,
) -> Vec<Request> {
    let mut requests = Vec::with_capacity(ports.len());

    for service_port in ports {
        let protocol = Protocol::from_name(&service_port.protocol).unwrap_or_else(|| {
            warn!("Unexpected protocol {:?}", service_port.protocol);
            Protocol::ANY
        });

        let mut gateway_port = Port(service_port.port);
        if let Some(o) = overrides.get(protocol, gateway_port) {
            if o.skip {
                debug!("Skipping {}/{}", protocol, gateway_port);
                continue;
            }
            if o.port != 0 {
                gateway_port = Port(o.port);
            }
        }

        requests.push(Request {
            protocol,
            node_port: Port(service_port.node_port),
            gateway_port,
            lifetime: default_lifetime,
        });
    }

    requests
}

/// Results of one reconciliation pass, in request order
#[derive(Debug, Default)]
pub struct MapOutcome {
    /// Each request with what came of it
    pub results: Vec<(Request, Result<Response, MapPortError>)>,
}

impl MapOutcome {
    /// Granted mappings
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    /// Failed requests
    pub fn errors(&self) -> impl Iterator<Item = &MapPortError> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().err())
    }

    /// External addresses of the granted mappings, deduplicated in first-seen order
    pub fn external_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = Vec::new();
        for res in self.responses() {
            if !ips.contains(&res.gateway_ip) {
                ips.push(res.gateway_ip);
            }
        }
        ips
    }

    /// When to run the next pass, see [`requeue_after`]
    pub fn requeue_after(&self, default_lifetime: Lifetime) -> Duration {
        requeue_after(default_lifetime, self.responses())
    }
}

/// Map every request in turn, checking each grant
pub async fn map_ports<M: Mapper>(mapper: &M, ctx: &MapContext, requests: &[Request]) -> MapOutcome {
    debug!("Mapping {} port(s)", requests.len());

    let mut outcome = MapOutcome::default();
    for req in requests {
        let res = map_port(mapper, ctx, req).await;
        outcome.results.push((*req, res));
    }

    info!(
        "Port mapping procedure finished: {} mapped, {} failed",
        outcome.responses().count(),
        outcome.errors().count()
    );
    outcome
}

/// Delay before the next pass so that no mapping expires in between
///
/// Starts from the default lifetime, capped at 12 hours, and shrinks to the
/// shortest granted lifetime. Both keep a small renewal margin. Mappings
/// with nothing left are retried after one second.
pub fn requeue_after<'a>(
    default_lifetime: Lifetime,
    responses: impl IntoIterator<Item = &'a Response>,
) -> Duration {
    let mut secs = default_lifetime
        .0
        .saturating_sub(RENEWAL_MARGIN_SECS)
        .min(MAX_REQUEUE_SECS);

    for res in responses {
        secs = secs.min(res.lifetime.0.saturating_sub(RENEWAL_MARGIN_SECS));
    }

    Duration::from_secs(u64::from(secs.max(1)))
}
