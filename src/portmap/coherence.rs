//! Coherence check and compensation
//!
//! A gateway may grant a mapping on different terms than requested. Such a
//! mapping is released again with a delete request for exactly what was
//! granted, and the caller gets the mismatch error.

use super::error::{CoherenceError, MapPortError};
use super::types::{Request, Response};
use super::{MapContext, Mapper};
use tracing::{debug, error};

/// Verify that `res` honours the terms of `req`
///
/// Only the gateway port is checked: protocol and node port are chosen by
/// the caller and echoed back by the tool.
pub fn check_coherence(req: &Request, res: &Response) -> Result<(), CoherenceError> {
    if res.gateway_port != req.gateway_port {
        return Err(CoherenceError::GatewayPortMismatch {
            requested: req.gateway_port,
            mapped: res.gateway_port,
        });
    }
    Ok(())
}

/// Map a port and unwind the mapping if it was granted on other terms
///
/// On mismatch a delete for the granted protocol, node port and gateway
/// port is sent through the same mapper. A failing delete is logged and
/// attached to the returned error but never replaces the mismatch.
pub async fn map_port<M: Mapper>(
    mapper: &M,
    ctx: &MapContext,
    req: &Request,
) -> Result<Response, MapPortError> {
    debug!(?req, "mapping port");

    let res = match mapper.map(ctx, req).await {
        Ok(res) => res,
        Err(e) => {
            error!(?req, "unable to map the port: {}", e);
            return Err(e.into());
        }
    };

    if let Err(mismatch) = check_coherence(req, &res) {
        error!(?req, ?res, "the response was not coherent to the request: {}", mismatch);

        let cancel_req = res.delete_request();
        let compensation = match mapper.map(ctx, &cancel_req).await {
            Ok(cancel_res) => {
                debug!(?cancel_req, ?cancel_res, "incoherent port map cancelled");
                None
            }
            Err(e) => {
                error!(
                    ?req,
                    ?res,
                    ?cancel_req,
                    "failed to cancel incoherent port map: {}",
                    e
                );
                Some(e)
            }
        };

        return Err(MapPortError::Incoherent {
            source: mismatch,
            compensation,
        });
    }

    Ok(res)
}
