//! pcp-portmap command-line front end
//!
//! Maps or deletes one port through the configured PCP client and prints
//! the granted mapping as JSON.

use anyhow::{Context, Result, anyhow, bail};
use pcp_portmap::config::Settings;
use pcp_portmap::pcp;
use pcp_portmap::portmap::{Lifetime, MapContext, Mapper, Port, Protocol, Request, map_port};
use tokio_util::sync::CancellationToken;
use tracing::info;

const USAGE: &str = "\
usage: pcp-portmap <settings.json> map <tcp|udp|sctp> <node-port> <gateway-port> [lifetime]
       pcp-portmap <settings.json> delete <tcp|udp|sctp> <node-port> <gateway-port>";

#[tokio::main]
async fn main() -> Result<()> {
    pcp_portmap::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 5 {
        bail!("{}", USAGE);
    }

    let settings = Settings::load(&args[0])?;
    let req = parse_request(&args[1..], &settings)?;

    let (mapper, worker) = pcp::new(settings.command());
    let stop = CancellationToken::new();
    let task = worker.spawn(stop.clone());

    let ctx = MapContext::background().with_timeout(settings.map_timeout());
    let result = if req.is_delete() {
        // A delete has no terms to check.
        mapper.map(&ctx, &req).await.map_err(anyhow::Error::from)
    } else {
        map_port(&mapper, &ctx, &req).await.map_err(anyhow::Error::from)
    };

    stop.cancel();
    task.await.context("PCP worker panicked")?;

    let res = result.with_context(|| format!("Failed to map {:?}", req))?;
    info!("Mapped {}:{} -> {}", res.gateway_ip, res.gateway_port, res.node_port);
    println!("{}", serde_json::to_string_pretty(&res)?);

    Ok(())
}

fn parse_request(args: &[String], settings: &Settings) -> Result<Request> {
    let protocol = Protocol::from_name(&args[1])
        .ok_or_else(|| anyhow!("unknown protocol {:?}", args[1]))?;
    let node_port: u16 = args[2]
        .parse()
        .with_context(|| format!("invalid node port {:?}", args[2]))?;
    let gateway_port: u16 = args[3]
        .parse()
        .with_context(|| format!("invalid gateway port {:?}", args[3]))?;

    let lifetime = match args[0].as_str() {
        "map" => match args.get(4) {
            Some(secs) => Lifetime(
                secs.parse()
                    .with_context(|| format!("invalid lifetime {:?}", secs))?,
            ),
            None => settings.default_lifetime(),
        },
        "delete" => Lifetime::DELETE,
        other => bail!("unknown action {:?}\n{}", other, USAGE),
    };

    Ok(Request {
        protocol,
        node_port: Port(node_port),
        gateway_port: Port(gateway_port),
        lifetime,
    })
}
