use super::testdata;
use crate::mock::MockMapper;
use crate::pcp::{self, Command};
use crate::portmap::{
    check_coherence, map_port, CoherenceError, Lifetime, MapContext, MapError, MapPortError, Port,
    Protocol, Request, Response,
};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn request_80() -> Request {
    Request {
        protocol: Protocol::TCP,
        node_port: Port(32100),
        gateway_port: Port(80),
        lifetime: Lifetime(120),
    }
}

fn granted(gateway_port: u16) -> Response {
    Response {
        protocol: Protocol::TCP,
        node_port: Port(32100),
        gateway_port: Port(gateway_port),
        gateway_ip: IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
        lifetime: Lifetime(120),
    }
}

#[test]
fn test_check_coherence_same_port() {
    assert_eq!(check_coherence(&request_80(), &granted(80)), Ok(()));
}

#[test]
fn test_check_coherence_other_port() {
    assert_eq!(
        check_coherence(&request_80(), &granted(1024)),
        Err(CoherenceError::GatewayPortMismatch {
            requested: Port(80),
            mapped: Port(1024),
        })
    );
}

#[test]
fn test_check_coherence_ignores_address_and_lifetime() {
    let res = Response {
        gateway_ip: IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)),
        lifetime: Lifetime(30),
        ..granted(80)
    };
    assert!(check_coherence(&request_80(), &res).is_ok());
}

#[test]
fn test_mismatch_message() {
    let err = CoherenceError::GatewayPortMismatch {
        requested: Port(80),
        mapped: Port(1024),
    };
    assert_eq!(
        err.to_string(),
        "mapped gateway port (1024) is different from the requested port (80)"
    );
}

#[tokio::test]
async fn test_map_port_coherent() {
    let (mapper, mut control) = MockMapper::new();
    let ctx = MapContext::background();
    let req = request_80();

    let drive = async {
        control.expect(&req, STEP_TIMEOUT).await;
        control.inject(Ok(granted(80)), STEP_TIMEOUT).await;
    };
    let (res, ()) = tokio::join!(map_port(&mapper, &ctx, &req), drive);

    assert_eq!(res.expect("Failed to map"), granted(80));
}

#[tokio::test]
async fn test_map_port_mismatch_is_compensated() {
    let (mapper, mut control) = MockMapper::new();
    let ctx = MapContext::background();
    let req = request_80();

    let drive = async {
        control.expect(&req, STEP_TIMEOUT).await;
        control.inject(Ok(granted(1024)), STEP_TIMEOUT).await;

        let delete = Request {
            protocol: Protocol::TCP,
            node_port: Port(32100),
            gateway_port: Port(1024),
            lifetime: Lifetime::DELETE,
        };
        control.expect(&delete, STEP_TIMEOUT).await;
        control
            .inject(
                Ok(Response {
                    lifetime: Lifetime(0),
                    ..granted(1024)
                }),
                STEP_TIMEOUT,
            )
            .await;
    };
    let (res, ()) = tokio::join!(map_port(&mapper, &ctx, &req), drive);

    let err = res.unwrap_err();
    assert_eq!(
        err.coherence(),
        Some(&CoherenceError::GatewayPortMismatch {
            requested: Port(80),
            mapped: Port(1024),
        })
    );
    assert!(err.compensation_error().is_none());
}

#[tokio::test]
async fn test_failed_compensation_keeps_mismatch_error() {
    let (mapper, mut control) = MockMapper::new();
    let ctx = MapContext::background();
    let req = request_80();

    let drive = async {
        control.expect(&req, STEP_TIMEOUT).await;
        control.inject(Ok(granted(1024)), STEP_TIMEOUT).await;
        control
            .expect(&Request::delete(Protocol::TCP, Port(32100), Port(1024)), STEP_TIMEOUT)
            .await;
        control.inject(Err(MapError::NotDone), STEP_TIMEOUT).await;
    };
    let (res, ()) = tokio::join!(map_port(&mapper, &ctx, &req), drive);

    let err = res.unwrap_err();
    assert!(err.coherence().is_some(), "got {:?}", err);
    assert!(matches!(err.compensation_error(), Some(MapError::NotDone)));
    assert_eq!(
        err.to_string(),
        "mapped gateway port (1024) is different from the requested port (80)"
    );
}

#[tokio::test]
async fn test_map_error_is_not_compensated() {
    let (mapper, mut control) = MockMapper::new();
    let ctx = MapContext::background();
    let req = request_80();

    let drive = async {
        control.expect(&req, STEP_TIMEOUT).await;
        control
            .inject(
                Err(MapError::Failed {
                    code: 8,
                    status: "slerr".to_string(),
                }),
                STEP_TIMEOUT,
            )
            .await;
    };
    let (res, ()) = tokio::time::timeout(
        STEP_TIMEOUT,
        async { tokio::join!(map_port(&mapper, &ctx, &req), drive) },
    )
    .await
    .expect("map_port sent an unexpected request");

    assert!(
        matches!(res, Err(MapPortError::Map(MapError::Failed { code: 8, .. }))),
        "got {:?}",
        res
    );
}

#[tokio::test]
async fn test_mismatch_through_worker_deletes_granted_port() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let log = dir.path().join("calls.log");
    let cmd = Command::new("sh", None).with_args([
        testdata("pcpsimulator.sh"),
        log.display().to_string(),
    ]);
    let (pcp, worker) = pcp::new(cmd);
    let stop = CancellationToken::new();
    let task = worker.spawn(stop.clone());

    let res = map_port(&pcp, &MapContext::background(), &request_80()).await;

    stop.cancel();
    task.await.expect("Worker panicked");

    let err = res.unwrap_err();
    assert!(err.coherence().is_some(), "got {:?}", err);
    assert!(err.compensation_error().is_none(), "got {:?}", err);

    let log = std::fs::read_to_string(&log).expect("Failed to read log");
    let starts: Vec<&str> = log.lines().filter(|l| l.starts_with("start ")).collect();
    assert_eq!(
        starts,
        vec![
            "start --protocol 6 --internal :32100 --external :80 --lifetime 120",
            "start --protocol 6 --internal :32100 --external :1024 --lifetime 0",
        ]
    );
}
