use super::testdata;
use crate::pcp::Command;
use crate::portmap::{Lifetime, MapError, Port, Protocol, Request};
use std::net::{IpAddr, Ipv4Addr};
use tokio_test::assert_ok;

fn sample_request() -> Request {
    Request {
        protocol: Protocol::TCP,
        node_port: Port(32100),
        gateway_port: Port(80),
        lifetime: Lifetime(120),
    }
}

#[test]
fn test_args_without_server() {
    let cmd = Command::new("pcp", None);
    assert_eq!(
        cmd.args(&sample_request()),
        vec![
            "--protocol", "6", "--internal", ":32100", "--external", ":80", "--lifetime", "120",
        ]
    );
}

#[test]
fn test_args_with_server() {
    let cmd = Command::new("pcp", Some("127.0.0.1:5351".to_string()));
    let args = cmd.args(&sample_request());
    assert_eq!(&args[args.len() - 2..], &["--server", "127.0.0.1:5351"]);
}

#[test]
fn test_args_empty_server_is_autodiscovery() {
    let cmd = Command::new("pcp", Some(String::new()));
    assert!(!cmd.args(&sample_request()).contains(&"--server".to_string()));
}

#[test]
fn test_args_leading_args_and_delete() {
    let cmd = Command::new("sh", None).with_args(["script.sh"]);
    let req = Request::delete(Protocol::UDP, Port(53), Port(5353));
    assert_eq!(
        cmd.args(&req),
        vec![
            "script.sh", "--protocol", "17", "--internal", ":53", "--external", ":5353",
            "--lifetime", "0",
        ]
    );
}

#[tokio::test]
async fn test_exec_simulator() {
    let cmd = Command::new("sh", Some("127.0.0.1:5351".to_string()))
        .with_args([testdata("pcpsimulator.sh")]);

    let res = assert_ok!(cmd.exec(&sample_request()).await);
    assert_eq!(res.protocol, Protocol::TCP);
    assert_eq!(res.node_port, Port(32100));
    assert_eq!(res.gateway_port, Port(1024));
    assert_eq!(res.gateway_ip, IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
    assert!(
        (115..=120).contains(&res.lifetime.0),
        "lifetime {} not about 120",
        res.lifetime
    );
}

#[tokio::test]
async fn test_exec_fail_command() {
    let cmd = Command::new("sh", None).with_args([testdata("fail.sh")]);

    let err = cmd.exec(&sample_request()).await.unwrap_err();
    match &err {
        MapError::Cli { stderr, .. } => assert_eq!(stderr, "Important message\n"),
        other => panic!("expected a CLI failure, got {:?}", other),
    }
    assert_eq!(err.exit_code(), Some(1));
    assert!(err.to_string().starts_with("PCP CLI failed: "));
    assert!(err.to_string().ends_with(": Important message\n"));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_exec_timeout_banner() {
    let cmd = Command::new("sh", None).with_args([testdata("timeout.sh")]);
    let err = cmd.exec(&sample_request()).await.unwrap_err();
    assert!(matches!(err, MapError::NotDone), "got {:?}", err);
}

#[tokio::test]
async fn test_exec_missing_program() {
    let cmd = Command::new("/nonexistent/pcp-client", None);
    let err = cmd.exec(&sample_request()).await.unwrap_err();
    assert!(matches!(err, MapError::Internal(_)), "got {:?}", err);
    assert!(err.to_string().starts_with("internal PCP error: "));
}

#[tokio::test]
async fn test_exec_uses_injected_clock() {
    use crate::pcp::FixedClock;
    use chrono::{Local, TimeZone};
    use std::sync::Arc;

    let far_future = Local
        .with_ymd_and_hms(2100, 1, 1, 0, 0, 0)
        .earliest()
        .expect("Invalid local time");
    let cmd = Command::new("sh", None)
        .with_args([testdata("pcpsimulator.sh")])
        .with_clock(Arc::new(FixedClock(far_future)));

    let res = assert_ok!(cmd.exec(&sample_request()).await);
    assert_eq!(res.lifetime, Lifetime(0));
}
