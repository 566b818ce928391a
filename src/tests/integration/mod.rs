//! End-to-end: a real listener, the crate's client, and the scenarios the
//! dispatcher must handle.

use crate::crypto::{self, HashAlgorithm};
use crate::rpc::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::utils::now;
use crate::{Abort, Api, ApiConfig, ClientError, Exchange, Request};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct EchoRequest {
    value: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct EchoResponse {
    value_is: i64,
}

async fn echo(mut ex: Exchange) -> Result<EchoResponse, Abort> {
    let req: EchoRequest = ex.bind().await?;
    Ok(EchoResponse { value_is: req.value })
}

async fn signed_echo(mut ex: Exchange) -> Result<EchoResponse, Abort> {
    let req: EchoRequest = ex.bind().await?;
    ex.authenticate("mykey", 3)?;
    Ok(EchoResponse { value_is: req.value })
}

async fn start() -> (SocketAddr, oneshot::Sender<()>) {
    let api = Api::new(ApiConfig::new(Some(HashAlgorithm::Sha256)))
        .bind("/api", echo)
        .bind("/signed", signed_echo)
        .bind("/panic", |_ex: Exchange| async move {
            if true {
                panic!("unrelated defect");
            }
            Ok::<_, Abort>(EchoResponse { value_is: 0 })
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(api.serve(listener, async move {
        let _ = rx.await;
    }));
    (addr, tx)
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

fn expect_application(err: ClientError, message: &str) {
    match err {
        ClientError::Application(m) => assert_eq!(m, message),
        other => panic!("expected application error {message:?}, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_call_without_signing() {
    let (addr, _stop) = start().await;
    let client = reqwest::Client::new();

    let rsp: EchoResponse = Request::get(&url(addr, "/api"), &EchoRequest { value: 123 })
        .unwrap()
        .send(&client)
        .await
        .unwrap();
    assert_eq!(rsp, EchoResponse { value_is: 123 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_raw_json_query_is_accepted() {
    let (addr, _stop) = start().await;
    let body = reqwest::get(format!("http://{addr}/api?{{\"value\":123}}"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"{"value_is":123}"#);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signed_write_call() {
    let (addr, _stop) = start().await;
    let mut req = Request::post(&url(addr, "/signed"), &EchoRequest { value: 123 }).unwrap();
    req.sign(HashAlgorithm::Sha256, "mykey", now());
    let rsp: EchoResponse = req.send(&reqwest::Client::new()).await.unwrap();
    assert_eq!(rsp.value_is, 123);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signed_read_call() {
    let (addr, _stop) = start().await;
    let mut req = Request::get(&url(addr, "/signed"), &EchoRequest { value: 42 }).unwrap();
    req.sign(HashAlgorithm::Sha256, "mykey", now());
    let rsp: EchoResponse = req.send(&reqwest::Client::new()).await.unwrap();
    assert_eq!(rsp.value_is, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_request_is_expired() {
    let (addr, _stop) = start().await;
    let mut req = Request::post(&url(addr, "/signed"), &EchoRequest { value: 123 }).unwrap();
    req.sign(HashAlgorithm::Sha256, "mykey", now() - 10);
    let err = req.send::<EchoResponse>(&reqwest::Client::new()).await.unwrap_err();
    expect_application(err, "Request expired");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_and_wrongly_signed_reports_expired() {
    let (addr, _stop) = start().await;
    let mut req = Request::post(&url(addr, "/signed"), &EchoRequest { value: 123 }).unwrap();
    req.sign(HashAlgorithm::Sha256, "wrongkey", now() - 10);
    let err = req.send::<EchoResponse>(&reqwest::Client::new()).await.unwrap_err();
    expect_application(err, "Request expired");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tampered_signature_is_unauthorized() {
    let (addr, _stop) = start().await;
    let body = r#"{"value":123}"#;
    let ts = now().to_string();
    let sig = crypto::sign(HashAlgorithm::Sha256, b"mykey", &ts, "/signed", body.as_bytes()).to_base64();
    let mut chars: Vec<char> = sig.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    let rsp = reqwest::Client::new()
        .post(url(addr, "/signed"))
        .header(TIMESTAMP_HEADER, ts)
        .header(SIGNATURE_HEADER, tampered)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rsp.text().await.unwrap(), r#"{"error":"Signature validate failed"}"#);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsigned_call_to_signed_path_is_rejected() {
    let (addr, _stop) = start().await;
    let err = Request::post(&url(addr, "/signed"), &EchoRequest { value: 1 })
        .unwrap()
        .send::<EchoResponse>(&reqwest::Client::new())
        .await
        .unwrap_err();
    expect_application(err, "HTTP header 't' not a number");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_key_sends_no_signature_headers() {
    let (addr, _stop) = start().await;
    let mut req = Request::post(&url(addr, "/signed"), &EchoRequest { value: 1 }).unwrap();
    req.sign(HashAlgorithm::Sha256, "", now());
    let err = req.send::<EchoResponse>(&reqwest::Client::new()).await.unwrap_err();
    expect_application(err, "HTTP header 't' not a number");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handler_panic_keeps_server_alive() {
    let (addr, _stop) = start().await;
    let client = reqwest::Client::new();

    let err = Request::get(&url(addr, "/panic"), &EchoRequest::default())
        .unwrap()
        .send::<EchoResponse>(&client)
        .await
        .unwrap_err();
    expect_application(err, "unknown");

    let rsp: EchoResponse = Request::post(&url(addr, "/api"), &EchoRequest { value: 5 })
        .unwrap()
        .send(&client)
        .await
        .unwrap();
    assert_eq!(rsp.value_is, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transport_failure_is_surfaced() {
    // bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let err = Request::get(&url(addr, "/api"), &EchoRequest::default())
        .unwrap()
        .send::<EchoResponse>(&reqwest::Client::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
