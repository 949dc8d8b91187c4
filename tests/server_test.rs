//! Live tests of a plugged `HttpServer` on loopback listeners.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_plugger::contract::{ListenerScheme, Shared};
use api_plugger::http::{HttpServer, ServerError};
use api_plugger::option::{self, PlugOption};
use api_plugger::Plug;
use axum::http::Method;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

mod common;
use common::{greeting_api, tag, JSON};

type Serving = JoinHandle<Result<(), ServerError>>;

fn loopback(extra: Vec<PlugOption>) -> Vec<PlugOption> {
    let mut options = vec![
        option::with_api_defaults(),
        option::with_server_defaults(),
        option::with_host("127.0.0.1"),
        option::with_port(0),
        option::with_graceful_timeout(Duration::from_secs(1)),
    ];
    options.extend(extra);
    options
}

/// Start serving in the background and wait for the plain listener address.
async fn start(plug: Plug<HttpServer>) -> (Arc<Plug<HttpServer>>, Serving, SocketAddr) {
    let plug = Arc::new(plug);
    let serving = tokio::spawn({
        let plug = plug.clone();
        async move { plug.serve().await }
    });

    for _ in 0..100 {
        let bound = plug.server().local_addrs();
        if let Some((_, addr)) = bound.iter().find(|(scheme, _)| *scheme == ListenerScheme::Http) {
            let addr = *addr;
            common::wait_for_port(&addr.to_string()).await;
            return (plug, serving, addr);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never bound a listener");
}

async fn stop(plug: &Plug<HttpServer>, serving: Serving) {
    plug.shutdown().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), serving)
        .await
        .expect("serve did not return after shutdown")
        .unwrap();
    assert!(result.is_ok(), "serve failed: {result:?}");
}

#[tokio::test]
async fn test_serves_greeting_as_json() {
    let plug = Plug::new(HttpServer::new(), Shared::new(greeting_api()), loopback(vec![])).unwrap();
    let (plug, serving, addr) = start(plug).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{addr}/greeting/ann"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["content-type"], JSON);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["greeting"], "hello ann");

    let missing = client
        .get(format!("http://{addr}/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    drop(client);
    stop(&plug, serving).await;
}

#[tokio::test]
async fn test_middleware_set_after_construction_applies() {
    let mut plug = Plug::new(HttpServer::new(), Shared::new(greeting_api()), loopback(vec![])).unwrap();
    plug.set_middleware("/greeting/{name}", tag("outer"), &[Method::GET])
        .set_middleware("/greeting/{name}", tag("inner"), &[Method::GET]);
    let (plug, serving, addr) = start(plug).await;

    let client = reqwest::Client::new();
    let greeting = client
        .get(format!("http://{addr}/greeting/bo"))
        .send()
        .await
        .unwrap();
    let tags: Vec<_> = greeting
        .headers()
        .get_all("x-tag")
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    // the inner middleware sees the response first
    assert_eq!(tags, vec!["inner", "outer"]);

    let raw = client.get(format!("http://{addr}/raw")).send().await.unwrap();
    assert!(raw.headers().get("x-tag").is_none());

    drop(client);
    stop(&plug, serving).await;
}

#[tokio::test]
async fn test_accept_header_selects_byte_stream() {
    let plug = Plug::new(HttpServer::new(), Shared::new(greeting_api()), loopback(vec![])).unwrap();
    let (plug, serving, addr) = start(plug).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{addr}/raw"))
        .header("accept", "application/octet-stream")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/octet-stream");
    assert_eq!(response.text().await.unwrap(), "raw bytes");

    drop(client);
    stop(&plug, serving).await;
}

#[tokio::test]
async fn test_write_timeout_cuts_slow_operations() {
    let plug = Plug::new(
        HttpServer::new(),
        Shared::new(greeting_api()),
        loopback(vec![option::with_write_timeout(Duration::from_millis(200))]),
    )
    .unwrap();
    let (plug, serving, addr) = start(plug).await;

    let client = reqwest::Client::new();
    let response = client.get(format!("http://{addr}/slow")).send().await.unwrap();
    assert_eq!(response.status(), 408);

    drop(client);
    stop(&plug, serving).await;
}

#[tokio::test]
async fn test_shutdown_runs_hooks_in_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let pre = calls.clone();
    let post = calls.clone();
    let plug = Plug::new(
        HttpServer::new(),
        Shared::new(greeting_api()),
        loopback(vec![
            option::with_pre_server_shutdown(move || pre.lock().push("pre")),
            option::with_server_shutdown(move || post.lock().push("post")),
        ]),
    )
    .unwrap();
    let (plug, serving, addr) = start(plug).await;

    stop(&plug, serving).await;
    assert_eq!(*calls.lock(), vec!["pre", "post"]);

    // the listener is gone
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_configured_api_serves_added_operation() {
    let server = HttpServer::new().with_configure(|api| {
        api.add_operation(api_plugger::api::Operation::new(
            "ping",
            Method::GET,
            "/ping",
            |_req| async move { api_plugger::api::Reply::ok("pong") },
        ));
        Ok(())
    });
    let plug = Plug::new(
        server,
        Shared::new(greeting_api()),
        loopback(vec![option::with_configured_api()]),
    )
    .unwrap();
    let (plug, serving, addr) = start(plug).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/ping"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, "pong");

    stop(&plug, serving).await;
}

#[tokio::test]
async fn test_config_file_drives_the_server() {
    let config = api_plugger::config::parse_config(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0
        graceful_timeout_secs = 1

        [api]
        default_produces = "application/json"
        "#,
    )
    .unwrap();
    let plug = Plug::new(HttpServer::new(), Shared::new(greeting_api()), config.options()).unwrap();
    let (plug, serving, addr) = start(plug).await;

    let response = reqwest::get(format!("http://{addr}/greeting/cy")).await.unwrap();
    assert_eq!(response.status(), 200);

    stop(&plug, serving).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_listener() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("plug.sock");
    let plug = Plug::new(
        HttpServer::new(),
        Shared::new(greeting_api()),
        loopback(vec![
            option::with_enabled_listeners([ListenerScheme::Http, ListenerScheme::Unix]),
            option::with_socket_path(&socket_path),
        ]),
    )
    .unwrap();
    let (plug, serving, _addr) = start(plug).await;

    let mut stream = None;
    for _ in 0..50 {
        if let Ok(connected) = tokio::net::UnixStream::connect(&socket_path).await {
            stream = Some(connected);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut stream = stream.expect("unix listener never came up");

    stream
        .write_all(b"GET /greeting/dee HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.contains("hello dee"));

    stop(&plug, serving).await;
}
