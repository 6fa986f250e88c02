//! A component served over a real TCP connection.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rcomp::component::{ActionOutcome, ComponentConfig, RequestHandler, ResultFormat};
use rcomp::context::{ComponentIdentity, RequestContext};
use rcomp::server::Server;

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    String::from_utf8(reply).unwrap()
}

fn split(reply: &str) -> (&str, &str) {
    reply.split_once("\r\n\r\n").unwrap()
}

#[tokio::test]
async fn serves_json_component_over_tcp() {
    let widget = RequestHandler::builder(ComponentIdentity::new("yokel", "widget"))
        .config(ComponentConfig::default().with_format(ResultFormat::Json))
        .action("Start", |_ctx: &mut RequestContext| {
            ActionOutcome::from_value(json!({"greeting": "hello"}))
        })
        .action("Echo", |ctx: &mut RequestContext| {
            let name = ctx.param_str("name").unwrap_or("nobody").to_owned();
            ActionOutcome::from_value(json!({ "name": name }))
        })
        .build();

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve(Arc::new(widget)));

    let reply = roundtrip(
        addr,
        "GET /widget HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let (head, body) = split(&reply);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: application/json; charset=utf-8\r\n"));
    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(
        serde_json::from_str::<Value>(body).unwrap(),
        json!({"greeting": "hello"})
    );

    let reply = roundtrip(
        addr,
        "GET /widget?action=Echo&name=ada HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let (_, body) = split(&reply);
    assert_eq!(
        serde_json::from_str::<Value>(body).unwrap(),
        json!({"name": "ada"})
    );
}

#[tokio::test]
async fn malformed_request_gets_bad_request() {
    let widget = RequestHandler::builder(ComponentIdentity::new("yokel", "widget")).build();
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve(Arc::new(widget)));

    let reply = roundtrip(addr, "NOT A REQUEST\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn oversized_declared_body_is_rejected_up_front() {
    let widget = RequestHandler::builder(ComponentIdentity::new("yokel", "widget")).build();
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve(Arc::new(widget)));

    let reply = roundtrip(
        addr,
        "POST /widget HTTP/1.1\r\nContent-Length: 9999999999\r\n\r\nabc",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));

    let reply = roundtrip(
        addr,
        "POST /widget HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nabc",
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}
