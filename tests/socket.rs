//! Socket listener tests using raw TCP clients.

use std::net::SocketAddr;
use std::time::Duration;

use hearth::net::DirectRequest;
use hearth::{ContentType, Endpoint, HttpServer, RunningServer, ServerConfig, TcpHttpListener};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{test_config, test_server};

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn socket_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("/cookie")
            .content_type(ContentType::Plaintext)
            .handler(|context, _| Ok(context.cookie("session").unwrap_or("none").to_string())),
        Endpoint::get("/remote")
            .content_type(ContentType::Plaintext)
            .handler(|context, _| Ok(context.remote_addr().ip().to_string())),
        Endpoint::post("/echo")
            .content_type(ContentType::Plaintext)
            .param(hearth::Param::BodyText)
            .handler(|_, args| Ok(args.text(0).unwrap_or("").to_string())),
    ]
}

async fn start_socket_server(mut config: ServerConfig) -> (RunningServer<TcpHttpListener>, SocketAddr) {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let mut server = HttpServer::new(TcpHttpListener::new(&config), config);
    server.add_endpoints(socket_endpoints());

    let running = server.start().await.unwrap();
    let addr = running.listener().local_addr().unwrap();
    (running, addr)
}

async fn exchange(addr: SocketAddr, request: &[u8]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    parse_response(&String::from_utf8(raw).unwrap())
}

fn parse_response(raw: &str) -> RawResponse {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");
    let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .map(|line| {
            let (name, value) = line.split_once(':').unwrap();
            (name.trim().to_string(), value.trim().to_string())
        })
        .collect();

    RawResponse {
        status,
        headers,
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_socket_request_round_trip() {
    let (server, addr) = start_socket_server(test_config()).await;

    let response = exchange(addr, b"POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 5\r\n\r\nhello").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.header("content-length"), Some("5"));
    assert_eq!(response.header("server"), Some("hearth"));

    server.stop().await;
}

#[tokio::test]
async fn test_cookies_match_direct_listener() {
    let (server, addr) = start_socket_server(test_config()).await;
    let request = b"GET /cookie HTTP/1.1\r\nHost: test\r\nCookie: theme=dark; session=abc123\r\n\r\n";
    let over_socket = exchange(addr, request).await;
    server.stop().await;

    let (mut direct, client) = test_server(test_config());
    direct.add_endpoints(socket_endpoints());
    let direct = direct.start().await.unwrap();
    let over_direct = client
        .send(DirectRequest::get("/cookie").header("cookie", "theme=dark; session=abc123"))
        .await
        .unwrap();
    direct.stop().await;

    assert_eq!(over_socket.status, 200);
    assert_eq!(over_socket.body, "abc123");
    assert_eq!(over_direct.text(), over_socket.body);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.limits.max_body_size = 16;
    let (server, addr) = start_socket_server(config).await;

    let response = exchange(addr, b"POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 1000\r\n\r\n").await;
    assert_eq!(response.status, 413);

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let (server, addr) = start_socket_server(test_config()).await;

    let response = exchange(addr, b"GARBAGE\r\n\r\n").await;
    assert_eq!(response.status, 400);

    let response = exchange(addr, b"GET /cookie HTTP/1.1\r\nno colon here\r\n\r\n").await;
    assert_eq!(response.status, 400);

    server.stop().await;
}

#[tokio::test]
async fn test_overlong_line_is_rejected() {
    let mut config = test_config();
    config.limits.max_line_length = 64;
    let (server, addr) = start_socket_server(config).await;

    let request = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(200));
    let response = exchange(addr, request.as_bytes()).await;
    assert_eq!(response.status, 431);

    server.stop().await;
}

#[tokio::test]
async fn test_forwarded_ip_header() {
    let request = b"GET /remote HTTP/1.1\r\nHost: test\r\nX-Forwarded-For: 203.0.113.7\r\n\r\n";

    let (server, addr) = start_socket_server(test_config()).await;
    let response = exchange(addr, request).await;
    assert_eq!(response.body, "127.0.0.1");
    server.stop().await;

    let mut config = test_config();
    config.listener.use_forwarded_ip = true;
    let (server, addr) = start_socket_server(config).await;
    let response = exchange(addr, request).await;
    assert_eq!(response.body, "203.0.113.7");
    server.stop().await;
}

#[tokio::test]
async fn test_not_found_over_socket() {
    let (server, addr) = start_socket_server(test_config()).await;

    let response = exchange(addr, b"GET /missing HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body, "Not found: /missing");

    server.stop().await;
}

#[tokio::test]
async fn test_stop_answers_connection_still_being_read() {
    let (server, addr) = start_socket_server(test_config()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /cookie HTTP/1.1\r\nHost: test\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stopping = tokio::spawn(server.stop());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stopping.is_finished());

    stream.write_all(b"\r\n").await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let response = parse_response(&String::from_utf8(raw).unwrap());
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "none");

    tokio::time::timeout(Duration::from_secs(1), stopping).await.unwrap().unwrap();
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_truncated_body_does_not_affect_next_request() {
    let (server, addr) = start_socket_server(test_config()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 10\r\n\r\nabc")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();
    let mut raw = Vec::new();
    let read = stream.read_to_end(&mut raw).await;
    assert!(read.map_or(true, |n| n == 0));

    let response = exchange(addr, b"POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 5\r\n\r\nhello").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");

    server.stop().await;
}

#[tokio::test]
async fn test_slow_request_times_out() {
    let mut config = test_config();
    config.timeouts.read_secs = 1;
    let (server, addr) = start_socket_server(config).await;

    let mut slow = TcpStream::connect(addr).await.unwrap();
    slow.write_all(b"GET /cookie HTTP/1.1\r\n").await.unwrap();

    let response = exchange(addr, b"GET /cookie HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(response.status, 200);

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(3), slow.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let response = parse_response(&String::from_utf8(raw).unwrap());
    assert_eq!(response.status, 408);
    assert_eq!(response.header("connection"), Some("close"));

    server.stop().await;
}
