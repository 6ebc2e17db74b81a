//! The per-request exchange object shared by listeners and the pipeline.
//!
//! # Lifecycle
//! ```text
//! listener backend → RequestParts → ListenerContext::new (cookie normalization)
//!     → pipeline mutates response state
//!     → flush() writes status + headers + body exactly once, closing the transport
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;
use uuid::Uuid;

use crate::http::{ContentType, Method, RequestUri, Response};
use crate::net::listener::{Connection, FinishedResponse};

const DEFAULT_SERVER_NAME: &str = "hearth";

/// Request data as read by a listener backend, before normalization.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub remote_addr: SocketAddr,
    pub method: Method,
    pub uri: RequestUri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A single request/response exchange.
pub struct ListenerContext {
    request_id: Uuid,
    remote_addr: SocketAddr,
    method: Method,
    uri: RequestUri,
    query: Vec<(String, String)>,
    request_headers: HeaderMap,
    cookies: HashMap<String, String>,
    body: Bytes,

    status: StatusCode,
    content_type: Option<ContentType>,
    response_headers: HeaderMap,
    response_body: BytesMut,

    connection: Box<dyn Connection>,
}

impl ListenerContext {
    /// Build a context from parsed request parts and the transport to answer on.
    pub fn new(parts: RequestParts, connection: Box<dyn Connection>) -> Self {
        let cookies = parse_cookies(&parts.headers);
        let query = parts.uri.query_pairs();

        Self {
            request_id: Uuid::new_v4(),
            remote_addr: parts.remote_addr,
            method: parts.method,
            uri: parts.uri,
            query,
            request_headers: parts.headers,
            cookies,
            body: parts.body,
            status: StatusCode::NOT_FOUND,
            content_type: None,
            response_headers: HeaderMap::new(),
            response_body: BytesMut::new(),
            connection,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &RequestUri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// First value of the query parameter `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// First value of a request header, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request_headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The full request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// A reader over the request body, positioned at the start.
    pub fn body_reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.body[..])
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.content_type = Some(content_type);
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Append to the response body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.response_body.extend_from_slice(data.as_ref());
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// Replace the response state with `response`.
    pub fn respond(&mut self, response: Response) {
        self.status = response.status;
        self.content_type = Some(response.content_type);
        self.response_body.clear();
        self.response_body.extend_from_slice(&response.data);
    }

    /// Discard anything written so far, keeping response headers.
    pub fn clear_response_body(&mut self) {
        self.response_body.clear();
    }

    /// Write the response to the transport and close it.
    pub async fn flush(self) -> std::io::Result<()> {
        let Self {
            status,
            content_type,
            mut response_headers,
            response_body,
            connection,
            ..
        } = self;

        let content_type = content_type.unwrap_or(ContentType::Plaintext);
        response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        response_headers
            .entry(header::SERVER)
            .or_insert(HeaderValue::from_static(DEFAULT_SERVER_NAME));

        connection
            .send(FinishedResponse {
                status,
                headers: response_headers,
                body: response_body.freeze(),
            })
            .await
    }
}

impl fmt::Debug for ListenerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerContext")
            .field("request_id", &self.request_id)
            .field("remote_addr", &self.remote_addr)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Split every `Cookie` header on `;`, then each pair on the first `=`.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };

        for pair in value.split(';') {
            let Some((key, value)) = pair.split_once('=') else { continue };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            cookies.insert(key.to_string(), value.trim().to_string());
        }
    }

    cookies
}
