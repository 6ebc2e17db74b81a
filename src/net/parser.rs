//! HTTP/1 request parsing for the socket backend.
//!
//! # Responsibilities
//! - Read the request line, headers and a `Content-Length` delimited body
//! - Enforce line length, header count and body size limits while reading
//!
//! # Design Decisions
//! - Generic over `AsyncBufRead` so tests can parse from byte slices
//! - Duplicate headers are appended, never overwritten
//! - Chunked transfer encoding is not supported: a body without
//!   `Content-Length` is treated as empty
//! - The body buffer is allocated only after `Content-Length` passed the
//!   configured maximum

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::LimitsConfig;
use crate::http::{Method, RequestUri};

/// Error type for request parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("connection closed before a request was received")]
    ConnectionClosed,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("request line or header exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("more than {0} headers")]
    TooManyHeaders(usize),
    #[error("body of {length} bytes exceeds maximum of {max}")]
    PayloadTooLarge { length: usize, max: usize },
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Status to answer with, or `None` when the peer cannot be answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ParseError::MalformedRequest(_) | ParseError::TooManyHeaders(_) => {
                Some(StatusCode::BAD_REQUEST)
            }
            ParseError::LineTooLong(_) => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            ParseError::PayloadTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            ParseError::ConnectionClosed | ParseError::Io(_) => None,
        }
    }
}

/// A request as read off the wire.
#[derive(Debug)]
pub struct ParsedRequest {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ParsedRequest {
    pub fn uri(&self) -> RequestUri {
        RequestUri::parse(&self.target)
    }
}

/// Read one request from `reader`.
pub async fn parse_request<R>(reader: &mut R, limits: &LimitsConfig) -> Result<ParsedRequest, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let request_line = match read_line(reader, limits.max_line_length).await? {
        Some(line) => line,
        None => return Err(ParseError::ConnectionClosed),
    };

    let tokens: Vec<&str> = request_line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(ParseError::MalformedRequest(format!(
            "request line has {} tokens",
            tokens.len()
        )));
    }

    let method = Method::from_token(tokens[0]);
    let target = tokens[1].to_string();
    if !tokens[2].starts_with("HTTP/1.") {
        return Err(ParseError::MalformedRequest(format!("unsupported version {:?}", tokens[2])));
    }

    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(reader, limits.max_line_length)
            .await?
            .ok_or_else(|| ParseError::MalformedRequest("headers not terminated".into()))?;

        if line.is_empty() {
            break;
        }
        if headers.len() >= limits.max_header_count {
            return Err(ParseError::TooManyHeaders(limits.max_header_count));
        }

        let (name, value) = parse_header_line(&line)?;
        headers.append(name, value);
    }

    let body = read_body(reader, &headers, limits.max_body_size).await?;

    Ok(ParsedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue), ParseError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| ParseError::MalformedRequest(format!("header without colon: {line:?}")))?;

    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| ParseError::MalformedRequest(format!("invalid header name: {name:?}")))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| ParseError::MalformedRequest(format!("invalid value for header {name}")))?;

    Ok((name, value))
}

/// Parse `Content-Length`; absent means zero.
pub fn content_length(headers: &HeaderMap) -> Result<usize, ParseError> {
    match headers.get(header::CONTENT_LENGTH) {
        None => Ok(0),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .ok_or_else(|| ParseError::MalformedRequest("invalid Content-Length".into())),
    }
}

async fn read_body<R>(reader: &mut R, headers: &HeaderMap, max: usize) -> Result<Bytes, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let length = content_length(headers)?;
    if length == 0 {
        return Ok(Bytes::new());
    }
    if length > max {
        return Err(ParseError::PayloadTooLarge { length, max });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Bytes::from(body))
}

/// Read a line terminated by LF (CR before it is dropped).
///
/// Returns `None` on EOF before any byte was read.
async fn read_line<R>(reader: &mut R, max: usize) -> Result<Option<String>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader).take(max as u64 + 1).read_until(b'\n', &mut buf).await?;

    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') {
        if buf.len() > max {
            return Err(ParseError::LineTooLong(max));
        }
        return Err(ParseError::MalformedRequest("unexpected end of stream".into()));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| ParseError::MalformedRequest("line is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_body_size: 16,
            max_header_count: 4,
            max_line_length: 64,
        }
    }

    async fn parse(raw: &[u8]) -> Result<ParsedRequest, ParseError> {
        let mut reader = raw;
        parse_request(&mut reader, &limits()).await
    }

    #[tokio::test]
    async fn parses_request_with_body() {
        let request = parse(b"POST /body/string?x=1 HTTP/1.1\r\nHost: direct\r\nContent-Length: 5\r\n\r\nworks")
            .await
            .unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.target, "/body/string?x=1");
        assert_eq!(request.headers["host"], "direct");
        assert_eq!(request.body, Bytes::from_static(b"works"));
    }

    #[tokio::test]
    async fn duplicate_headers_are_appended() {
        let request = parse(b"GET / HTTP/1.1\r\nCookie: a=1\r\nCookie: b=2\r\n\r\n").await.unwrap();
        let values: Vec<_> = request.headers.get_all("cookie").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn missing_content_length_means_no_body() {
        let request = parse(b"POST / HTTP/1.1\r\n\r\nignored").await.unwrap();
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn short_request_line_is_malformed() {
        let err = parse(b"GET /\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn only_http1_is_accepted() {
        assert!(parse(b"GET / HTTP/1.0\r\n\r\n").await.is_ok());

        let err = parse(b"GET / HTTP/2.0\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::MalformedRequest(_)));
        let err = parse(b"GET / banana\r\n\r\n").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn unknown_method_still_parses() {
        let request = parse(b"BREW /pot HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(request.method, Method::Unknown);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_reading() {
        let err = parse(b"POST / HTTP/1.1\r\nContent-Length: 999999\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::PayloadTooLarge { length: 999999, max: 16 }));
    }

    #[tokio::test]
    async fn limits_header_count_and_line_length() {
        let err = parse(b"GET / HTTP/1.1\r\na: 1\r\nb: 2\r\nc: 3\r\nd: 4\r\ne: 5\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, ParseError::TooManyHeaders(4)));

        let long = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(100));
        let err = parse(long.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ParseError::LineTooLong(64)));
    }

    #[tokio::test]
    async fn truncated_body_is_a_transport_error() {
        let err = parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort").await.unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }

    #[tokio::test]
    async fn empty_stream_is_closed() {
        assert!(matches!(parse(b"").await.unwrap_err(), ParseError::ConnectionClosed));
    }
}
