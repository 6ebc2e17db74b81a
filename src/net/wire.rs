//! Response encoding for the socket backend.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{self, HeaderValue};
use http::StatusCode;

use crate::net::listener::FinishedResponse;

/// Encode a response as status line + headers + body.
///
/// `Content-Length` and `Connection: close` are always written; one request is
/// served per connection.
pub fn encode_response(response: &FinishedResponse) -> Bytes {
    let mut out = BytesMut::with_capacity(128 + response.body.len());

    out.put_slice(b"HTTP/1.1 ");
    out.put_slice(response.status.as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(response.status.canonical_reason().unwrap_or("Unknown").as_bytes());
    out.put_slice(b"\r\n");

    for (name, value) in &response.headers {
        if *name == header::CONTENT_LENGTH || *name == header::CONNECTION {
            continue;
        }
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }

    out.put_slice(format!("content-length: {}\r\n", response.body.len()).as_bytes());
    out.put_slice(b"connection: close\r\n\r\n");
    out.put_slice(&response.body);

    out.freeze()
}

/// A plaintext error response written directly by a listener.
pub fn error_response(status: StatusCode, server_name: &str) -> FinishedResponse {
    let mut headers = http::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    if let Ok(server) = HeaderValue::from_str(server_name) {
        headers.insert(header::SERVER, server);
    }

    FinishedResponse {
        status,
        headers,
        body: Bytes::from(status.canonical_reason().unwrap_or("Error").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_status_headers_and_body() {
        let mut headers = http::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let encoded = encode_response(&FinishedResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"works"),
        });
        let text = String::from_utf8(encoded.to_vec()).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(text.contains("set-cookie: a=1\r\nset-cookie: b=2\r\n"));
        assert!(text.contains("content-length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nworks"));
    }

    #[test]
    fn error_responses_carry_server_header() {
        let response = error_response(StatusCode::PAYLOAD_TOO_LARGE, "hearth");
        assert_eq!(response.headers[header::SERVER], "hearth");
        assert_eq!(response.body, Bytes::from_static(b"Payload Too Large"));
    }
}
