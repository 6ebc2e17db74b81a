//! Response values produced by endpoints and services.
//!
//! # Responsibilities
//! - Carry status, content type and body bytes of a finished response
//! - Convert endpoint return values into responses using the endpoint's
//!   declared content type
//!
//! # Design Decisions
//! - Serialization settings are passed in explicitly ([`SerializationOptions`]);
//!   nothing is cached process-wide

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

/// Content types an endpoint may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    #[default]
    Html,
    Plaintext,
    Xml,
    Json,
    BinaryData,
}

impl ContentType {
    /// MIME type sent in the `Content-Type` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Plaintext => "text/plain",
            ContentType::Xml => "text/xml",
            ContentType::Json => "application/json",
            ContentType::BinaryData => "application/octet-stream",
        }
    }

    /// Whether structured values are serialized for this content type.
    pub fn is_serializable(&self) -> bool {
        matches!(self, ContentType::Json)
    }
}

/// How structured values are rendered into response bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializationOptions {
    pub pretty_json: bool,
}

/// A complete response ready to be written to a [`ListenerContext`](crate::http::ListenerContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: ContentType,
    pub data: Bytes,
}

impl Response {
    pub fn new(data: impl Into<Bytes>, content_type: ContentType, status: StatusCode) -> Self {
        Self {
            status,
            content_type,
            data: data.into(),
        }
    }

    /// A response with an empty body.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(Bytes::new(), ContentType::Plaintext, status)
    }

    /// A `200 OK` plaintext response.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(body.into(), ContentType::Plaintext, StatusCode::OK)
    }

    /// Serialize `value` as a JSON response.
    pub fn json<T: Serialize>(
        value: &T,
        status: StatusCode,
        options: SerializationOptions,
    ) -> Result<Self, serde_json::Error> {
        let data = if options.pretty_json {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };

        Ok(Self::new(data, ContentType::Json, status))
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl From<StatusCode> for Response {
    fn from(status: StatusCode) -> Self {
        Response::empty(status)
    }
}

/// What an endpoint handler hands back to the dispatch stage.
#[derive(Debug, Clone)]
pub enum EndpointOutput {
    /// Nothing; answered with the endpoint's null status code.
    Empty,
    /// A complete response, passed through unchanged.
    Response(Response),
    /// Text wrapped with the endpoint's content type and `200`.
    Text(String),
    /// Raw bytes wrapped with the endpoint's content type and `200`.
    Bytes(Bytes),
    /// A structured value, serialized when the content type is serializable.
    Value(serde_json::Value),
}

impl EndpointOutput {
    /// Wrap the output into a response.
    ///
    /// `null_status` is used for [`EndpointOutput::Empty`].
    pub fn into_response(
        self,
        content_type: ContentType,
        null_status: StatusCode,
        options: SerializationOptions,
    ) -> Result<Response, serde_json::Error> {
        let response = match self {
            EndpointOutput::Empty => Response::new(Bytes::new(), content_type, null_status),
            EndpointOutput::Response(response) => response,
            EndpointOutput::Text(text) => Response::new(text, content_type, StatusCode::OK),
            EndpointOutput::Bytes(bytes) => Response::new(bytes, content_type, StatusCode::OK),
            EndpointOutput::Value(value) if content_type.is_serializable() => {
                Response::json(&value, StatusCode::OK, options)?
            }
            EndpointOutput::Value(serde_json::Value::String(text)) => {
                Response::new(text, content_type, StatusCode::OK)
            }
            EndpointOutput::Value(value) => {
                Response::new(value.to_string(), content_type, StatusCode::OK)
            }
        };

        Ok(response)
    }
}

impl From<Response> for EndpointOutput {
    fn from(response: Response) -> Self {
        EndpointOutput::Response(response)
    }
}

impl From<StatusCode> for EndpointOutput {
    fn from(status: StatusCode) -> Self {
        EndpointOutput::Response(status.into())
    }
}

impl From<String> for EndpointOutput {
    fn from(text: String) -> Self {
        EndpointOutput::Text(text)
    }
}

impl From<&str> for EndpointOutput {
    fn from(text: &str) -> Self {
        EndpointOutput::Text(text.to_string())
    }
}

impl From<Bytes> for EndpointOutput {
    fn from(bytes: Bytes) -> Self {
        EndpointOutput::Bytes(bytes)
    }
}

impl From<Vec<u8>> for EndpointOutput {
    fn from(bytes: Vec<u8>) -> Self {
        EndpointOutput::Bytes(bytes.into())
    }
}

impl From<serde_json::Value> for EndpointOutput {
    fn from(value: serde_json::Value) -> Self {
        EndpointOutput::Value(value)
    }
}

impl<T: Into<EndpointOutput>> From<Option<T>> for EndpointOutput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(EndpointOutput::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_output_uses_null_status() {
        let response = EndpointOutput::Empty
            .into_response(ContentType::Plaintext, StatusCode::BAD_REQUEST, SerializationOptions::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(response.data.is_empty());
    }

    #[test]
    fn raw_values_take_declared_content_type() {
        let response = EndpointOutput::from("works")
            .into_response(ContentType::Xml, StatusCode::NOT_FOUND, SerializationOptions::default())
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, ContentType::Xml);
        assert_eq!(response.data, Bytes::from_static(b"works"));
    }

    #[test]
    fn responses_pass_through() {
        let original = Response::text("works").with_status(StatusCode::ACCEPTED);
        let response = EndpointOutput::from(original.clone())
            .into_response(ContentType::Json, StatusCode::NOT_FOUND, SerializationOptions::default())
            .unwrap();
        assert_eq!(response, original);
    }

    #[test]
    fn values_serialize_for_json() {
        let response = EndpointOutput::from(json!({ "value": 69 }))
            .into_response(ContentType::Json, StatusCode::NOT_FOUND, SerializationOptions::default())
            .unwrap();
        assert_eq!(response.data, Bytes::from_static(b"{\"value\":69}"));
    }

    #[test]
    fn none_maps_to_empty() {
        let output: EndpointOutput = Option::<String>::None.into();
        assert!(matches!(output, EndpointOutput::Empty));
    }
}
