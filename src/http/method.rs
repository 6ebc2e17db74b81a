//! HTTP request methods.
//!
//! # Design Decisions
//! - Parsing never fails: unrecognized tokens become [`Method::Unknown`] so the
//!   dispatch stage answers with a plain "no route" instead of a parse error
//! - Tokens are compared case-insensitively

use std::fmt;

/// The method of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
    /// Any token not listed above. Never matches a route.
    Unknown,
}

impl Method {
    /// Parse a method token from a request line.
    pub fn from_token(token: &str) -> Self {
        const KNOWN: [(&str, Method); 9] = [
            ("GET", Method::Get),
            ("POST", Method::Post),
            ("PUT", Method::Put),
            ("DELETE", Method::Delete),
            ("PATCH", Method::Patch),
            ("HEAD", Method::Head),
            ("OPTIONS", Method::Options),
            ("TRACE", Method::Trace),
            ("CONNECT", Method::Connect),
        ];

        KNOWN
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, method)| *method)
            .unwrap_or(Method::Unknown)
    }

    /// Upper-case wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Unknown => "UNKNOWN",
        }
    }
}

impl From<&str> for Method {
    fn from(token: &str) -> Self {
        Self::from_token(token)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Method::from_token("GET"), Method::Get);
        assert_eq!(Method::from_token("post"), Method::Post);
        assert_eq!(Method::from_token("oPtIoNs"), Method::Options);
    }

    #[test]
    fn unknown_tokens_do_not_fail() {
        assert_eq!(Method::from_token("BREW"), Method::Unknown);
        assert_eq!(Method::from_token(""), Method::Unknown);
    }

    #[test]
    fn displays_upper_case() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
