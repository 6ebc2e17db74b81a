//! Request target model (path + query).

use std::fmt;

/// The path and query of a request, as received on the request line.
///
/// Absolute-form targets (`http://host/path?q`) are reduced to their path and
/// query; the authority is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUri {
    path: String,
    query: Option<String>,
}

impl RequestUri {
    /// Parse a request target.
    pub fn parse(target: &str) -> Self {
        let origin = strip_authority(target);
        let (path, query) = match origin.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (origin, None),
        };

        let path = if path.is_empty() { "/".to_string() } else { path.to_string() };

        Self { path, query }
    }

    /// The raw (still percent-encoded) path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded `name=value` pairs of the query string, in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match &self.query {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Path followed by `?query` when present.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for RequestUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

fn strip_authority(target: &str) -> &str {
    let Some(scheme_end) = target.find("://") else {
        return target;
    };

    let rest = &target[scheme_end + 3..];
    match rest.find(['/', '?']) {
        Some(idx) => &rest[idx..],
        None => "/",
    }
}
