//! Route template compilation and matching.
//!
//! # Responsibilities
//! - Compile templates like `/users/{id}` or `/files/img{name}.png`
//! - Match a request path segment by segment
//! - Capture placeholder values (percent-decoded)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Segment counts must be equal: no prefix matches, no wildcards
//! - Leading/trailing empty segments are ignored, so `/a/` equals `/a`
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;
use std::fmt;

/// Captured placeholder values, keyed by placeholder name.
pub type RouteParams = HashMap<String, String>;

/// Error type for invalid route templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed placeholder in segment {0:?}")]
    UnclosedPlaceholder(String),
    #[error("empty placeholder name in segment {0:?}")]
    EmptyPlaceholder(String),
    #[error("more than one placeholder in segment {0:?}")]
    MultiplePlaceholders(String),
    #[error("placeholder {0:?} is declared twice")]
    DuplicatePlaceholder(String),
}

/// One compiled template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `prefix{name}suffix`; prefix and suffix may be empty.
    Placeholder {
        prefix: String,
        name: String,
        suffix: String,
    },
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, TemplateError> {
        let Some(open) = raw.find('{') else {
            return Ok(Segment::Literal(raw.to_string()));
        };
        let close = raw[open..]
            .find('}')
            .map(|idx| open + idx)
            .ok_or_else(|| TemplateError::UnclosedPlaceholder(raw.to_string()))?;

        let name = &raw[open + 1..close];
        if name.is_empty() {
            return Err(TemplateError::EmptyPlaceholder(raw.to_string()));
        }
        let suffix = &raw[close + 1..];
        if suffix.contains('{') {
            return Err(TemplateError::MultiplePlaceholders(raw.to_string()));
        }

        Ok(Segment::Placeholder {
            prefix: raw[..open].to_string(),
            name: name.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Match one path segment, returning the captured value for placeholders.
    fn matches<'p>(&self, segment: &'p str) -> Option<Option<&'p str>> {
        match self {
            Segment::Literal(literal) => (literal == segment).then_some(None),
            Segment::Placeholder { prefix, suffix, .. } => {
                if segment.len() < prefix.len() + suffix.len() {
                    return None;
                }
                let value = segment.strip_prefix(prefix.as_str())?.strip_suffix(suffix.as_str())?;
                Some(Some(value))
            }
        }
    }
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let segments = split_path(template)
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = Vec::new();
        for segment in &segments {
            if let Segment::Placeholder { name, .. } = segment {
                if seen.contains(&name) {
                    return Err(TemplateError::DuplicatePlaceholder(name.clone()));
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// The template as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of placeholders in the template.
    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder { .. }))
            .count()
    }

    /// Names of the placeholders, in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path (without query string).
    pub fn match_path(&self, path: &str) -> Option<RouteParams> {
        let mut params = RouteParams::new();
        let mut path_segments = split_path(path);

        for segment in &self.segments {
            let actual = path_segments.next()?;
            if let Some(value) = segment.matches(actual)? {
                if let Segment::Placeholder { name, .. } = segment {
                    params.insert(name.clone(), decode_segment(value));
                }
            }
        }

        if path_segments.next().is_some() {
            return None;
        }

        Some(params)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}

fn decode_segment(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
