//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse path patterns (`/items/{id}`, `/files/{*rest}`)
//! - Match request paths segment by segment
//! - Capture named parameters
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - Empty segments are ignored, so a trailing slash does not matter
//! - `:name` and `*name` are accepted as aliases for `{name}` and `{*name}`
//! - A catch-all is only meaningful as the last segment and may match nothing

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            return match inner.strip_prefix('*') {
                Some(name) => Segment::CatchAll(name.to_string()),
                None => Segment::Param(inner.to_string()),
            };
        }
        if let Some(name) = raw.strip_prefix(':') {
            return Segment::Param(name.to_string());
        }
        if let Some(name) = raw.strip_prefix('*') {
            return Segment::CatchAll(name.to_string());
        }
        Segment::Literal(raw.to_string())
    }
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl PathPattern {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: split(raw).map(Segment::parse).collect(),
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The pattern in axum's route syntax, with aliases rewritten to braces.
    pub fn axum_path(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param(name) => {
                    path.push('{');
                    path.push_str(name);
                    path.push('}');
                }
                Segment::CatchAll(name) if name.is_empty() => path.push_str("{*rest}"),
                Segment::CatchAll(name) => {
                    path.push_str("{*");
                    path.push_str(name);
                    path.push('}');
                }
            }
        }
        path
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Named parameters of `path`, or `None` if it does not match.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut parts = split(path);

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    if index + 1 != self.segments.len() {
                        return None;
                    }
                    let rest: Vec<&str> = parts.by_ref().collect();
                    if !name.is_empty() {
                        params.insert(name.clone(), rest.join("/"));
                    }
                    return Some(params);
                }
                Segment::Literal(expected) => {
                    if parts.next()? != expected {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next()?;
                    params.insert(name.clone(), value.to_string());
                }
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(params),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
