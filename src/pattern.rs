//! Route pattern compilation and path matching.
//!
//! A pattern string is split on `/` and each segment classified:
//!
//! - `{name}` — a variable, matching any single non-empty path segment and
//!   binding its URL-decoded text under `name`
//! - `*` — a wildcard, legal only as the final segment, capturing the whole
//!   remainder of the path (embedded `/` included) under the reserved name
//!   [`WILDCARD`]
//! - anything else — a literal, compared case-sensitively
//!
//! Matching is structural, not regex-based: segment counts must agree
//! (the pattern's may be ≤ the path's when it ends in a wildcard), and one
//! trailing slash on either side is trimmed before comparison.

use std::collections::HashMap;

use crate::error::Error;

/// Reserved variable name the trailing `*` capture is bound under.
pub const WILDCARD: &str = "wildcard";

/// One compiled pattern segment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Var(String),
    Wildcard,
}

/// A compiled route pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles a pattern string.
    ///
    /// Fails with [`Error::InvalidPattern`] when `*` appears anywhere but the
    /// final segment, when a variable name is empty, or when two variables in
    /// the same pattern share a name.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: reason.to_owned(),
        };

        let parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(invalid("empty variable name"));
                }
                if names.contains(&name) {
                    return Err(invalid("duplicate variable name"));
                }
                names.push(name);
                Segment::Var(name.to_owned())
            } else if *part == "*" {
                if i != parts.len() - 1 {
                    return Err(invalid("wildcard `*` must be the final segment"));
                }
                Segment::Wildcard
            } else {
                Segment::Literal((*part).to_owned())
            };
            segments.push(segment);
        }

        Ok(Self { raw: pattern.to_owned(), segments })
    }

    /// The pattern string this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Tests `path` against this pattern, returning captured variables on a
    /// structural match.
    ///
    /// Variables are URL-decoded; a segment that fails to decode is bound as
    /// its raw text instead. The wildcard remainder is captured verbatim.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path_segs = split_path(path);

        let trailing_wildcard = matches!(self.segments.last(), Some(Segment::Wildcard));
        if trailing_wildcard {
            // The wildcard may capture one or more segments.
            if path_segs.len() < self.segments.len() {
                return None;
            }
        } else if path_segs.len() != self.segments.len() {
            return None;
        }

        let mut vars = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    if path_segs[i] != text.as_str() {
                        return None;
                    }
                }
                Segment::Var(name) => {
                    if path_segs[i].is_empty() {
                        return None;
                    }
                    vars.insert(name.clone(), decode(path_segs[i]));
                }
                Segment::Wildcard => {
                    vars.insert(WILDCARD.to_owned(), path_segs[i..].join("/"));
                }
            }
        }
        Some(vars)
    }
}

/// Splits a concrete path into segments, trimming the leading slash and at
/// most one trailing slash. Interior empty segments are kept so `/a//b`
/// does not match `/a/{x}/b` or `/a/b`.
fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_suffix('/').unwrap_or(path);
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/').collect()
}

/// Percent-decodes a captured segment, falling back to the raw text when the
/// decoded bytes are not valid UTF-8.
fn decode(text: &str) -> String {
    match urlencoding::decode(text) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_exactly() {
        let p = Pattern::parse("/users").unwrap();
        assert!(p.matches("/users").is_some());
        assert!(p.matches("/users/").is_some());
        assert!(p.matches("/users/42").is_none());
        assert!(p.matches("/Users").is_none());
    }

    #[test]
    fn root_pattern() {
        let p = Pattern::parse("/").unwrap();
        assert!(p.matches("/").is_some());
        assert!(p.matches("/x").is_none());
    }

    #[test]
    fn variable_binds_single_segment() {
        let p = Pattern::parse("/users/{id}").unwrap();
        let vars = p.matches("/users/42").unwrap();
        assert_eq!(vars.get("id").map(String::as_str), Some("42"));
        assert!(p.matches("/users/42/extra").is_none());
        assert!(p.matches("/users").is_none());
    }

    #[test]
    fn variable_is_url_decoded() {
        let p = Pattern::parse("/tags/{tag}").unwrap();
        let vars = p.matches("/tags/caf%C3%A9").unwrap();
        assert_eq!(vars.get("tag").map(String::as_str), Some("café"));
    }

    #[test]
    fn undecodable_variable_falls_back_to_raw() {
        let p = Pattern::parse("/tags/{tag}").unwrap();
        // %FF is not valid UTF-8 once decoded.
        let vars = p.matches("/tags/%FF").unwrap();
        assert_eq!(vars.get("tag").map(String::as_str), Some("%FF"));
    }

    #[test]
    fn wildcard_captures_remainder() {
        let p = Pattern::parse("/files/*").unwrap();
        let vars = p.matches("/files/a/b.png").unwrap();
        assert_eq!(vars.get(WILDCARD).map(String::as_str), Some("a/b.png"));

        let vars = p.matches("/files/x").unwrap();
        assert_eq!(vars.get(WILDCARD).map(String::as_str), Some("x"));

        assert!(p.matches("/files").is_none());
    }

    #[test]
    fn wildcard_only_final() {
        assert!(matches!(
            Pattern::parse("/files/*/meta"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn duplicate_variable_rejected() {
        assert!(matches!(
            Pattern::parse("/a/{x}/b/{x}"),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn empty_variable_rejected() {
        assert!(Pattern::parse("/a/{}").is_err());
    }

    #[test]
    fn interior_empty_segment_never_matches() {
        let p = Pattern::parse("/a/{x}/b").unwrap();
        assert!(p.matches("/a//b").is_none());
    }

    #[test]
    fn trailing_slash_on_pattern_tolerated() {
        let p = Pattern::parse("/users/").unwrap();
        assert!(p.matches("/users").is_some());
    }
}
