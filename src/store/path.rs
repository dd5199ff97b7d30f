//! Slash-separated document paths.

use super::{StoreError, StoreErrorKind};
use std::fmt;

/// Location of a document or field in the store, e.g. `sessions/abc/winner`.
///
/// Segments are non-empty and never contain `/`. The empty path is the
/// store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The store root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a slash-separated path. Leading and trailing slashes are
    /// ignored; empty inner segments are rejected.
    #[track_caller]
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(StoreError::new(
                    StoreErrorKind::InvalidPath,
                    format!("Empty segment in path '{}'", raw),
                ));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Appends one segment.
    ///
    /// A segment containing `/` is split, so `child("a/b")` equals
    /// `child("a").child("b")`.
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            segment
                .as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    /// Path segments from the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, if any.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &StorePath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// True if a write at one path can change the value seen at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = StorePath::parse("/sessions/abc/").unwrap();
        assert_eq!(path.segments(), &["sessions", "abc"]);
        assert_eq!(path.to_string(), "sessions/abc");
        assert_eq!(path.key(), Some("abc"));
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        let err = StorePath::parse("sessions//abc").unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidPath);
    }

    #[test]
    fn test_child_splits_nested_segments() {
        let base = StorePath::parse("sessions").unwrap();
        assert_eq!(
            base.child("abc/players"),
            base.child("abc").child("players")
        );
    }

    #[test]
    fn test_overlap() {
        let session = StorePath::parse("sessions/abc").unwrap();
        let field = session.child("winner");
        let other = StorePath::parse("sessions/xyz").unwrap();
        assert!(session.is_prefix_of(&field));
        assert!(!field.is_prefix_of(&session));
        assert!(field.overlaps(&session));
        assert!(!other.overlaps(&session));
        assert!(StorePath::root().overlaps(&other));
    }
}
