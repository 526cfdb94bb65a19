use std::fmt;

use crate::store::error::StoreError;

/// Characters the store refuses inside a single path segment.
const FORBIDDEN_SEGMENT_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// Slash separated address of a node inside the shared tree.
///
/// The empty path addresses the root. Segments are never empty and never contain
/// `/` or one of [`FORBIDDEN_SEGMENT_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a slash separated path, ignoring leading and trailing slashes.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            validate_segment(raw, segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Append a single segment.
    pub fn child(&self, segment: impl AsRef<str>) -> Result<Self, StoreError> {
        let segment = segment.as_ref();
        validate_segment(segment, segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` equals `other` or is one of its ancestors.
    pub fn is_ancestor_or_self(&self, other: &StorePath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// True when a write to one path can change the value observed at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_ancestor_or_self(other) || other.is_ancestor_or_self(self)
    }
}

fn validate_segment(raw: &str, segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() {
        return Err(StoreError::InvalidPath {
            path: raw.to_string(),
            reason: "empty segment".into(),
        });
    }
    if segment.contains('/') || segment.contains(FORBIDDEN_SEGMENT_CHARS) {
        return Err(StoreError::InvalidPath {
            path: raw.to_string(),
            reason: format!("segment `{segment}` contains a forbidden character"),
        });
    }
    Ok(())
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_slashes_and_splits_segments() {
        let path = StorePath::parse("/level1/votes/abc/").unwrap();
        assert_eq!(path.segments(), ["level1", "votes", "abc"]);
        assert_eq!(path.to_string(), "/level1/votes/abc");
    }

    #[test]
    fn parse_empty_is_root() {
        assert!(StorePath::parse("").unwrap().is_root());
        assert!(StorePath::parse("/").unwrap().is_root());
    }

    #[test]
    fn parse_rejects_forbidden_segments() {
        assert!(StorePath::parse("players//x").is_err());
        assert!(StorePath::parse("players/a.b").is_err());
        assert!(StorePath::parse("players/$id").is_err());
        assert!(StorePath::root().child("a/b").is_err());
    }

    #[test]
    fn overlap_is_symmetric_for_ancestors() {
        let players = StorePath::parse("players").unwrap();
        let score = StorePath::parse("players/abc/score").unwrap();
        let level1 = StorePath::parse("level1").unwrap();

        assert!(players.overlaps(&score));
        assert!(score.overlaps(&players));
        assert!(StorePath::root().overlaps(&level1));
        assert!(!players.overlaps(&level1));
    }
}
