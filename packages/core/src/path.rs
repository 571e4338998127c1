//! Dot-separated key paths.

use std::fmt;

/// Errors related to key parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The key was empty.
    Empty,
    /// A segment between two dots (or at either end) was empty.
    EmptySegment { key: String, position: usize },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "key is empty"),
            PathError::EmptySegment { key, position } => {
                write!(f, "key '{}' has an empty segment at position {}", key, position)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A validated, non-empty dot path such as `user.stats.wins`.
///
/// The first segment names the top-level entry of a document (or the record
/// key in a document collection); the remaining segments walk into it.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DotPath {
    segments: Vec<String>,
}

impl DotPath {
    /// Parse a key string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotstore_core::DotPath;
    ///
    /// let path = DotPath::parse("user.stats.wins").unwrap();
    /// assert_eq!(path.len(), 3);
    /// assert_eq!(path.head(), "user");
    ///
    /// assert!(DotPath::parse("").is_err());
    /// assert!(DotPath::parse("a..b").is_err());
    /// ```
    pub fn parse(key: &str) -> Result<Self, PathError> {
        if key.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<String> = key.split('.').map(str::to_string).collect();
        if let Some(position) = segments.iter().position(String::is_empty) {
            return Err(PathError::EmptySegment {
                key: key.to_string(),
                position,
            });
        }

        Ok(DotPath { segments })
    }

    /// All segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The first segment.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    /// The segments after the first one.
    pub fn tail(&self) -> &[String] {
        &self.segments[1..]
    }

    /// Number of segments. Always at least one.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; a `DotPath` has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether the path addresses a top-level entry.
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// Prefix this path with extra segments, e.g. `value` + `b.c` = `value.b.c`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self)
    }
}

impl fmt::Display for DotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl std::str::FromStr for DotPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DotPath::parse(s)
    }
}

impl TryFrom<&str> for DotPath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        DotPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_segment() {
        let path = DotPath::parse("users").unwrap();
        assert!(path.is_top_level());
        assert_eq!(path.head(), "users");
        assert!(path.tail().is_empty());
    }

    #[test]
    fn parse_nested() {
        let path = DotPath::parse("user.stats.wins").unwrap();
        assert_eq!(path.segments(), &["user", "stats", "wins"]);
        assert_eq!(path.tail(), &["stats", "wins"]);
        assert!(!path.is_top_level());
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(DotPath::parse(""), Err(PathError::Empty));
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(matches!(
            DotPath::parse("a..b"),
            Err(PathError::EmptySegment { position: 1, .. })
        ));
        assert!(matches!(
            DotPath::parse(".a"),
            Err(PathError::EmptySegment { position: 0, .. })
        ));
        assert!(matches!(
            DotPath::parse("a."),
            Err(PathError::EmptySegment { position: 1, .. })
        ));
    }

    #[test]
    fn display_round_trips() {
        let path: DotPath = "a.b.0".parse().unwrap();
        assert_eq!(path.to_string(), "a.b.0");
    }

    #[test]
    fn prefixed_joins_with_dot() {
        let path = DotPath::parse("b.c").unwrap();
        assert_eq!(path.prefixed("value"), "value.b.c");
    }

    #[test]
    fn error_display() {
        let e = DotPath::parse("x..y").unwrap_err();
        assert!(format!("{}", e).contains("empty segment"));
    }
}
