//! Cache key for remote media.

/// Unique identifier for a cached media file.
/// Generated from a hash of the remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaId(String);

impl MediaId {
    /// Creates a new `MediaId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a `MediaId` from a remote URL by hashing it.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_is_deterministic() {
        let a = MediaId::from_url("https://cdn.example.com/video1.mp4");
        let b = MediaId::from_url("https://cdn.example.com/video1.mp4");
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_url_distinguishes_urls() {
        let a = MediaId::from_url("https://cdn.example.com/video1.mp4");
        let b = MediaId::from_url("https://cdn.example.com/video2.mp4");
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_url_is_hex() {
        let id = MediaId::from_url("https://cdn.example.com/video1.mp4");
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_display_matches_inner() {
        let id = MediaId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
    }
}
