//! Blob identity resolution across consecutive layer builds.

/// Outcome of comparing a report's blob list with the last observed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobResolution {
    /// The report lists no blobs at all.
    NoBlob,
    /// The tail equals the previously observed blob; nothing new was produced.
    Unchanged,
    /// The tail is a blob not seen on the previous call.
    New(String),
}

impl BlobResolution {
    /// Resolve the latest blob of an append-only identifier list.
    ///
    /// Only the tail is compared, never set membership: a blob that
    /// reappears after a different one counts as new again.
    pub fn resolve(previous: Option<&str>, blobs: &[String]) -> Self {
        match blobs.last() {
            None => Self::NoBlob,
            Some(tail) if previous == Some(tail.as_str()) => Self::Unchanged,
            Some(tail) => Self::New(tail.clone()),
        }
    }

    pub fn new_blob_id(&self) -> Option<&str> {
        match self {
            Self::New(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_list_is_no_blob() {
        assert_eq!(BlobResolution::resolve(None, &[]), BlobResolution::NoBlob);
        assert_eq!(BlobResolution::resolve(Some("a"), &[]), BlobResolution::NoBlob);
    }

    #[test]
    fn test_first_blob_is_new() {
        let resolution = BlobResolution::resolve(None, &ids(&["a"]));
        assert_eq!(resolution, BlobResolution::New("a".to_string()));
        assert_eq!(resolution.new_blob_id(), Some("a"));
    }

    #[test]
    fn test_same_tail_is_unchanged() {
        let resolution = BlobResolution::resolve(Some("b"), &ids(&["a", "b"]));
        assert_eq!(resolution, BlobResolution::Unchanged);
        assert_eq!(resolution.new_blob_id(), None);
    }

    #[test]
    fn test_appended_blob_is_new() {
        assert_eq!(
            BlobResolution::resolve(Some("a"), &ids(&["a", "b"])),
            BlobResolution::New("b".to_string())
        );
    }

    #[test]
    fn test_reappearing_blob_uses_tail_not_membership() {
        // "a" is already in history but differs from the last observed tail
        assert_eq!(
            BlobResolution::resolve(Some("b"), &ids(&["a", "b", "a"])),
            BlobResolution::New("a".to_string())
        );
    }
}
