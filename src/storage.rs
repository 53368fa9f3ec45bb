//! Local object-store emulation
//!
//! `s3://bucket/key` locations resolve to `{root}/bucket/key`. Locations
//! without a scheme are plain filesystem paths and are used as given.

use std::path::{Component, Path, PathBuf};

const S3_SCHEME: &str = "s3://";

/// Maps object-store URIs onto a local directory tree
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location to a local path.
    ///
    /// Returns `None` for an `s3://` URI without a bucket, with a bucket that
    /// is not a single directory name, or with a key that would escape the
    /// bucket directory.
    pub fn resolve(&self, location: &str) -> Option<PathBuf> {
        let Some(rest) = location.strip_prefix(S3_SCHEME) else {
            if location.is_empty() {
                return None;
            }
            return Some(PathBuf::from(location));
        };

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };
        let mut bucket_parts = Path::new(bucket).components();
        match (bucket_parts.next(), bucket_parts.next()) {
            (Some(Component::Normal(_)), None) if !bucket.contains(['/', '\\']) => {}
            _ => return None,
        }

        let key_path = Path::new(key);
        if key_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.root.join(bucket).join(key_path))
    }
}

/// Join an object key onto a base location
pub fn join_location(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_s3_uri() {
        let store = ObjectStore::new("/var/lib/objects");
        assert_eq!(
            store.resolve("s3://ws-cc-raw-data-123/data/creditcard.csv"),
            Some(PathBuf::from(
                "/var/lib/objects/ws-cc-raw-data-123/data/creditcard.csv"
            ))
        );
    }

    #[test]
    fn test_resolve_plain_path() {
        let store = ObjectStore::new("/var/lib/objects");
        assert_eq!(
            store.resolve("/tmp/creditcard.csv"),
            Some(PathBuf::from("/tmp/creditcard.csv"))
        );
    }

    #[test]
    fn test_resolve_rejects_escape_and_missing_bucket() {
        let store = ObjectStore::new("/var/lib/objects");
        assert_eq!(store.resolve("s3:///data/creditcard.csv"), None);
        assert_eq!(store.resolve("s3://bucket/../other/key"), None);
        assert_eq!(store.resolve(""), None);
        assert_eq!(store.resolve("s3://../output/fraud_analysis_result/summary"), None);
        assert_eq!(store.resolve("s3://./output/summary"), None);
        assert_eq!(store.resolve("s3://..\\escape/summary"), None);
    }

    #[test]
    fn test_join_location() {
        assert_eq!(
            join_location("s3://bucket/output/", "/summary"),
            "s3://bucket/output/summary"
        );
    }
}
