// runtablesync/src/storage/uri.rs
use std::fmt;

use crate::errors::{AppError, Result};

/// A bucket named on the command line, with or without the `gs://` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketUri {
    pub bucket: String,
}

impl BucketUri {
    /// Full `gs://` path of an object (or directory) inside this bucket.
    pub fn object_path(&self, key: &str) -> String {
        format!("{}/{}", self, key.trim_start_matches('/'))
    }
}

impl fmt::Display for BucketUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}", self.bucket)
    }
}

/// Parses `gs://bucket` or a bare `bucket` into a [`BucketUri`].
pub fn parse_bucket_uri(raw: &str) -> Result<BucketUri> {
    let trimmed = raw.trim();
    let bucket = if trimmed.contains("://") {
        let uri = url::Url::parse(trimmed)?;
        if uri.scheme() != "gs" {
            return Err(AppError::BucketUri(format!(
                "{trimmed}: bucket URI must start with gs://"
            )));
        }
        if !uri.path().trim_matches('/').is_empty() {
            return Err(AppError::BucketUri(format!(
                "{trimmed}: expected a bucket, not an object path"
            )));
        }
        uri.host_str()
            .ok_or_else(|| AppError::BucketUri(format!("{trimmed}: missing bucket name")))?
            .to_string()
    } else {
        trimmed.trim_end_matches('/').to_string()
    };

    if bucket.is_empty() || bucket.contains('/') {
        return Err(AppError::BucketUri(format!("{raw}: invalid bucket name")));
    }
    Ok(BucketUri { bucket })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_uri_with_scheme() -> anyhow::Result<()> {
        let uri = parse_bucket_uri("gs://fc-nanopore-runs")?;
        assert_eq!(uri.bucket, "fc-nanopore-runs");
        assert_eq!(uri.to_string(), "gs://fc-nanopore-runs");
        Ok(())
    }

    #[test]
    fn test_parse_bucket_uri_bare_and_trailing_slash() -> anyhow::Result<()> {
        assert_eq!(parse_bucket_uri("fc-runs")?.bucket, "fc-runs");
        assert_eq!(parse_bucket_uri("gs://fc-runs/")?.bucket, "fc-runs");
        Ok(())
    }

    #[test]
    fn test_parse_bucket_uri_rejects_other_schemes_and_paths() {
        assert!(parse_bucket_uri("s3://fc-runs").is_err());
        assert!(parse_bucket_uri("gs://fc-runs/inputs").is_err());
        assert!(parse_bucket_uri("fc-runs/inputs").is_err());
        assert!(parse_bucket_uri("").is_err());
    }

    #[test]
    fn test_object_path() -> anyhow::Result<()> {
        let uri = parse_bucket_uri("gs://fc-runs")?;
        assert_eq!(uri.object_path("inputs/run1"), "gs://fc-runs/inputs/run1");
        assert_eq!(uri.object_path("/inputs/run1"), "gs://fc-runs/inputs/run1");
        Ok(())
    }
}
