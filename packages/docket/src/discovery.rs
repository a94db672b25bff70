//! Discovery implementations.
//!
//! - `StaticDiscovery` - A fixed list, for tests and embedding
//! - `ManifestDiscovery` - A manifest file, one document per line

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::error::DiscoveryError;
use crate::traits::discovery::Discovery;
use crate::types::document::{DiscoveredDocument, SourceIdentifier};

/// Returns the same documents on every call.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    documents: Vec<DiscoveredDocument>,
}

impl StaticDiscovery {
    pub fn new(documents: Vec<DiscoveredDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self) -> Result<Vec<DiscoveredDocument>, DiscoveryError> {
        Ok(self.documents.clone())
    }
}

/// Reads documents from a manifest file.
///
/// Each non-blank line is either a JSON object
/// (`{"source_identifier": "...", "display_title": "...", "declared_date": "2024-03-01"}`)
/// or a bare source identifier. Lines starting with `#` are comments.
#[derive(Debug, Clone)]
pub struct ManifestDiscovery {
    path: PathBuf,
}

impl ManifestDiscovery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse manifest contents.
    pub fn parse(contents: &str) -> Result<Vec<DiscoveredDocument>, DiscoveryError> {
        let mut documents = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = idx + 1;

            let doc = if line.starts_with('{') {
                serde_json::from_str::<DiscoveredDocument>(line).map_err(|e| {
                    DiscoveryError::InvalidEntry {
                        line: line_no,
                        reason: e.to_string(),
                    }
                })?
            } else {
                let id = SourceIdentifier::new(line).ok_or_else(|| DiscoveryError::InvalidEntry {
                    line: line_no,
                    reason: "invalid source identifier".to_string(),
                })?;
                DiscoveredDocument::new(id, String::new())
            };
            documents.push(doc);
        }
        Ok(documents)
    }
}

#[async_trait]
impl Discovery for ManifestDiscovery {
    async fn discover(&self) -> Result<Vec<DiscoveredDocument>, DiscoveryError> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| DiscoveryError::Io {
                    path: self.path.display().to_string(),
                    source,
                })?;
        let documents = Self::parse(&contents)?;
        debug!(path = %self.path.display(), count = documents.len(), "manifest loaded");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_mixed_manifest() {
        let manifest = r#"
# council minutes
{"source_identifier": "https://example.gov/m/1.pdf", "display_title": "Regular Session", "declared_date": "2024-03-01"}

https://example.gov/m/2.pdf
"#;
        let docs = ManifestDiscovery::parse(manifest).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].display_title, "Regular Session");
        assert_eq!(docs[0].declared_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(docs[1].source_identifier.as_str(), "https://example.gov/m/2.pdf");
    }

    #[test]
    fn test_invalid_line_reports_line_number() {
        let err = ManifestDiscovery::parse("a\n{\"source_identifier\": \"\"}\n").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidEntry { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = ManifestDiscovery::new(dir.path().join("missing.jsonl"));
        assert!(matches!(
            discovery.discover().await,
            Err(DiscoveryError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        std::fs::write(&path, "doc-1\ndoc-2\n").unwrap();

        let docs = ManifestDiscovery::new(&path).discover().await.unwrap();
        assert_eq!(docs.len(), 2);
    }
}
