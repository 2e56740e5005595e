//! # Manifest Loader
//!
//! Reads an operand bundle and splits it into raw per-document blocks.
//!
//! A bundle is a multi-document YAML file living in the manifest directory.
//! Splitting happens on `---` separator lines only, so a `---` inside a block
//! scalar never cuts a document in half. Blank blocks (consecutive separators,
//! a leading separator, trailing whitespace) are kept in the output; callers
//! skip them with [`is_blank`].

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Manifest loading errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest bundle {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where operand bundles are read from
#[derive(Debug, Clone)]
pub struct ManifestSource {
    dir: PathBuf,
}

impl ManifestSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the bundles are resolved against
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a bundle addressed by its logical name
    #[must_use]
    pub fn path_for(&self, bundle: &str) -> PathBuf {
        self.dir.join(bundle)
    }

    /// Read a bundle and split it into raw document blocks
    pub async fn load(&self, bundle: &str) -> Result<Vec<String>, ManifestError> {
        let path = self.path_for(bundle);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ManifestError::Unreadable {
                path: path.clone(),
                source,
            })?;

        let blocks = split_documents(&contents);
        debug!(
            bundle = bundle,
            path = %path.display(),
            blocks = blocks.len(),
            "Loaded manifest bundle"
        );
        Ok(blocks)
    }
}

/// Split a multi-document YAML string on `---` separator lines
#[must_use]
pub fn split_documents(contents: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in contents.lines() {
        if is_separator(line) {
            blocks.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    blocks.push(current);

    blocks
}

/// True when a block holds no document (only whitespace and comments)
#[must_use]
pub fn is_blank(block: &str) -> bool {
    block
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

fn is_separator(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line.starts_with("--- ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_empty_blocks() {
        let blocks = split_documents("---\na: 1\n---\n---\nb: 2\n");
        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].is_empty());
        assert_eq!(blocks[1], "a: 1\n");
        assert!(blocks[2].is_empty());
        assert_eq!(blocks[3], "b: 2\n");
    }

    #[test]
    fn test_split_ignores_dashes_inside_documents() {
        let blocks = split_documents("data:\n  banner: |\n    ---- not a separator\n");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("---- not a separator"));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("\n   \n"));
        assert!(is_blank("# just a comment\n"));
        assert!(!is_blank("kind: Service\n"));
    }

    #[tokio::test]
    async fn test_load_missing_bundle_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let source = ManifestSource::new(dir.path());
        let err = source.load("missing.yaml").await.unwrap_err();
        assert!(matches!(err, ManifestError::Unreadable { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[tokio::test]
    async fn test_load_reads_and_splits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bundle.yaml"), "a: 1\n---\nb: 2\n").unwrap();
        let source = ManifestSource::new(dir.path());
        let blocks = source.load("bundle.yaml").await.unwrap();
        assert_eq!(blocks, vec!["a: 1\n".to_string(), "b: 2\n".to_string()]);
    }
}
