use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use scrapewise::fetch::{ContentFetcher, FetchError, FetchHints, FetchedContent};
use scrapewise::strategy::compute_signature;

/// Reads pages from the local filesystem. Accepts plain paths and
/// `file://` urls.
#[derive(Debug, Default, Clone)]
pub struct LocalFileFetcher {
    root: Option<PathBuf>,
}

impl LocalFileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root` instead of the working directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl ContentFetcher for LocalFileFetcher {
    async fn fetch(&self, url: &str, _hints: &FetchHints) -> Result<FetchedContent, FetchError> {
        let path = self.resolve(url);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            },
            _ => FetchError::Blocked {
                url: url.to_string(),
                reason: e.to_string(),
            },
        })?;

        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => "application/json",
            Some("html") | Some("htm") => "text/html",
            _ => "text/plain",
        };
        debug!(path = %path.display(), bytes = content.len(), "Read local page");

        let signature = compute_signature(&content);
        Ok(FetchedContent::new(url, content, signature).with_content_type(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_file_url_and_relative_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.json"), r#"{"items": [{"price": 3}]}"#).unwrap();

        let fetcher = LocalFileFetcher::new().with_root(dir.path());
        let page = fetcher.fetch("page.json", &FetchHints::default()).await.unwrap();
        assert_eq!(page.content_type.as_deref(), Some("application/json"));
        assert!(page.signature.as_str().starts_with("json:"));

        let absolute = format!("file://{}", dir.path().join("page.json").display());
        assert!(LocalFileFetcher::new()
            .fetch(&absolute, &FetchHints::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = TempDir::new().unwrap();
        let fetcher = LocalFileFetcher::new().with_root(dir.path());
        assert!(matches!(
            fetcher.fetch("nope.html", &FetchHints::default()).await,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
    }
}
