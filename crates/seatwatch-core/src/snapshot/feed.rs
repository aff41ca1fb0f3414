//! Feed sources: where the raw schedule bytes come from

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::parser::{FeedParser, JsonFeedParser, XlsFeedParser};
use crate::error::{Error, Result};

/// Produces the raw bytes of the enrollment feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the whole feed
    async fn fetch(&self) -> Result<Vec<u8>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Downloads the feed over HTTP(S)
pub struct HttpFeedSource {
    url: String,
    client: reqwest::Client,
}

impl HttpFeedSource {
    /// Build a source with its own HTTP client
    ///
    /// The registrar serves the schedule from a host whose certificate chain
    /// does not always validate; `accept_invalid_certs` exists for that case.
    pub fn new(url: impl Into<String>, accept_invalid_certs: bool, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Feed(format!("{} returned {}", self.url, status)));
        }
        let body = response.bytes().await?;
        debug!(url = %self.url, bytes = body.len(), "Feed downloaded");
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the feed from a local file (offline and example-data mode)
pub struct FileFeedSource {
    path: PathBuf,
}

impl FileFeedSource {
    /// Read from `path` on every fetch
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeedSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Feed(format!("{}: {}", self.path.display(), e)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Encoding of the feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// Legacy Excel workbook as exported by the registrar
    #[default]
    Xls,
    /// JSON document (see [`JsonFeedParser`])
    Json,
}

impl FeedFormat {
    /// Parser for this format
    #[must_use]
    pub fn parser(self) -> Box<dyn FeedParser> {
        match self {
            FeedFormat::Xls => Box::new(XlsFeedParser),
            FeedFormat::Json => Box::new(JsonFeedParser),
        }
    }
}

impl std::str::FromStr for FeedFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xls" | "xlsx" => Ok(FeedFormat::Xls),
            "json" => Ok(FeedFormat::Json),
            other => Err(Error::invalid_config(
                "feed.format",
                format!("unknown format '{}', expected xls or json", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"label\":\"x\"}").unwrap();

        let source = FileFeedSource::new(file.path());
        let bytes = source.fetch().await.unwrap();

        assert_eq!(bytes, b"{\"label\":\"x\"}");
        assert_eq!(source.describe(), file.path().display().to_string());
    }

    #[tokio::test]
    async fn test_missing_file_is_feed_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileFeedSource::new(dir.path().join("absent.xls"));

        let err = tokio_test::assert_err!(source.fetch().await);
        assert!(matches!(err, Error::Feed(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("XLS".parse::<FeedFormat>().unwrap(), FeedFormat::Xls);
        assert_eq!("json".parse::<FeedFormat>().unwrap(), FeedFormat::Json);
        tokio_test::assert_err!("csv".parse::<FeedFormat>());
    }
}
