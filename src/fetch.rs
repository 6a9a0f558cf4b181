//! Downloading remote reports.

use crate::error::{Error, Result};

/// Request timeout for report downloads, in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Retrieves the bytes of a remote document.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetcher used when the crate is built without HTTP support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(Error::Fetch {
            url: url.to_string(),
            reason: "HTTP support is not enabled".into(),
        })
    }
}

/// Blocking HTTP fetcher; error statuses are failures.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("freeports/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Other(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fail = |e: reqwest::Error| Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };
        log::info!("Downloading {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(fail)?;
        let bytes = response.bytes().map_err(fail)?;
        log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// The fetcher for this build: HTTP when enabled, otherwise [`NoFetcher`].
pub fn default_fetcher() -> Result<std::sync::Arc<dyn Fetcher>> {
    #[cfg(feature = "http")]
    {
        Ok(std::sync::Arc::new(HttpFetcher::new()?))
    }
    #[cfg(not(feature = "http"))]
    {
        Ok(std::sync::Arc::new(NoFetcher))
    }
}

/// File name for a downloaded report: the URL's last path segment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let (_, path) = path.split_once('/')?;
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fetcher_fails() {
        let err = NoFetcher.fetch("https://example.com/a.pdf").unwrap_err();
        assert!(matches!(err, Error::Fetch { url, .. } if url == "https://example.com/a.pdf"));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/docs/report-2024.pdf?x=1").as_deref(),
            Some("report-2024.pdf")
        );
        assert_eq!(
            file_name_from_url("https://example.com/docs/").as_deref(),
            Some("docs")
        );
        assert_eq!(file_name_from_url("https://example.com"), None);
    }
}
