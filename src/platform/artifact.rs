//! Artifact access.
//!
//! Artifacts are named, platform-managed data objects (datasets, models)
//! addressable by URL. Run outputs may carry the artifact store's mounted
//! filesystem form (`/v3io/<container>/<path>`); [`to_store_url`] rewrites
//! that prefix into the `v3io://` scheme the rest of the platform accepts.
//! Fetching resolves store URLs against the artifact gateway's HTTP base.

use crate::error::ArtifactError;
use crate::platform::client::PlatformClient;

/// Mount-path prefix the artifact store exposes inside job pods.
const STORE_MOUNT_PREFIX: &str = "/v3io/";

/// URL scheme of the artifact store.
const STORE_SCHEME: &str = "v3io://";

/// Rewrites a mounted artifact path into its store-URL form.
///
/// `/v3io/projects/demo/dataset.csv` becomes
/// `v3io://projects/demo/dataset.csv`. URLs that already carry a scheme
/// pass through unchanged.
pub fn to_store_url(raw: &str) -> String {
    match raw.strip_prefix(STORE_MOUNT_PREFIX) {
        Some(rest) => format!("{}{}", STORE_SCHEME, rest),
        None => raw.to_string(),
    }
}

/// A named output resolved from a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Output key the artifact was stored under (e.g. "dataset", "model").
    pub key: String,
    /// Normalized store URL.
    pub url: String,
}

impl ArtifactRef {
    /// Creates an artifact reference.
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }

    /// Turns the reference into a fetchable [`DataItem`].
    pub fn as_data_item(&self, client: &PlatformClient) -> DataItem {
        DataItem::new(client.clone(), self.url.clone())
    }
}

/// A fetchable handle on an artifact URL.
pub struct DataItem {
    client: PlatformClient,
    url: String,
}

impl DataItem {
    /// Creates a data item for the given store or HTTP URL.
    pub fn new(client: PlatformClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The artifact URL this item points at.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves the store URL against the artifact gateway's HTTP base.
    ///
    /// `v3io://container/path` maps to `{artifact_base}/container/path`;
    /// plain http(s) URLs are used as-is.
    fn http_url(&self) -> Result<String, ArtifactError> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            return Ok(self.url.clone());
        }

        let path = self.url.strip_prefix(STORE_SCHEME).ok_or_else(|| {
            ArtifactError::InvalidStoreUrl {
                url: self.url.clone(),
                reason: format!("expected '{}' or http(s) scheme", STORE_SCHEME),
            }
        })?;

        if path.is_empty() {
            return Err(ArtifactError::InvalidStoreUrl {
                url: self.url.clone(),
                reason: "store URL has no path".to_string(),
            });
        }

        Ok(format!("{}/{}", self.client.artifact_base(), path))
    }

    /// Downloads the artifact bytes through the gateway.
    pub async fn fetch(&self) -> Result<Vec<u8>, ArtifactError> {
        let url = self.http_url()?;
        self.client
            .get_bytes(&url)
            .await
            .map_err(|e| ArtifactError::FetchFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })
    }

    /// Fetches the artifact as CSV and returns the header plus the first
    /// `n` records, for console display.
    pub async fn preview_csv(&self, n: usize) -> Result<CsvPreview, ArtifactError> {
        let bytes = self.fetch().await?;
        CsvPreview::parse(&bytes, n)
    }
}

/// Header and leading rows of a CSV artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvPreview {
    /// Column names from the header record.
    pub headers: Vec<String>,
    /// Up to `n` leading data records.
    pub rows: Vec<Vec<String>>,
}

impl CsvPreview {
    /// Parses CSV bytes, keeping the header and first `n` records.
    ///
    /// An empty body yields an empty preview.
    pub fn parse(bytes: &[u8], n: usize) -> Result<Self, ArtifactError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::with_capacity(n);
        for record in reader.records().take(n) {
            let record = record?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Whether the preview holds no data records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl std::fmt::Display for CsvPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.headers.join(", "))?;
        for row in &self.rows {
            writeln!(f, "{}", row.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;

    fn test_client() -> PlatformClient {
        PlatformClient::new(
            PlatformConfig::new("http://localhost:8080")
                .with_artifact_base("http://localhost:8081"),
        )
    }

    #[test]
    fn test_to_store_url_rewrites_mount_prefix() {
        assert_eq!(
            to_store_url("/v3io/projects/demo/dataset.csv"),
            "v3io://projects/demo/dataset.csv"
        );
    }

    #[test]
    fn test_to_store_url_passes_through_schemed() {
        assert_eq!(
            to_store_url("v3io://projects/demo/dataset.csv"),
            "v3io://projects/demo/dataset.csv"
        );
        assert_eq!(
            to_store_url("https://example.com/dataset.csv"),
            "https://example.com/dataset.csv"
        );
    }

    #[test]
    fn test_to_store_url_passes_through_other_paths() {
        assert_eq!(to_store_url("/tmp/dataset.csv"), "/tmp/dataset.csv");
    }

    #[test]
    fn test_http_url_from_store_url() {
        let item = DataItem::new(test_client(), "v3io://projects/demo/dataset.csv");
        assert_eq!(
            item.http_url().expect("resolve"),
            "http://localhost:8081/projects/demo/dataset.csv"
        );
    }

    #[test]
    fn test_http_url_passes_through_http() {
        let item = DataItem::new(test_client(), "http://elsewhere/dataset.csv");
        assert_eq!(item.http_url().expect("resolve"), "http://elsewhere/dataset.csv");
    }

    #[test]
    fn test_http_url_rejects_unknown_scheme() {
        let item = DataItem::new(test_client(), "s3://bucket/key");
        assert!(matches!(
            item.http_url(),
            Err(ArtifactError::InvalidStoreUrl { .. })
        ));
    }

    #[test]
    fn test_http_url_rejects_empty_path() {
        let item = DataItem::new(test_client(), "v3io://");
        assert!(item.http_url().is_err());
    }

    #[test]
    fn test_csv_preview_head() {
        let data = b"id,label\n1,0\n2,1\n3,0\n4,1\n";
        let preview = CsvPreview::parse(data, 2).expect("parse");
        assert_eq!(preview.headers, vec!["id", "label"]);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[0], vec!["1", "0"]);
    }

    #[test]
    fn test_csv_preview_fewer_rows_than_requested() {
        let data = b"id,label\n1,0\n";
        let preview = CsvPreview::parse(data, 5).expect("parse");
        assert_eq!(preview.rows.len(), 1);
    }

    #[test]
    fn test_csv_preview_empty_body() {
        let preview = CsvPreview::parse(b"", 5).expect("parse");
        assert!(preview.is_empty());
        assert!(preview.headers.is_empty());
    }

    #[test]
    fn test_csv_preview_display() {
        let data = b"id,label\n1,0\n";
        let preview = CsvPreview::parse(data, 1).expect("parse");
        let text = preview.to_string();
        assert!(text.starts_with("id, label\n"));
        assert!(text.contains("1, 0"));
    }

    #[test]
    fn test_artifact_ref_new() {
        let artifact = ArtifactRef::new("dataset", "v3io://projects/demo/dataset.csv");
        assert_eq!(artifact.key, "dataset");
        assert_eq!(artifact.url, "v3io://projects/demo/dataset.csv");
    }
}
