pub use async_trait::async_trait;

pub mod google_books;
pub mod openlibrary;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on establishing a connection to a provider
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on a whole provider request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
/// Results requested from a provider per lookup
pub const MAX_RESULTS: usize = 5;

const USER_AGENT: &str = concat!("isbnres/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Provider returned HTTP {0}")]
    Status(u16),
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// A bibliographic source that maps a title to candidate ISBNs
#[async_trait]
pub trait IsbnProvider: Send + Sync {
    /// Stable lowercase, hyphenated identifier used for mode selection and cache keys
    fn name(&self) -> &'static str;

    /// Query the source, surfacing every failure
    async fn search(&self, title: &str) -> Result<Vec<String>, ProviderError>;

    /// Raw candidates in the source's preferred order.
    ///
    /// Never fails: a blank title, a transport error, a non-success status or
    /// a malformed payload all yield an empty list.
    async fn find_isbns_by_title(&self, title: &str) -> Vec<String> {
        if title.trim().is_empty() {
            return Vec::new();
        }

        match self.search(title).await {
            Ok(isbns) => {
                tracing::debug!(provider = self.name(), count = isbns.len(), "lookup finished");
                isbns
            }
            Err(e) => {
                tracing::debug!(provider = self.name(), error = %e, "lookup failed");
                Vec::new()
            }
        }
    }
}

/// HTTP client shared by the built-in providers
fn http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}

/// Fetch `url` and decode a JSON body, mapping non-success statuses to errors
async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, ProviderError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status.as_u16()));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Field of an unexpected shape reads as absent instead of failing the body
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Array field whose malformed elements are skipped; a non-array reads as absent
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl IsbnProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn search(&self, _title: &str) -> Result<Vec<String>, ProviderError> {
            Err(ProviderError::Status(503))
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl IsbnProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn search(&self, title: &str) -> Result<Vec<String>, ProviderError> {
            Ok(vec![title.to_string()])
        }
    }

    #[derive(Debug, Deserialize)]
    struct Shelf {
        #[serde(default, deserialize_with = "lenient")]
        label: Option<String>,
        #[serde(default, deserialize_with = "lenient_seq")]
        codes: Option<Vec<String>>,
    }

    #[test]
    fn test_lenient_fields_tolerate_wrong_shapes() {
        let shelf: Shelf = serde_json::from_str(r#"{"label": 7, "codes": ["a", 1, "b"]}"#).unwrap();
        assert_eq!(shelf.label, None);
        assert_eq!(shelf.codes, Some(vec!["a".to_string(), "b".to_string()]));

        let shelf: Shelf = serde_json::from_str(r#"{"codes": "oops"}"#).unwrap();
        assert_eq!(shelf.label, None);
        assert_eq!(shelf.codes, None);
    }

    #[tokio::test]
    async fn test_errors_degrade_to_empty() {
        assert!(FailingProvider.find_isbns_by_title("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_skips_search() {
        assert!(EchoProvider.find_isbns_by_title("   ").await.is_empty());
        assert_eq!(
            EchoProvider.find_isbns_by_title("9780306406157").await,
            vec!["9780306406157"]
        );
    }
}
