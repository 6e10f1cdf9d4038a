use super::{
    async_trait, get_json, http_client, lenient, lenient_seq, IsbnProvider, ProviderError,
    MAX_RESULTS,
};
use crate::isbn::normalize;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const OPENLIBRARY_API_BASE: &str = "https://openlibrary.org";

pub struct OpenLibraryProvider {
    client: Client,
    base_url: String,
}

impl OpenLibraryProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            base_url: OPENLIBRARY_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, deserialize_with = "lenient_seq")]
    docs: Option<Vec<Doc>>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    // Kept loose: Open Library occasionally mixes types inside this array
    #[serde(default, deserialize_with = "lenient")]
    isbn: Option<Vec<Value>>,
}

/// Collect ISBN-13s then ISBN-10s, each de-duplicated in insertion order
fn collect_isbns(docs: &[Doc]) -> Vec<String> {
    let mut isbn13: Vec<String> = Vec::new();
    let mut isbn10: Vec<String> = Vec::new();

    let raw_values = docs
        .iter()
        .filter_map(|doc| doc.isbn.as_ref())
        .flatten()
        .filter_map(Value::as_str);

    for raw in raw_values {
        let normalized = normalize(raw);
        let bucket = match normalized.len() {
            13 => &mut isbn13,
            10 => &mut isbn10,
            _ => continue,
        };
        if !bucket.contains(&normalized) {
            bucket.push(normalized);
        }
    }

    isbn13.extend(isbn10);
    isbn13
}

#[async_trait]
impl IsbnProvider for OpenLibraryProvider {
    fn name(&self) -> &'static str {
        "openlibrary"
    }

    async fn search(&self, title: &str) -> Result<Vec<String>, ProviderError> {
        let url = format!(
            "{}/search.json?title={}&limit={}&fields=isbn",
            self.base_url,
            urlencoding::encode(title.trim()),
            MAX_RESULTS
        );

        let response: SearchResponse = get_json(&self.client, &url).await?;
        Ok(collect_isbns(&response.docs.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_normalizes_dedupes_and_orders() {
        let json = r#"{
            "docs": [
                { "isbn": ["978-1-2345-6789-7", "012345678X", "garbage"] },
                { "isbn": ["9781234567890", "978-1-2345-6789-7", 42] },
                { "title": "no isbn field" }
            ]
        }"#;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("title".into(), "Domain Driven Design".into()),
                Matcher::UrlEncoded("limit".into(), "5".into()),
                Matcher::UrlEncoded("fields".into(), "isbn".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json)
            .create_async()
            .await;

        let provider = OpenLibraryProvider::new()
            .unwrap()
            .with_base_url(server.url());
        let isbns = provider.find_isbns_by_title(" Domain Driven Design ").await;

        mock.assert_async().await;
        assert_eq!(isbns, vec!["9781234567897", "9781234567890", "012345678X"]);
    }

    #[tokio::test]
    async fn test_rate_limited_yields_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(429)
            .with_body("{}")
            .create_async()
            .await;

        let provider = OpenLibraryProvider::new()
            .unwrap()
            .with_base_url(server.url());

        assert!(matches!(
            provider.search("anything").await,
            Err(ProviderError::Status(429))
        ));
        assert!(provider.find_isbns_by_title("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_docs_yields_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"numFound": 0}"#)
            .create_async()
            .await;

        let provider = OpenLibraryProvider::new()
            .unwrap()
            .with_base_url(server.url());

        assert_eq!(provider.search("anything").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_malformed_docs_do_not_hide_valid_ones() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"docs": [{"isbn": ["9780306406157"]}, {"isbn": "0306406152"}, "oops"]}"#)
            .create_async()
            .await;

        let provider = OpenLibraryProvider::new()
            .unwrap()
            .with_base_url(server.url());

        assert_eq!(
            provider.find_isbns_by_title("Domain Driven Design").await,
            vec!["9780306406157"]
        );
    }

    #[tokio::test]
    async fn test_blank_title_yields_empty() {
        let provider = OpenLibraryProvider::new().unwrap();
        assert!(provider.find_isbns_by_title("").await.is_empty());
        assert_eq!(provider.name(), "openlibrary");
    }
}
