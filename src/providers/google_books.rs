use super::{
    async_trait, get_json, http_client, lenient, lenient_seq, IsbnProvider, ProviderError,
    MAX_RESULTS,
};
use reqwest::Client;
use serde::Deserialize;

const GOOGLE_BOOKS_API_BASE: &str = "https://www.googleapis.com";

pub struct GoogleBooksProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    /// Create a provider; a blank API key is treated as no key
    pub fn new(api_key: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            base_url: GOOGLE_BOOKS_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, title: &str) -> String {
        let mut url = format!(
            "{}/books/v1/volumes?q={}&maxResults={}",
            self.base_url,
            urlencoding::encode(&format!("intitle:{}", title.trim())),
            MAX_RESULTS
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default, deserialize_with = "lenient_seq")]
    items: Option<Vec<Volume>>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default, deserialize_with = "lenient")]
    volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
struct VolumeInfo {
    #[serde(rename = "industryIdentifiers", default, deserialize_with = "lenient_seq")]
    industry_identifiers: Option<Vec<IndustryIdentifier>>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    id_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    identifier: Option<String>,
}

impl VolumeInfo {
    /// ISBN-13 identifiers first, then ISBN-10, each in listed order
    fn isbns(&self) -> Vec<String> {
        let ids = match &self.industry_identifiers {
            Some(ids) => ids,
            None => return Vec::new(),
        };

        let of_type = |wanted: &'static str| {
            ids.iter()
                .filter(move |id| id.id_type.as_deref() == Some(wanted))
                .filter_map(|id| id.identifier.as_deref())
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };

        of_type("ISBN_13").chain(of_type("ISBN_10")).collect()
    }
}

#[async_trait]
impl IsbnProvider for GoogleBooksProvider {
    fn name(&self) -> &'static str {
        "google-books"
    }

    async fn search(&self, title: &str) -> Result<Vec<String>, ProviderError> {
        let url = self.search_url(title);
        let response: VolumesResponse = get_json(&self.client, &url).await?;

        let isbns = response
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.volume_info.as_ref())
            .flat_map(VolumeInfo::isbns)
            .collect();

        Ok(isbns)
    }
}
