use crate::isbn::first_isbn13;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Source name reported in `sources_used` when a result is served from cache
pub const CACHE_SOURCE: &str = "cache";

/// Which providers take part in a lookup and how their answers are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsbnLookupMode {
    /// Union of every configured provider
    Any,
    /// Only identifiers confirmed by at least two providers
    Both,
    GoogleOnly,
    OpenLibraryOnly,
}

/// Providers a mode selects, matched against `IsbnProvider::name`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelection {
    All,
    Only(&'static str),
}

impl IsbnLookupMode {
    pub const ALL: [IsbnLookupMode; 4] = [
        IsbnLookupMode::Any,
        IsbnLookupMode::Both,
        IsbnLookupMode::GoogleOnly,
        IsbnLookupMode::OpenLibraryOnly,
    ];

    /// Lowercase name used in cache keys
    pub fn name(&self) -> &'static str {
        match self {
            IsbnLookupMode::Any => "any",
            IsbnLookupMode::Both => "both",
            IsbnLookupMode::GoogleOnly => "google_only",
            IsbnLookupMode::OpenLibraryOnly => "openlibrary_only",
        }
    }

    pub fn selection(&self) -> ProviderSelection {
        match self {
            IsbnLookupMode::Any | IsbnLookupMode::Both => ProviderSelection::All,
            IsbnLookupMode::GoogleOnly => ProviderSelection::Only("google-books"),
            IsbnLookupMode::OpenLibraryOnly => ProviderSelection::Only("openlibrary"),
        }
    }

    pub fn requires_agreement(&self) -> bool {
        matches!(self, IsbnLookupMode::Both)
    }
}

impl fmt::Display for IsbnLookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown lookup mode '{0}' (expected any, both, google-only or openlibrary-only)")]
pub struct ParseModeError(String);

impl FromStr for IsbnLookupMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        IsbnLookupMode::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

/// Consolidated answer for one title lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    title_searched: String,
    mode: IsbnLookupMode,
    all_isbns: Vec<String>,
    primary_isbn13: Option<String>,
    sources_used: BTreeSet<String>,
    cached: bool,
}

impl LookupResult {
    /// Result computed from provider output
    pub fn fresh(
        title: &str,
        mode: IsbnLookupMode,
        all_isbns: Vec<String>,
        sources_used: BTreeSet<String>,
    ) -> Self {
        Self {
            title_searched: title.to_string(),
            mode,
            primary_isbn13: first_isbn13(&all_isbns),
            all_isbns,
            sources_used,
            cached: false,
        }
    }

    /// Result restored from a cache entry
    pub fn from_cache(title: &str, mode: IsbnLookupMode, all_isbns: Vec<String>) -> Self {
        Self {
            title_searched: title.to_string(),
            mode,
            primary_isbn13: first_isbn13(&all_isbns),
            all_isbns,
            sources_used: BTreeSet::from([CACHE_SOURCE.to_string()]),
            cached: true,
        }
    }

    pub fn title_searched(&self) -> &str {
        &self.title_searched
    }

    pub fn mode(&self) -> IsbnLookupMode {
        self.mode
    }

    pub fn all_isbns(&self) -> &[String] {
        &self.all_isbns
    }

    pub fn primary_isbn13(&self) -> Option<&str> {
        self.primary_isbn13.as_deref()
    }

    pub fn sources_used(&self) -> &BTreeSet<String> {
        &self.sources_used
    }

    pub fn cached(&self) -> bool {
        self.cached
    }

    pub fn is_empty(&self) -> bool {
        self.all_isbns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("any".parse::<IsbnLookupMode>(), Ok(IsbnLookupMode::Any));
        assert_eq!("BOTH".parse::<IsbnLookupMode>(), Ok(IsbnLookupMode::Both));
        assert_eq!(
            "google-only".parse::<IsbnLookupMode>(),
            Ok(IsbnLookupMode::GoogleOnly)
        );
        assert_eq!(
            "OPENLIBRARY_ONLY".parse::<IsbnLookupMode>(),
            Ok(IsbnLookupMode::OpenLibraryOnly)
        );
        assert!("all".parse::<IsbnLookupMode>().is_err());
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(IsbnLookupMode::Any.selection(), ProviderSelection::All);
        assert_eq!(IsbnLookupMode::Both.selection(), ProviderSelection::All);
        assert_eq!(
            IsbnLookupMode::GoogleOnly.selection(),
            ProviderSelection::Only("google-books")
        );
        assert!(IsbnLookupMode::Both.requires_agreement());
        assert!(!IsbnLookupMode::OpenLibraryOnly.requires_agreement());
    }

    #[test]
    fn test_cached_result_reports_cache_source() {
        let result = LookupResult::from_cache(
            "Clean Code",
            IsbnLookupMode::Any,
            vec!["0306406152".to_string(), "9780306406157".to_string()],
        );

        assert!(result.cached());
        assert_eq!(result.primary_isbn13(), Some("9780306406157"));
        assert!(result.sources_used().contains(CACHE_SOURCE));
    }

    #[test]
    fn test_serializes_mode_in_upper_case() {
        let result =
            LookupResult::fresh("Refactoring", IsbnLookupMode::GoogleOnly, vec![], BTreeSet::new());
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["mode"], "GOOGLE_ONLY");
        assert_eq!(json["primary_isbn13"], serde_json::Value::Null);
        assert_eq!(json["cached"], false);
    }
}
