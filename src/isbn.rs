use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IsbnError {
    #[error("ISBN is empty")]
    Empty,
    #[error("Invalid ISBN format: {0}")]
    InvalidFormat(String),
    #[error("Invalid ISBN checksum: {0}")]
    InvalidChecksum(String),
}

/// Strip everything except digits and the checksum letter, uppercasing `x`.
///
/// Returns an empty string when nothing usable is left; callers treat that as
/// "not an identifier" rather than an error.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Exactly 13 ASCII digits.
pub fn is_isbn13(s: &str) -> bool {
    s.len() == 13 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Nine ASCII digits followed by a digit or an uppercase `X`.
pub fn is_isbn10(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[..9].iter().all(|b| b.is_ascii_digit())
        && (bytes[9].is_ascii_digit() || bytes[9] == b'X')
}

/// Structural check only. The input must already be normalized.
pub fn looks_valid(s: &str) -> bool {
    is_isbn13(s) || is_isbn10(s)
}

/// Normalize, validate and de-duplicate a list of raw candidates.
///
/// Every ISBN-13 comes before every ISBN-10, and each class keeps the order in
/// which its members were first seen.
pub fn normalize_and_order<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut isbn13 = Vec::new();
    let mut isbn10 = Vec::new();

    for candidate in raw {
        let normalized = normalize(candidate.as_ref());
        if !looks_valid(&normalized) || !seen.insert(normalized.clone()) {
            continue;
        }
        if is_isbn13(&normalized) {
            isbn13.push(normalized);
        } else {
            isbn10.push(normalized);
        }
    }

    isbn13.extend(isbn10);
    isbn13
}

/// Keep only identifiers reported by at least two distinct source lists.
///
/// A list repeating an identifier still counts once. Ordering follows the same
/// ISBN-13-first rule as [`normalize_and_order`], with ties broken by the first
/// list in which the identifier appeared.
pub fn at_least_two_agree<S: AsRef<str>>(lists: &[Vec<S>]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen = Vec::new();

    for list in lists {
        for isbn in normalize_and_order(list.as_slice()) {
            let count = counts.entry(isbn.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(isbn);
            }
            *count += 1;
        }
    }

    let agreed: Vec<String> = first_seen
        .into_iter()
        .filter(|isbn| counts.get(isbn).copied().unwrap_or(0) >= 2)
        .collect();

    normalize_and_order(&agreed)
}

/// Title form used for cache keys: trimmed, whitespace collapsed, lowercased.
pub fn normalize_title_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First ISBN-13 in an ordered identifier list
pub fn first_isbn13<S: AsRef<str>>(isbns: &[S]) -> Option<String> {
    isbns
        .iter()
        .map(AsRef::as_ref)
        .find(|s| is_isbn13(s))
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsbnKind {
    Isbn10,
    Isbn13,
}

/// A checksum-verified ISBN.
///
/// The resolver's merge path only relies on the structural predicates above;
/// this type is for callers that need the stronger guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn {
    value: String,
}

impl Isbn {
    pub fn parse(s: &str) -> Result<Self, IsbnError> {
        if s.is_empty() {
            return Err(IsbnError::Empty);
        }

        let valid = if is_isbn13(s) {
            isbn13_checksum_ok(s)
        } else if is_isbn10(s) {
            isbn10_checksum_ok(s)
        } else {
            return Err(IsbnError::InvalidFormat(s.to_string()));
        };

        if valid {
            Ok(Self {
                value: s.to_string(),
            })
        } else {
            Err(IsbnError::InvalidChecksum(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> IsbnKind {
        if self.value.len() == 13 {
            IsbnKind::Isbn13
        } else {
            IsbnKind::Isbn10
        }
    }

    /// Convert to the 13-digit form, prefixing `978` and recomputing the check digit.
    pub fn to_isbn13(&self) -> Isbn {
        match self.kind() {
            IsbnKind::Isbn13 => self.clone(),
            IsbnKind::Isbn10 => {
                let mut value = format!("978{}", &self.value[..9]);
                let check = isbn13_check_digit(value.as_bytes());
                value.push(char::from(b'0' + check as u8));
                Isbn { value }
            }
        }
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Isbn {
    type Err = IsbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Isbn::parse(s)
    }
}

/// Check digit over the first twelve digits. A result of 10 maps to 0.
fn isbn13_check_digit(first_twelve: &[u8]) -> u32 {
    let sum: u32 = first_twelve
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 0 {
                digit
            } else {
                digit * 3
            }
        })
        .sum();

    let check = 10 - (sum % 10);
    if check == 10 {
        0
    } else {
        check
    }
}

fn isbn13_checksum_ok(s: &str) -> bool {
    let bytes = s.as_bytes();
    isbn13_check_digit(bytes) == u32::from(bytes[12] - b'0')
}

fn isbn10_checksum_ok(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut sum: u32 = bytes[..9]
        .iter()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * (10 - i as u32))
        .sum();

    sum += if bytes[9] == b'X' {
        10
    } else {
        u32::from(bytes[9] - b'0')
    };

    sum % 11 == 0
}
