//! Stable storage keys.
//!
//! A [`CacheKey`] turns arbitrary caller input into an identifier that is safe
//! to use as a file name or a database primary key. Hashed keys are the
//! default; verbatim keys pass the input through untouched.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Identifier for a stored value.
///
/// `value` is what engines persist and look up by; `raw_value` is the input the
/// key was derived from. Equality, hashing and ordering only look at `value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheKey {
    value: String,
    raw_value: String,
}

impl CacheKey {
    /// Hash an arbitrary string into a key.
    pub fn new(input: impl Into<String>) -> Self {
        let raw_value = input.into();
        Self { value: hashed_identifier(&raw_value), raw_value }
    }

    /// Derive a key from a URL.
    ///
    /// The scheme, a trailing slash and a leading `www.` are dropped before
    /// hashing, so `https://www.example.com/` and `http://example.com` name
    /// the same entry.
    pub fn from_url(url: &Url) -> Self {
        Self { value: hashed_identifier(&normalize_url(url)), raw_value: url.as_str().to_string() }
    }

    /// Use `value` as-is, without hashing.
    ///
    /// The caller is responsible for `value` being a valid identifier for the
    /// engine it is used with.
    pub fn verbatim(value: impl Into<String>) -> Self {
        let value = value.into();
        Self { raw_value: value.clone(), value }
    }

    /// The identifier engines store under.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The input this key was built from.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for CacheKey {
    fn from(input: &str) -> Self {
        Self::new(input)
    }
}

impl From<String> for CacheKey {
    fn from(input: String) -> Self {
        Self::new(input)
    }
}

impl From<&Url> for CacheKey {
    fn from(url: &Url) -> Self {
        Self::from_url(url)
    }
}

fn normalize_url(url: &Url) -> String {
    let serialized = url.as_str();
    let without_scheme = serialized
        .strip_prefix(url.scheme())
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(serialized);
    let without_authority_marker = without_scheme.strip_prefix("//").unwrap_or(without_scheme);
    let without_trailing_slash = without_authority_marker
        .strip_suffix('/')
        .unwrap_or(without_authority_marker);
    without_trailing_slash
        .strip_prefix("www.")
        .unwrap_or(without_trailing_slash)
        .to_string()
}

/// SHA-256 truncated to 128 bits, laid out 8-4-4-4-12 like a UUID.
fn hashed_identifier(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = hex::encode(&digest[..16]);
    format!("{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}
