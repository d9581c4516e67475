//! Data model shared by the indexer, the corpus and the query engine.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Term → occurrence count for a single document.
pub type TermFrequencies = HashMap<String, u32>;

/// Default credibility assigned to domains that never set one.
pub const DEFAULT_BASE_CRED: u8 = 50;

/// Per-domain access policy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DomainPolicy {
    /// Indexed and searchable.
    #[default]
    Index,
    /// Indexed (counted in corpus statistics) but never returned by search.
    Noindex,
    /// Rejected at ingestion.
    Block,
}

impl DomainPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Noindex => "noindex",
            Self::Block => "block",
        }
    }

    /// Whether documents under this policy may appear in search results.
    pub fn is_searchable(self) -> bool {
        matches!(self, Self::Index)
    }
}

impl FromStr for DomainPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "noindex" => Ok(Self::Noindex),
            "block" => Ok(Self::Block),
            other => Err(Error::InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for DomainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of publication a document comes from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    News,
    Blog,
    Gov,
    Edu,
    Wiki,
    Forum,
    Other,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Blog => "blog",
            Self::Gov => "gov",
            Self::Edu => "edu",
            Self::Wiki => "wiki",
            Self::Forum => "forum",
            Self::Other => "other",
        }
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(Self::News),
            "blog" => Ok(Self::Blog),
            "gov" => Ok(Self::Gov),
            "edu" => Ok(Self::Edu),
            "wiki" => Ok(Self::Wiki),
            "forum" => Ok(Self::Forum),
            "other" => Ok(Self::Other),
            other => Err(Error::InvalidArgument(format!(
                "unknown source type: {other}"
            ))),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Political leaning attributed to a document or domain.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Left,
    Center,
    Right,
    #[default]
    Na,
}

impl Bias {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Na => "na",
        }
    }
}

impl FromStr for Bias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            "na" | "" => Ok(Self::Na),
            other => {
                Err(Error::InvalidArgument(format!("unknown bias: {other}")))
            }
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered domain and its access policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Lowercased host name; unique key.
    pub name: String,
    pub display_name: Option<String>,
    /// Bias inherited by documents submitted without one.
    pub bias: Bias,
    /// Credibility score in `0..=100`, copied onto every ingested document.
    pub base_cred: u8,
    pub policy: DomainPolicy,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// A domain with default attributes and the given policy.
    pub fn new(name: &str, policy: DomainPolicy) -> Self {
        Self {
            name: crate::policy::normalize_domain(name),
            display_name: None,
            bias: Bias::Na,
            base_cred: DEFAULT_BASE_CRED,
            policy,
            updated_at: Utc::now(),
        }
    }

    pub fn with_bias(mut self, bias: Bias) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_base_cred(mut self, base_cred: u8) -> Self {
        self.base_cred = base_cred.min(100);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// A document as submitted to `bulk_index`.
///
/// Every field is optional at the type level so that a malformed entry can
/// be rejected on its own instead of failing the whole batch.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub title: Option<String>,
    pub url: Option<String>,
    /// One of news, blog, gov, edu, wiki, forum, other.
    pub source_type: Option<String>,
    pub content: Option<String>,
    /// One of left, center, right, na.
    pub bias: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub published_at: Option<String>,
    pub author: Option<String>,
}

impl DocumentInput {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source_type: SourceType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            source_type: Some(source_type.as_str().to_string()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_bias(mut self, bias: Bias) -> Self {
        self.bias = Some(bias.as_str().to_string());
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// A document held by the corpus.
///
/// Term frequencies are derived at ingest and never edited in place; a
/// re-index replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full 16-digit hex form of the URL-derived id.
    pub id: String,
    pub numeric_id: u64,
    pub title: String,
    /// Normalized URL; unique key.
    pub url: String,
    /// Host extracted from `url`.
    pub domain: String,
    pub source_type: SourceType,
    pub bias: Bias,
    pub cred_score: u8,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub content: String,
    pub snippet: String,
    pub has_author: bool,
    pub has_date: bool,
    pub term_frequencies: TermFrequencies,
    pub indexed_at: DateTime<Utc>,
}

/// Parse a loosely formatted publication date.
///
/// Returns `None` for anything unparseable; a bad date never rejects a
/// document.
pub fn parse_published_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
