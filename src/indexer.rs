use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use url::Url;

use crate::{
    corpus::Corpus,
    doc_id::DocumentId,
    error::Result,
    models::{
        Bias,
        Document,
        DocumentInput,
        Domain,
        DomainPolicy,
        SourceType,
        parse_published_at,
    },
    policy::{PolicyRegistry, normalize_domain},
    ranking::term_frequencies,
    settings::SNIPPET_CHARS,
    text_util::make_snippet,
    tokenizer::tokenize,
};

/// Why a single document of a batch was not indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum RejectReason {
    MissingUrl,
    InvalidUrl(String),
    MissingTitle,
    MissingContent,
    MissingSourceType,
    InvalidSourceType(String),
    InvalidBias(String),
    NoIndexableTerms,
    /// The entry could not be decoded as a document at all.
    Malformed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUrl => f.write_str("missing url"),
            Self::InvalidUrl(url) => write!(f, "invalid url: {url}"),
            Self::MissingTitle => f.write_str("missing title"),
            Self::MissingContent => f.write_str("missing content"),
            Self::MissingSourceType => f.write_str("missing sourceType"),
            Self::InvalidSourceType(v) => write!(f, "invalid sourceType: {v}"),
            Self::InvalidBias(v) => write!(f, "invalid bias: {v}"),
            Self::NoIndexableTerms => f.write_str("content has no index terms"),
            Self::Malformed(e) => write!(f, "malformed document: {e}"),
        }
    }
}

/// A rejected entry, identified by its position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub position: usize,
    pub url: Option<String>,
    pub reason: RejectReason,
}

/// Outcome of a `bulk_index` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Documents stored (including replacements of an existing URL).
    pub indexed: usize,
    /// Documents silently skipped because their domain is blocked.
    pub blocked: usize,
    pub rejected: Vec<Rejection>,
}

enum Prepared {
    Ready(Document),
    Blocked,
    Rejected(Rejection),
}

/// Normalize a submitted URL and extract its host.
///
/// The domain is always derived from the URL itself; no caller-supplied
/// domain is trusted.
pub fn normalize_url(raw: &str) -> std::result::Result<(String, String), RejectReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RejectReason::MissingUrl);
    }
    let mut url = Url::parse(trimmed)
        .map_err(|_| RejectReason::InvalidUrl(trimmed.to_string()))?;
    let host = url
        .host_str()
        .map(normalize_domain)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| RejectReason::InvalidUrl(trimmed.to_string()))?;
    url.set_fragment(None);
    Ok((url.to_string(), host))
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Validates document batches and applies them to the corpus.
pub struct Indexer {
    registry: Arc<PolicyRegistry>,
    corpus: Arc<Corpus>,
    snippet_chars: usize,
}

impl Indexer {
    pub fn new(registry: Arc<PolicyRegistry>, corpus: Arc<Corpus>) -> Self {
        Self {
            registry,
            corpus,
            snippet_chars: SNIPPET_CHARS,
        }
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    /// Index a batch into the in-memory corpus.
    pub fn bulk_index(&self, documents: &[DocumentInput]) -> IndexReport {
        // The no-op persister cannot fail.
        self.bulk_index_with(documents, |_, _| Ok(()))
            .unwrap_or_default()
    }

    /// Index a batch, handing the accepted documents and the records of
    /// domains seen for the first time to `persist` before they become
    /// visible.
    ///
    /// Unseen domains are registered with the default `Index` policy. The
    /// whole batch is applied under one corpus write lock. If `persist`
    /// fails neither the corpus nor the registry changes and the error is
    /// returned.
    pub fn bulk_index_with<F>(
        &self,
        documents: &[DocumentInput],
        persist: F,
    ) -> Result<IndexReport>
    where
        F: FnOnce(&[Document], &[Domain]) -> Result<()>,
    {
        // Validation and tokenization run in parallel outside the lock.
        let prepared: Vec<Prepared> = documents
            .par_iter()
            .enumerate()
            .map(|(position, input)| self.prepare(position, input))
            .collect();

        let mut report = IndexReport::default();
        let mut state = self.corpus.write();

        let mut ready = Vec::with_capacity(prepared.len());
        for item in prepared {
            match item {
                // Re-checked under the lock so a block issued mid-batch wins.
                Prepared::Ready(doc)
                    if self.registry.policy_for(&doc.domain)
                        == DomainPolicy::Block =>
                {
                    report.blocked += 1;
                }
                Prepared::Ready(doc) => ready.push(doc),
                Prepared::Blocked => report.blocked += 1,
                Prepared::Rejected(rejection) => {
                    tracing::debug!(
                        position = rejection.position,
                        reason = %rejection.reason,
                        "rejected document"
                    );
                    report.rejected.push(rejection);
                }
            }
        }

        let mut new_domains: BTreeMap<&str, Domain> = BTreeMap::new();
        for doc in &ready {
            if !new_domains.contains_key(doc.domain.as_str())
                && self.registry.get(&doc.domain).is_none()
            {
                new_domains.insert(
                    &doc.domain,
                    Domain::new(&doc.domain, DomainPolicy::Index),
                );
            }
        }
        let new_domains: Vec<Domain> = new_domains.into_values().collect();

        persist(&ready, &new_domains)?;

        for domain in new_domains {
            tracing::debug!(domain = %domain.name, "registered domain");
            self.registry.insert(domain);
        }
        for doc in ready {
            if let Some(previous) = state.upsert(doc) {
                tracing::debug!(url = %previous.url, "replaced document");
            }
            report.indexed += 1;
        }
        drop(state);

        tracing::info!(
            indexed = report.indexed,
            blocked = report.blocked,
            rejected = report.rejected.len(),
            "bulk index complete"
        );
        Ok(report)
    }

    fn prepare(&self, position: usize, input: &DocumentInput) -> Prepared {
        let reject = |reason: RejectReason| {
            Prepared::Rejected(Rejection {
                position,
                url: input.url.clone(),
                reason,
            })
        };

        let Some(raw_url) = non_blank(input.url.as_ref()) else {
            return reject(RejectReason::MissingUrl);
        };
        let (url, domain_name) = match normalize_url(raw_url) {
            Ok(parts) => parts,
            Err(reason) => return reject(reason),
        };

        let domain = self.registry.resolve(&domain_name);
        if domain.policy == DomainPolicy::Block {
            return Prepared::Blocked;
        }

        let Some(content) = non_blank(input.content.as_ref()) else {
            return reject(RejectReason::MissingContent);
        };
        let Some(title) = non_blank(input.title.as_ref()) else {
            return reject(RejectReason::MissingTitle);
        };
        let source_type = match non_blank(input.source_type.as_ref()) {
            None => return reject(RejectReason::MissingSourceType),
            Some(raw) => match raw.parse::<SourceType>() {
                Ok(st) => st,
                Err(_) => {
                    return reject(RejectReason::InvalidSourceType(
                        raw.to_string(),
                    ));
                }
            },
        };
        let bias = match non_blank(input.bias.as_ref()) {
            None => Bias::Na,
            Some(raw) => match raw.parse::<Bias>() {
                Ok(bias) => bias,
                Err(_) => {
                    return reject(RejectReason::InvalidBias(raw.to_string()));
                }
            },
        };

        let tokens = tokenize(content);
        if tokens.is_empty() {
            return reject(RejectReason::NoIndexableTerms);
        }

        let published_at = input.published_at.as_deref().and_then(parse_published_at);
        let author = non_blank(input.author.as_ref()).map(str::to_string);
        let id = DocumentId::from_url(&url);

        Prepared::Ready(Document {
            id: id.hex,
            numeric_id: id.numeric,
            title: title.to_string(),
            url,
            domain: domain.name,
            source_type,
            bias: if bias == Bias::Na { domain.bias } else { bias },
            cred_score: domain.base_cred,
            has_author: author.is_some(),
            has_date: published_at.is_some(),
            published_at,
            author,
            snippet: make_snippet(content, self.snippet_chars),
            content: content.to_string(),
            term_frequencies: term_frequencies(&tokens),
            indexed_at: Utc::now(),
        })
    }
}
