use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    str::FromStr,
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    corpus::Corpus,
    doc_id::short_form,
    error::{Error, Result},
    models::{Bias, Document, SourceType},
    policy::{PolicyRegistry, normalize_domain},
    ranking::{Idf, Similarity, cosine_with_breakdown, term_frequencies, tfidf},
    settings::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    tokenizer::tokenize,
};

/// Exact-match and range filters applied before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub bias: Option<Bias>,
    pub source_type: Option<SourceType>,
    pub domain: Option<String>,
    /// Minimum document credibility, inclusive.
    pub min_cred: Option<u8>,
    /// Earliest publication date, inclusive.
    pub from: Option<DateTime<Utc>>,
    /// Latest publication date, inclusive.
    pub to: Option<DateTime<Utc>>,
}

impl SearchFilters {
    pub fn matches(&self, doc: &Document) -> bool {
        self.bias.is_none_or(|bias| doc.bias == bias)
            && self.source_type.is_none_or(|st| doc.source_type == st)
            && self
                .domain
                .as_deref()
                .is_none_or(|domain| normalize_domain(domain) == doc.domain)
            && self.min_cred.is_none_or(|min| doc.cred_score >= min)
            && self
                .from
                .is_none_or(|from| doc.published_at.is_some_and(|p| p >= from))
            && self
                .to
                .is_none_or(|to| doc.published_at.is_some_and(|p| p <= to))
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Score descending, then newest, then URL.
    #[default]
    Relevance,
    /// Newest first.
    Recency,
    /// Highest credibility first.
    Credibility,
    /// Domain name ascending.
    Domain,
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "recency" => Ok(Self::Recency),
            "credibility" => Ok(Self::Credibility),
            "domain" => Ok(Self::Domain),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort mode: {other}"
            ))),
        }
    }
}

/// A search request. `page` and `page_size` default to 1 and the
/// configured page size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub filters: SearchFilters,
    pub sort: SortMode,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }
}

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub source_type: SourceType,
    pub bias: Bias,
    pub cred_score: u8,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub snippet: String,
    /// Cosine similarity between the query and the document, in `[0, 1]`.
    pub score: f64,
    /// Per-term contribution; the values sum to `score`.
    pub score_breakdown: BTreeMap<String, f64>,
}

impl SearchResult {
    fn new(doc: &Document, similarity: Similarity) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            url: doc.url.clone(),
            domain: doc.domain.clone(),
            source_type: doc.source_type,
            bias: doc.bias,
            cred_score: doc.cred_score,
            published_at: doc.published_at,
            author: doc.author.clone(),
            snippet: doc.snippet.clone(),
            score: similarity.score,
            score_breakdown: similarity.breakdown,
        }
    }
}

/// Counts over the whole matched set, before pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub domains: BTreeMap<String, usize>,
    pub bias: BTreeMap<String, usize>,
    pub source_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    /// Size of the full matched set.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub took_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub facets: Facets,
    pub meta: SearchMeta,
}

struct Scored<'a> {
    doc: &'a Document,
    similarity: Similarity,
}

fn newest_first(a: &Document, b: &Document) -> Ordering {
    // `None < Some`, so undated documents sort last.
    b.published_at.cmp(&a.published_at)
}

fn relevance_order(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.similarity
        .score
        .total_cmp(&a.similarity.score)
        .then_with(|| newest_first(a.doc, b.doc))
        .then_with(|| a.doc.url.cmp(&b.doc.url))
}

fn order_for(sort: SortMode, a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    match sort {
        SortMode::Relevance => relevance_order(a, b),
        SortMode::Recency => newest_first(a.doc, b.doc)
            .then_with(|| relevance_order(a, b)),
        SortMode::Credibility => b
            .doc
            .cred_score
            .cmp(&a.doc.cred_score)
            .then_with(|| relevance_order(a, b)),
        SortMode::Domain => a
            .doc
            .domain
            .cmp(&b.doc.domain)
            .then_with(|| relevance_order(a, b)),
    }
}

fn build_facets(matched: &[Scored<'_>]) -> Facets {
    let mut facets = Facets::default();
    for item in matched {
        *facets.domains.entry(item.doc.domain.clone()).or_insert(0) += 1;
        *facets
            .bias
            .entry(item.doc.bias.as_str().to_string())
            .or_insert(0) += 1;
        *facets
            .source_type
            .entry(item.doc.source_type.as_str().to_string())
            .or_insert(0) += 1;
    }
    facets
}

/// Runs queries against the shared corpus, honouring domain policies.
pub struct QueryEngine {
    registry: Arc<PolicyRegistry>,
    corpus: Arc<Corpus>,
    default_page_size: usize,
    max_page_size: usize,
}

impl QueryEngine {
    pub fn new(registry: Arc<PolicyRegistry>, corpus: Arc<Corpus>) -> Self {
        Self {
            registry,
            corpus,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_sizes(
        mut self,
        default_page_size: usize,
        max_page_size: usize,
    ) -> Self {
        self.default_page_size = default_page_size.max(1);
        self.max_page_size = max_page_size.max(self.default_page_size);
        self
    }

    /// Execute the search pipeline.
    ///
    /// 1. Tokenize the query (no terms matches nothing)
    /// 2. Keep documents whose domain is searchable and that pass filters
    /// 3. Score by TF-IDF cosine similarity, dropping zero scores
    /// 4. Sort, count facets over the full set, then paginate
    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        let started = Instant::now();
        let page = request.page.unwrap_or(1).max(1);
        let page_size = request
            .page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);

        let terms = tokenize(&request.query);
        let state = self.corpus.read();
        let idf = Idf::from_corpus(&state);
        let query_vector = tfidf(&term_frequencies(&terms), &idf);

        let mut matched: Vec<Scored<'_>> = if query_vector.is_empty() {
            Vec::new()
        } else {
            let mut searchable: HashMap<&str, bool> = HashMap::new();
            let candidates: Vec<&Document> = state
                .documents()
                .filter(|&doc| {
                    *searchable.entry(doc.domain.as_str()).or_insert_with(|| {
                        self.registry.policy_for(&doc.domain).is_searchable()
                    })
                })
                .filter(|doc| request.filters.matches(doc))
                .collect();

            candidates
                .par_iter()
                .filter_map(|&doc| {
                    let doc_vector = tfidf(&doc.term_frequencies, &idf);
                    let similarity =
                        cosine_with_breakdown(&query_vector, &doc_vector);
                    (similarity.score > 0.0).then_some(Scored {
                        doc,
                        similarity,
                    })
                })
                .collect()
        };

        matched.sort_by(|a, b| order_for(request.sort, a, b));
        let facets = build_facets(&matched);
        let total = matched.len();

        let results: Vec<SearchResult> = matched
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(|item| SearchResult::new(item.doc, item.similarity))
            .collect();
        drop(state);

        let took_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            took_ms,
            q_len = request.query.len(),
            terms = terms.len(),
            results = results.len(),
            total,
            page,
            page_size,
            sort = ?request.sort,
            "search.completed"
        );

        SearchResponse {
            results,
            facets,
            meta: SearchMeta {
                total,
                page,
                page_size,
                took_ms,
            },
        }
    }
}

/// Format results for human-readable terminal output.
pub fn format_human(response: &SearchResponse) {
    if response.results.is_empty() {
        println!("No results found.");
        return;
    }

    let offset = (response.meta.page - 1) * response.meta.page_size;
    for (i, r) in response.results.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] {} #{}",
            offset + i + 1,
            r.score,
            r.url,
            short_form(&r.id)
        );
        if !r.title.is_empty() {
            println!("     {}", r.title);
        }
        println!(
            "     {} · {} · {} · cred {}",
            r.domain, r.source_type, r.bias, r.cred_score
        );
    }

    println!(
        "\n{} of {} result(s), page {}",
        response.results.len(),
        response.meta.total,
        response.meta.page
    );
    let domains: Vec<String> = response
        .facets
        .domains
        .iter()
        .map(|(name, count)| format!("{name} ({count})"))
        .collect();
    println!("Domains: {}", domains.join(", "));
    let bias: Vec<String> = response
        .facets
        .bias
        .iter()
        .map(|(value, count)| format!("{value} ({count})"))
        .collect();
    println!("Bias: {}", bias.join(", "));
}

/// Format results as JSON output.
pub fn format_json(response: &SearchResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}
