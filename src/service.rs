//! The `Roadview` facade wiring the registry, corpus, indexer, query
//! engine and optional store together.
//!
//! Lock order is always corpus first, then registry. Both the indexer and
//! domain upserts follow it, so a block issued during a batch is applied
//! either entirely before or entirely after that batch.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::{
    corpus::Corpus,
    error::{Error, Result},
    indexer::{IndexReport, Indexer, RejectReason, Rejection},
    models::{Bias, DocumentInput, Domain, DomainPolicy},
    policy::{PolicyRegistry, normalize_domain},
    search::{QueryEngine, SearchRequest, SearchResponse},
    settings::Settings,
    store_db::StoreDb,
};

/// Counters reported by `roadview status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub document_count: usize,
    pub domain_count: usize,
    pub term_count: usize,
}

/// Partial update of a domain record. Unset fields keep their current
/// value, or the default for a new domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainUpdate {
    pub policy: Option<DomainPolicy>,
    pub bias: Option<Bias>,
    pub base_cred: Option<u8>,
    pub display_name: Option<String>,
}

/// Split a submitted batch into its entries.
///
/// Accepts `{"docs": [...]}` or a bare array.
pub fn batch_entries(payload: Value) -> Result<Vec<Value>> {
    match payload {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove("docs") {
            Some(Value::Array(entries)) => Ok(entries),
            _ => Err(Error::InvalidArgument(
                "expected a \"docs\" array".into(),
            )),
        },
        _ => Err(Error::InvalidArgument(
            "expected a JSON array or an object with a \"docs\" array".into(),
        )),
    }
}

pub struct Roadview {
    registry: Arc<PolicyRegistry>,
    corpus: Arc<Corpus>,
    indexer: Indexer,
    engine: QueryEngine,
    store: Option<StoreDb>,
    settings: Settings,
}

impl Roadview {
    /// A service without persistence.
    pub fn in_memory() -> Self {
        Self::assemble(
            PolicyRegistry::new(),
            Corpus::new(),
            None,
            Settings::default(),
        )
    }

    /// Load domains, documents and settings from `store`.
    pub fn open(store: StoreDb) -> Result<Self> {
        let settings = Settings::load(&store)?;
        let domains = store.list_domains()?;
        let documents = store.list_documents()?;
        tracing::debug!(
            domains = domains.len(),
            documents = documents.len(),
            "loaded store"
        );

        Ok(Self::assemble(
            PolicyRegistry::with_domains(domains),
            Corpus::from_documents(documents),
            Some(store),
            settings,
        ))
    }

    fn assemble(
        registry: PolicyRegistry,
        corpus: Corpus,
        store: Option<StoreDb>,
        settings: Settings,
    ) -> Self {
        let registry = Arc::new(registry);
        let corpus = Arc::new(corpus);
        let indexer = Indexer::new(Arc::clone(&registry), Arc::clone(&corpus))
            .with_snippet_chars(settings.snippet_chars);
        let engine = QueryEngine::new(Arc::clone(&registry), Arc::clone(&corpus))
            .with_page_sizes(settings.default_page_size, settings.max_page_size);
        Self {
            registry,
            corpus,
            indexer,
            engine,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn store(&self) -> Option<&StoreDb> {
        self.store.as_ref()
    }

    /// Validate and index a batch. Per-document problems are reported in
    /// the returned `IndexReport`; only a store failure is an error.
    pub fn bulk_index(&self, documents: &[DocumentInput]) -> Result<IndexReport> {
        match &self.store {
            Some(store) => self
                .indexer
                .bulk_index_with(documents, |ready, new_domains| {
                    store.put_documents(ready, new_domains)
                }),
            None => Ok(self.indexer.bulk_index(documents)),
        }
    }

    /// Index raw JSON entries, rejecting the ones that do not decode as a
    /// document without affecting the rest of the batch.
    pub fn bulk_index_values(&self, values: Vec<Value>) -> Result<IndexReport> {
        let mut positions = Vec::with_capacity(values.len());
        let mut inputs = Vec::with_capacity(values.len());
        let mut malformed = Vec::new();

        for (position, value) in values.into_iter().enumerate() {
            let url = value
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string);
            match serde_json::from_value::<DocumentInput>(value) {
                Ok(input) => {
                    positions.push(position);
                    inputs.push(input);
                }
                Err(e) => malformed.push(Rejection {
                    position,
                    url,
                    reason: RejectReason::Malformed(e.to_string()),
                }),
            }
        }

        let mut report = self.bulk_index(&inputs)?;
        for rejection in &mut report.rejected {
            rejection.position = positions[rejection.position];
        }
        report.rejected.extend(malformed);
        report.rejected.sort_by_key(|r| r.position);
        Ok(report)
    }

    /// Insert or replace a domain record. Last write wins.
    ///
    /// Blocking a domain also purges its stored documents. Returns the
    /// stored record and whether the domain was newly created.
    pub fn upsert_domain(&self, domain: Domain) -> Result<(Domain, bool)> {
        let name = domain.name.clone();
        self.write_domain(&name, |_| domain)
    }

    /// Apply a partial update on top of the current record for `name`.
    ///
    /// The current record is read under the same lock as the write, so a
    /// concurrent update of another field is never overwritten.
    pub fn update_domain(
        &self,
        name: &str,
        update: DomainUpdate,
    ) -> Result<(Domain, bool)> {
        self.write_domain(name, |current| {
            let mut domain = current
                .unwrap_or_else(|| Domain::new(name, DomainPolicy::Index));
            if let Some(policy) = update.policy {
                domain.policy = policy;
            }
            if let Some(bias) = update.bias {
                domain.bias = bias;
            }
            if let Some(base_cred) = update.base_cred {
                domain.base_cred = base_cred;
            }
            if let Some(display_name) = update.display_name {
                domain.display_name = Some(display_name);
            }
            domain
        })
    }

    /// Build the new record for `name` from the current one and store it,
    /// all under the corpus write lock.
    fn write_domain<F>(&self, name: &str, build: F) -> Result<(Domain, bool)>
    where
        F: FnOnce(Option<Domain>) -> Domain,
    {
        let name = normalize_domain(name);
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "domain name must not be empty".into(),
            ));
        }

        let mut state = self.corpus.write();
        let mut domain = build(self.registry.get(&name));
        domain.name = name;
        domain.base_cred = domain.base_cred.min(100);
        domain.updated_at = Utc::now();

        let purge = if domain.policy == DomainPolicy::Block {
            state.domain_document_ids(&domain.name)
        } else {
            Vec::new()
        };

        if let Some(store) = &self.store {
            if purge.is_empty() {
                store.put_domain(&domain)?;
            } else {
                store.put_domain_removing_documents(&domain, &purge)?;
            }
        }

        let (stored, created) = self.registry.insert(domain);
        for id in &purge {
            state.remove(*id);
        }
        drop(state);

        tracing::info!(
            domain = %stored.name,
            policy = %stored.policy,
            created,
            purged = purge.len(),
            "domain upserted"
        );
        Ok((stored, created))
    }

    /// Set only the policy of `name`.
    pub fn set_policy(
        &self,
        name: &str,
        policy: DomainPolicy,
    ) -> Result<(Domain, bool)> {
        self.update_domain(
            name,
            DomainUpdate {
                policy: Some(policy),
                ..DomainUpdate::default()
            },
        )
    }

    /// Policy for `domain`, `Index` when it was never registered.
    pub fn policy_for(&self, domain: &str) -> DomainPolicy {
        self.registry.policy_for(domain)
    }

    pub fn domain(&self, name: &str) -> Result<Domain> {
        self.registry.get(name).ok_or_else(|| Error::NotFound {
            kind: "domain",
            name: normalize_domain(name),
        })
    }

    pub fn list_domains(&self) -> Vec<Domain> {
        self.registry.list()
    }

    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        self.engine.search(request)
    }

    /// Number of stored documents containing `term`, hidden ones included.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.corpus.read().document_frequency(term)
    }

    pub fn stats(&self) -> Stats {
        let corpus = self.corpus.stats();
        Stats {
            document_count: corpus.document_count,
            domain_count: self.registry.len(),
            term_count: corpus.term_count,
        }
    }
}
