//! In-memory corpus: documents keyed by numeric id plus the corpus-wide
//! document frequency table.
//!
//! Every mutation keeps `document_frequency[t] <= document_count` for all
//! terms: a replaced document has its old term set subtracted before the
//! new one is added, and terms whose frequency drops to zero are removed.

use std::collections::HashMap;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;

use crate::models::Document;

/// Snapshot of corpus-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStats {
    pub document_count: usize,
    pub term_count: usize,
}

#[derive(Debug, Default)]
pub struct CorpusState {
    documents: HashMap<u64, Document>,
    by_url: HashMap<String, u64>,
    document_frequency: HashMap<String, u32>,
}

impl CorpusState {
    /// Store `document`, replacing any document with the same URL.
    ///
    /// Returns the replaced document, if any.
    pub fn upsert(&mut self, document: Document) -> Option<Document> {
        let previous = self
            .by_url
            .get(&document.url)
            .copied()
            .and_then(|id| self.remove(id));

        for term in document.term_frequencies.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.by_url.insert(document.url.clone(), document.numeric_id);
        if let Some(collided) =
            self.documents.insert(document.numeric_id, document)
        {
            // Same id under another URL: drop the stale record's stats too.
            self.by_url.remove(&collided.url);
            self.subtract_terms(&collided);
        }

        previous
    }

    /// Remove a document and its document frequency contribution.
    pub fn remove(&mut self, numeric_id: u64) -> Option<Document> {
        let document = self.documents.remove(&numeric_id)?;
        self.by_url.remove(&document.url);
        self.subtract_terms(&document);
        Some(document)
    }

    /// Remove every document whose domain equals `domain`.
    ///
    /// Returns the numeric ids that were removed.
    pub fn remove_domain(&mut self, domain: &str) -> Vec<u64> {
        let ids = self.domain_document_ids(domain);
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    /// Numeric ids of every document whose domain equals `domain`.
    pub fn domain_document_ids(&self, domain: &str) -> Vec<u64> {
        self.documents
            .values()
            .filter(|d| d.domain == domain)
            .map(|d| d.numeric_id)
            .collect()
    }

    fn subtract_terms(&mut self, document: &Document) {
        for term in document.term_frequencies.keys() {
            if let Some(df) = self.document_frequency.get_mut(term) {
                *df = df.saturating_sub(1);
                if *df == 0 {
                    self.document_frequency.remove(term);
                }
            }
        }
    }

    pub fn get(&self, numeric_id: u64) -> Option<&Document> {
        self.documents.get(&numeric_id)
    }

    pub fn get_by_url(&self, url: &str) -> Option<&Document> {
        self.by_url.get(url).and_then(|id| self.documents.get(id))
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of stored documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn document_frequencies(&self) -> &HashMap<String, u32> {
        &self.document_frequency
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            document_count: self.documents.len(),
            term_count: self.document_frequency.len(),
        }
    }
}

/// Shared handle to the corpus.
///
/// Queries hold the read lock for their whole scoring pass; an ingestion
/// batch holds the write lock while it is applied, so readers see either
/// none or all of a batch.
#[derive(Debug, Default)]
pub struct Corpus {
    state: RwLock<CorpusState>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a corpus from previously stored documents.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut state = CorpusState::default();
        for document in documents {
            state.upsert(document);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CorpusState> {
        self.state.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, CorpusState> {
        self.state.write()
    }

    pub fn stats(&self) -> CorpusStats {
        self.state.read().stats()
    }
}
