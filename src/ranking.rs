use std::collections::{BTreeMap, HashMap};

use crate::{
    corpus::CorpusState,
    models::TermFrequencies,
    tokenizer::tokenize,
};

/// Sparse weighted term vector, ordered by term so that sums over it are
/// reproducible bit for bit.
pub type TermVector = BTreeMap<String, f64>;

/// Inverse document frequency weights for every term seen in the corpus.
#[derive(Debug, Clone, Default)]
pub struct Idf {
    weights: HashMap<String, f64>,
    document_count: usize,
}

impl Idf {
    /// Compute weights from the corpus's maintained document frequencies.
    pub fn from_corpus(corpus: &CorpusState) -> Self {
        let document_count = corpus.document_count();
        let weights = corpus
            .document_frequencies()
            .iter()
            .map(|(term, df)| (term.clone(), idf_weight(document_count, *df)))
            .collect();
        Self {
            weights,
            document_count,
        }
    }

    /// Weight of `term`; zero for terms never seen in the corpus.
    pub fn get(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Smoothed IDF: `ln((N + 1) / (df + 1)) + 1`.
///
/// Strictly positive for any `df <= N`, and defined for `N = 0`.
pub fn idf_weight(document_count: usize, document_frequency: u32) -> f64 {
    let n = document_count as f64;
    let df = f64::from(document_frequency);
    ((n + 1.0) / (df + 1.0)).ln() + 1.0
}

/// Build IDF weights from the term tables of a set of documents.
pub fn build_idf<'a>(
    documents: impl IntoIterator<Item = &'a TermFrequencies>,
) -> Idf {
    let mut document_count = 0usize;
    let mut document_frequency: HashMap<&str, u32> = HashMap::new();
    for terms in documents {
        document_count += 1;
        for term in terms.keys() {
            *document_frequency.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let weights = document_frequency
        .into_iter()
        .map(|(term, df)| (term.to_string(), idf_weight(document_count, df)))
        .collect();
    Idf {
        weights,
        document_count,
    }
}

/// Count occurrences of each term.
pub fn term_frequencies<S: AsRef<str>>(terms: &[S]) -> TermFrequencies {
    let mut counts = TermFrequencies::new();
    for term in terms {
        *counts.entry(term.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Weight each term by `tf * idf`. Terms unknown to `idf` are dropped.
pub fn tfidf(terms: &TermFrequencies, idf: &Idf) -> TermVector {
    terms
        .iter()
        .filter_map(|(term, tf)| {
            let weight = f64::from(*tf) * idf.get(term);
            (weight > 0.0).then(|| (term.clone(), weight))
        })
        .collect()
}

/// Vectorize a query the same way as a document.
pub fn query_vector(query: &str, idf: &Idf) -> TermVector {
    tfidf(&term_frequencies(&tokenize(query)), idf)
}

fn norm(vector: &TermVector) -> f64 {
    vector.values().map(|w| w * w).sum::<f64>().sqrt()
}

/// Cosine similarity with the per-term share of the score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Similarity {
    pub score: f64,
    /// Contribution of each shared term; the values sum to `score`.
    pub breakdown: BTreeMap<String, f64>,
}

/// Cosine similarity between two vectors, keeping the per-term
/// contributions to the dot product.
///
/// Zero when either vector is zero.
pub fn cosine_with_breakdown(a: &TermVector, b: &TermVector) -> Similarity {
    let denominator = norm(a) * norm(b);
    if denominator == 0.0 {
        return Similarity::default();
    }

    // Shared terms are visited in term order whichever side is iterated.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut breakdown = BTreeMap::new();
    let mut score = 0.0;
    for (term, weight) in small {
        if let Some(other) = large.get(term) {
            let contribution = weight * other / denominator;
            score += contribution;
            breakdown.insert(term.clone(), contribution);
        }
    }

    Similarity {
        score: score.clamp(0.0, 1.0),
        breakdown,
    }
}

/// Cosine similarity in `[0, 1]` for non-negative vectors.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    cosine_with_breakdown(a, b).score
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn vector(pairs: &[(&str, f64)]) -> TermVector {
        pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    fn tf(terms: &[&str]) -> TermFrequencies {
        term_frequencies(terms)
    }

    #[test]
    fn idf_is_positive_and_handles_empty_corpus() {
        assert!(idf_weight(0, 0) > 0.0);
        assert!((idf_weight(0, 0) - 1.0).abs() < 1e-12);
        assert!(idf_weight(10, 10) > 0.0);
        assert!(idf_weight(10, 1) > idf_weight(10, 5));
    }

    #[test]
    fn build_idf_from_documents() {
        let docs = [tf(&["apple", "pear"]), tf(&["apple"])];
        let idf = build_idf(docs.iter());

        assert_eq!(idf.document_count(), 2);
        assert!((idf.get("apple") - idf_weight(2, 2)).abs() < 1e-12);
        assert!((idf.get("pear") - idf_weight(2, 1)).abs() < 1e-12);
        assert!(idf.get("pear") > idf.get("apple"));
        assert_eq!(idf.get("missing"), 0.0);
    }

    #[test]
    fn tfidf_multiplies_raw_frequency() {
        let docs = [tf(&["apple", "apple", "pear"])];
        let idf = build_idf(docs.iter());
        let weights = tfidf(&docs[0], &idf);

        assert!((weights["apple"] - 2.0 * idf.get("apple")).abs() < 1e-12);
        assert!((weights["pear"] - idf.get("pear")).abs() < 1e-12);
    }

    #[test]
    fn unseen_terms_contribute_nothing() {
        let docs = [tf(&["apple"])];
        let idf = build_idf(docs.iter());
        let query = query_vector("banana apple", &idf);

        assert_eq!(query.len(), 1);
        assert!(query.contains_key("apple"));
    }

    #[test]
    fn self_similarity_is_one() {
        let v = vector(&[("a", 1.5), ("b", 0.25), ("c", 3.0)]);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_vector_similarity_is_zero() {
        let v = vector(&[("a", 1.0)]);
        let zero = TermVector::new();
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn disjoint_vectors_score_zero() {
        let a = vector(&[("a", 1.0)]);
        let b = vector(&[("b", 1.0)]);
        let sim = cosine_with_breakdown(&a, &b);
        assert_eq!(sim.score, 0.0);
        assert!(sim.breakdown.is_empty());
    }

    #[test]
    fn breakdown_sums_to_score() {
        let a = vector(&[("a", 1.0), ("b", 2.0), ("c", 0.5)]);
        let b = vector(&[("a", 0.3), ("b", 1.0), ("d", 4.0)]);
        let sim = cosine_with_breakdown(&a, &b);

        let total: f64 = sim.breakdown.values().sum();
        assert!((total - sim.score).abs() < 1e-12);
        assert_eq!(
            sim.breakdown.keys().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn identical_documents_score_identically() {
        let words = [
            "river", "delta", "sediment", "flood", "plain", "estuary",
            "channel", "silt",
        ];
        let docs: Vec<TermFrequencies> = (0..50).map(|_| tf(&words)).collect();
        let idf = build_idf(docs.iter().chain([tf(&["other"])].iter()));
        let query = query_vector(&words.join(" "), &idf);

        let first = cosine_with_breakdown(&query, &tfidf(&docs[0], &idf));
        for doc in &docs[1..] {
            let sim = cosine_with_breakdown(&query, &tfidf(doc, &idf));
            assert_eq!(sim.score.to_bits(), first.score.to_bits());
        }
    }

    proptest! {
        #[test]
        fn cosine_is_bounded(
            a in proptest::collection::btree_map("[a-e]", 0.0f64..10.0, 0..5),
            b in proptest::collection::btree_map("[a-e]", 0.0f64..10.0, 0..5),
        ) {
            let score = cosine_similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert!((score - cosine_similarity(&b, &a)).abs() < 1e-12);
        }
    }
}
