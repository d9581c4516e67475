use std::{sync::Arc, thread};

use roadview::{
    Bias,
    DocumentInput,
    DomainPolicy,
    Roadview,
    SearchFilters,
    SearchRequest,
    SourceType,
    StoreDb,
    ranking::{TermVector, cosine_similarity},
    tokenizer::tokenize,
};

fn doc(url: &str, content: &str) -> DocumentInput {
    DocumentInput::new("Title", url, SourceType::News, content)
}

#[test]
fn blocked_domain_is_never_indexed() {
    let service = Roadview::in_memory();
    service.set_policy("blocked.com", DomainPolicy::Block).unwrap();

    let report = service
        .bulk_index(&[doc("https://blocked.com/a", "forbidden fruit")])
        .unwrap();

    assert_eq!(report.indexed, 0);
    assert_eq!(report.blocked, 1);
    assert_eq!(service.stats().document_count, 0);
    assert_eq!(
        service.search(&SearchRequest::new("forbidden fruit")).meta.total,
        0
    );
}

#[test]
fn noindex_domain_is_counted_but_hidden() {
    let service = Roadview::in_memory();
    service.set_policy("quiet.com", DomainPolicy::Noindex).unwrap();

    let report = service
        .bulk_index(&[doc("https://quiet.com/a", "whispering galleries")])
        .unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(service.stats().document_count, 1);
    assert_eq!(service.document_frequency("whispering"), 1);
    let response = service.search(&SearchRequest::new("whispering galleries"));
    assert_eq!(response.meta.total, 0);
    assert!(response.results.is_empty());
}

#[test]
fn reindexing_replaces_previous_content() {
    let service = Roadview::in_memory();
    service
        .bulk_index(&[doc("https://a.org/page", "original words")])
        .unwrap();
    service
        .bulk_index(&[doc("https://a.org/page", "revised text")])
        .unwrap();

    assert_eq!(service.stats().document_count, 1);
    assert_eq!(service.document_frequency("original"), 0);
    assert_eq!(service.document_frequency("revised"), 1);
    assert_eq!(service.search(&SearchRequest::new("original")).meta.total, 0);
    assert_eq!(service.search(&SearchRequest::new("revised")).meta.total, 1);
}

#[test]
fn cosine_similarity_bounds() {
    let v: TermVector =
        [("alpha".to_string(), 0.7), ("beta".to_string(), 1.3)].into();
    let zero = TermVector::new();

    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    assert_eq!(cosine_similarity(&v, &zero), 0.0);
    assert_eq!(cosine_similarity(&zero, &zero), 0.0);
}

#[test]
fn facets_agree_with_bias_filter() {
    let service = Roadview::in_memory();
    service
        .bulk_index(&[
            doc("https://l.org/1", "election coverage").with_bias(Bias::Left),
            doc("https://l.org/2", "election polls").with_bias(Bias::Left),
            doc("https://r.org/1", "election results").with_bias(Bias::Right),
            doc("https://c.org/1", "election debate").with_bias(Bias::Center),
            doc("https://n.org/1", "election turnout"),
        ])
        .unwrap();

    let unfiltered = service.search(&SearchRequest::new("election"));
    assert_eq!(unfiltered.meta.total, 5);
    assert_eq!(unfiltered.facets.bias.values().sum::<usize>(), 5);
    assert_eq!(unfiltered.facets.domains.values().sum::<usize>(), 5);

    for (bias, key) in [
        (Bias::Left, "left"),
        (Bias::Right, "right"),
        (Bias::Center, "center"),
        (Bias::Na, "na"),
    ] {
        let filtered = service.search(
            &SearchRequest::new("election").with_filters(SearchFilters {
                bias: Some(bias),
                ..SearchFilters::default()
            }),
        );
        assert_eq!(filtered.meta.total, unfiltered.facets.bias[key], "{key}");
    }
}

#[test]
fn tokenizer_examples() {
    assert_eq!(
        tokenize("The Quick Brown Fox jumps over the Lazy Dog"),
        vec!["quick", "brown", "fox", "jumps", "over", "lazy", "dog"]
    );
    let accented = tokenize("Café naïve façade résumé");
    assert!(accented.contains(&"café".to_string()));
    assert!(accented.contains(&"naïve".to_string()));
}

#[test]
fn end_to_end_single_match() {
    let service = Roadview::in_memory();
    service
        .bulk_index(&[
            doc("https://a.org/tides", "lunar tides and coastlines"),
            doc("https://b.org/orbits", "planetary orbits and gravity"),
        ])
        .unwrap();

    let response = service.search(&SearchRequest::new("coastlines"));
    assert_eq!(response.meta.total, 1);
    assert_eq!(response.results[0].url, "https://a.org/tides");
}

#[test]
fn default_pagination() {
    let service = Roadview::in_memory();
    service.bulk_index(&[doc("https://a.org/1", "anything")]).unwrap();

    let response = service.search(&SearchRequest::new("anything"));
    assert_eq!(response.meta.page, 1);
    assert_eq!(response.meta.page_size, 25);
}

#[test]
fn concurrent_queries_during_ingestion() {
    let service = Arc::new(Roadview::in_memory());
    service
        .bulk_index(&[doc("https://seed.org/0", "steady baseline")])
        .unwrap();

    let writer = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for batch in 0..20 {
                let docs: Vec<DocumentInput> = (0..10)
                    .map(|i| {
                        doc(
                            &format!("https://w.org/{batch}/{i}"),
                            "steady stream of words",
                        )
                    })
                    .collect();
                service.bulk_index(&docs).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..50 {
                    let response =
                        service.search(&SearchRequest::new("steady"));
                    // Whole batches only: seed plus a multiple of ten.
                    assert_eq!((response.meta.total - 1) % 10, 0);
                    for r in &response.results {
                        assert!(r.score > 0.0 && r.score <= 1.0);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(service.stats().document_count, 201);
}

#[test]
fn persisted_corpus_ranks_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roadview.redb");
    let docs = [
        doc("https://a.org/1", "river delta sediment"),
        doc("https://a.org/2", "river crossing bridge"),
        doc("https://b.org/1", "mountain river source"),
    ];

    let before = {
        let service = Roadview::open(StoreDb::open(&path).unwrap()).unwrap();
        service.bulk_index(&docs).unwrap();
        service.search(&SearchRequest::new("river sediment"))
    };

    let service = Roadview::open(StoreDb::open(&path).unwrap()).unwrap();
    let after = service.search(&SearchRequest::new("river sediment"));

    assert_eq!(before.meta.total, after.meta.total);
    for (a, b) in before.results.iter().zip(&after.results) {
        assert_eq!(a.url, b.url);
        assert!((a.score - b.score).abs() < 1e-12);
    }
}
