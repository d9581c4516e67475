//! roadview - a TF-IDF document indexing and ranking core with per-domain
//! access policies.
//!
//! Documents are submitted in batches, tokenized, and kept in an in-memory
//! corpus (optionally backed by a [redb](https://github.com/cberner/redb)
//! store). Queries are ranked by cosine similarity over smoothed TF-IDF
//! vectors, with a per-term score breakdown. Every domain carries a policy:
//! `index` (default), `noindex` (stored but never returned) or `block`
//! (never ingested).
//!
//! # Quick start
//!
//! ```
//! use roadview::{DocumentInput, DomainPolicy, Roadview, SearchRequest, SourceType};
//!
//! let service = Roadview::in_memory();
//! service.set_policy("spam.example", DomainPolicy::Block).unwrap();
//!
//! let report = service
//!     .bulk_index(&[
//!         DocumentInput::new(
//!             "Rust 2024",
//!             "https://blog.example/rust",
//!             SourceType::Blog,
//!             "The Rust 2024 edition ships async closures",
//!         ),
//!         DocumentInput::new(
//!             "Buy now",
//!             "https://spam.example/rust",
//!             SourceType::Other,
//!             "Rust remover on sale",
//!         ),
//!     ])
//!     .unwrap();
//! assert_eq!(report.indexed, 1);
//! assert_eq!(report.blocked, 1);
//!
//! let response = service.search(&SearchRequest::new("rust edition"));
//! for r in &response.results {
//!     println!("{} (score: {:.3})", r.url, r.score);
//! }
//! ```

pub mod corpus;
pub mod data_dir;
pub mod doc_id;
pub mod error;
pub mod indexer;
pub mod mcp;
pub mod models;
pub mod policy;
pub mod ranking;
pub mod search;
pub mod service;
pub mod settings;
pub mod store_db;
pub mod text_util;
pub mod tokenizer;

pub use data_dir::DataDir;
pub use doc_id::DocumentId;
pub use error::{Error, Result};
pub use indexer::{IndexReport, RejectReason, Rejection};
pub use models::{Bias, Document, DocumentInput, Domain, DomainPolicy, SourceType};
pub use search::{SearchFilters, SearchRequest, SearchResponse, SortMode};
pub use service::{DomainUpdate, Roadview, Stats};
pub use store_db::StoreDb;
