//! Domain policy registry.
//!
//! The registry is an explicitly owned value shared through an `Arc` by the
//! indexer and the query engine. Reads and writes go through a single
//! `RwLock`, so an upsert is visible to the very next lookup.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use url::Host;

use crate::models::{Domain, DomainPolicy};

/// Canonical form of a domain name: trimmed, without a trailing dot, and in
/// the lowercase ASCII form a parsed URL reports for its host, so
/// `Bücher.de` and `xn--bcher-kva.de` name the same record.
///
/// Names the host parser rejects are only lowercased.
pub fn normalize_domain(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    match Host::parse(trimmed) {
        Ok(host) => host.to_string(),
        Err(_) => trimmed.to_lowercase(),
    }
}

#[derive(Debug, Default)]
pub struct PolicyRegistry {
    domains: RwLock<HashMap<String, Domain>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `domains` (e.g. loaded from the
    /// store).
    pub fn with_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        let map = domains
            .into_iter()
            .map(|mut domain| {
                domain.name = normalize_domain(&domain.name);
                (domain.name.clone(), domain)
            })
            .collect();
        Self {
            domains: RwLock::new(map),
        }
    }

    /// Insert or replace a domain record. Last write wins.
    ///
    /// Returns the stored record and whether it was newly created.
    pub fn upsert(&self, mut domain: Domain) -> (Domain, bool) {
        domain.updated_at = Utc::now();
        self.insert(domain)
    }

    /// Store `domain` as given, without touching `updated_at`.
    pub fn insert(&self, mut domain: Domain) -> (Domain, bool) {
        domain.name = normalize_domain(&domain.name);

        let mut domains = self.domains.write();
        let created = domains
            .insert(domain.name.clone(), domain.clone())
            .is_none();
        (domain, created)
    }

    /// Set only the policy of `name`, keeping its other attributes.
    pub fn upsert_policy(
        &self,
        name: &str,
        policy: DomainPolicy,
    ) -> (Domain, bool) {
        let domain = match self.get(name) {
            Some(mut existing) => {
                existing.policy = policy;
                existing
            }
            None => Domain::new(name, policy),
        };
        self.upsert(domain)
    }

    /// Policy for `domain`, `Index` when it was never registered.
    pub fn policy_for(&self, domain: &str) -> DomainPolicy {
        self.domains
            .read()
            .get(&normalize_domain(domain))
            .map(|d| d.policy)
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<Domain> {
        self.domains.read().get(&normalize_domain(name)).cloned()
    }

    /// The registered record, or a default one for unknown domains.
    pub fn resolve(&self, name: &str) -> Domain {
        self.get(name)
            .unwrap_or_else(|| Domain::new(name, DomainPolicy::Index))
    }

    /// All registered domains sorted by name.
    pub fn list(&self) -> Vec<Domain> {
        let mut domains: Vec<Domain> =
            self.domains.read().values().cloned().collect();
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        domains
    }

    pub fn len(&self) -> usize {
        self.domains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.read().is_empty()
    }
}
