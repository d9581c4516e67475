use std::path::Path;

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};

use crate::{
    error::Result,
    models::{Document, Domain},
};

const DOMAINS: TableDefinition<&str, &[u8]> = TableDefinition::new("domains");
const DOCUMENTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("documents");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Durable storage for domains, documents and settings.
///
/// Records are stored as JSON. Batch writes happen inside a single write
/// transaction, so a failed commit leaves the previous state untouched.
pub struct StoreDb {
    db: Database,
}

impl StoreDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(DOMAINS)?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Domains --

    pub fn put_domain(&self, domain: &Domain) -> Result<()> {
        let bytes = serde_json::to_vec(domain)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOMAINS)?;
            table.insert(domain.name.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_domain(&self, name: &str) -> Result<Option<Domain>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOMAINS)?;
        match table.get(name)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_domains(&self) -> Result<Vec<Domain>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOMAINS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    // -- Documents --

    /// Insert or replace documents, together with the domain records first
    /// seen in the same batch, in a single transaction.
    pub fn put_documents(
        &self,
        documents: &[Document],
        new_domains: &[Domain],
    ) -> Result<()> {
        if documents.is_empty() && new_domains.is_empty() {
            return Ok(());
        }
        let encoded = documents
            .iter()
            .map(|d| Ok((d.numeric_id, serde_json::to_vec(d)?)))
            .collect::<Result<Vec<_>>>()?;
        let encoded_domains = new_domains
            .iter()
            .map(|d| Ok((d.name.as_str(), serde_json::to_vec(d)?)))
            .collect::<Result<Vec<_>>>()?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOCUMENTS)?;
            for (id, bytes) in &encoded {
                table.insert(*id, bytes.as_slice())?;
            }
            let mut domains = txn.open_table(DOMAINS)?;
            for (name, bytes) in &encoded_domains {
                domains.insert(*name, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Store a domain record and drop documents in one transaction.
    ///
    /// Used when a domain becomes blocked and its documents are purged.
    pub fn put_domain_removing_documents(
        &self,
        domain: &Domain,
        document_ids: &[u64],
    ) -> Result<()> {
        let bytes = serde_json::to_vec(domain)?;
        let txn = self.db.begin_write()?;
        {
            let mut domains = txn.open_table(DOMAINS)?;
            domains.insert(domain.name.as_str(), bytes.as_slice())?;
            let mut documents = txn.open_table(DOCUMENTS)?;
            for &id in document_ids {
                documents.remove(id)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_document(&self, numeric_id: u64) -> Result<Option<Document>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        match table.get(numeric_id)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// Return every stored document in a single read transaction.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    pub fn document_count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        Ok(table.len()?)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }
}

impl std::fmt::Debug for StoreDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{corpus::tests::make_document, models::DomainPolicy};

    fn test_db() -> (tempfile::TempDir, StoreDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = StoreDb::open(&tmp.path().join("roadview.redb")).unwrap();
        (tmp, db)
    }

    #[test]
    fn domains_crud() {
        let (_tmp, db) = test_db();

        assert!(db.list_domains().unwrap().is_empty());
        assert_eq!(db.get_domain("a.org").unwrap(), None);

        let domain = Domain::new("a.org", DomainPolicy::Noindex);
        db.put_domain(&domain).unwrap();
        assert_eq!(db.get_domain("a.org").unwrap(), Some(domain.clone()));

        let updated = Domain::new("a.org", DomainPolicy::Block);
        db.put_domain(&updated).unwrap();
        let domains = db.list_domains().unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].policy, DomainPolicy::Block);
    }

    #[test]
    fn documents_batch_roundtrip() {
        let (_tmp, db) = test_db();
        let docs = vec![
            make_document("https://a.org/1", "a.org", "apple pear"),
            make_document("https://a.org/2", "a.org", "plum"),
        ];
        db.put_documents(&docs, &[]).unwrap();

        assert_eq!(db.document_count().unwrap(), 2);
        let loaded = db.get_document(docs[0].numeric_id).unwrap().unwrap();
        assert_eq!(loaded.term_frequencies, docs[0].term_frequencies);
        assert_eq!(db.list_documents().unwrap().len(), 2);
    }

    #[test]
    fn documents_and_new_domains_commit_together() {
        let (_tmp, db) = test_db();
        let docs = vec![make_document("https://b.org/1", "b.org", "apple")];
        let domains = vec![Domain::new("b.org", DomainPolicy::Index)];
        db.put_documents(&docs, &domains).unwrap();

        assert_eq!(db.document_count().unwrap(), 1);
        assert_eq!(
            db.get_domain("b.org").unwrap().map(|d| d.policy),
            Some(DomainPolicy::Index)
        );
    }

    #[test]
    fn blocking_removes_documents_atomically() {
        let (_tmp, db) = test_db();
        let doc = make_document("https://a.org/1", "a.org", "apple");
        db.put_documents(std::slice::from_ref(&doc), &[]).unwrap();

        let blocked = Domain::new("a.org", DomainPolicy::Block);
        db.put_domain_removing_documents(&blocked, &[doc.numeric_id])
            .unwrap();

        assert_eq!(db.document_count().unwrap(), 0);
        assert_eq!(
            db.get_domain("a.org").unwrap().map(|d| d.policy),
            Some(DomainPolicy::Block)
        );
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting("default_page_size").unwrap(), None);
        assert_eq!(
            db.get_setting_or("default_page_size", "25").unwrap(),
            "25"
        );

        db.set_setting("default_page_size", "10").unwrap();
        assert_eq!(
            db.get_setting("default_page_size").unwrap(),
            Some("10".to_string())
        );
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("roadview.redb");

        {
            let db = StoreDb::open(&path).unwrap();
            db.put_domain(&Domain::new("a.org", DomainPolicy::Noindex))
                .unwrap();
            db.put_documents(
                &[make_document("https://a.org/1", "a.org", "apple")],
                &[],
            )
            .unwrap();
        }

        {
            let db = StoreDb::open(&path).unwrap();
            assert_eq!(db.list_domains().unwrap().len(), 1);
            assert_eq!(db.document_count().unwrap(), 1);
        }
    }
}
