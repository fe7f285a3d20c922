//! In-process store implementing the collaborator traits over shared memory.
//!
//! Databases and collections spring into existence on first use, as in MongoDB.
//! Handles are cheap clones over shared state guarded by `parking_lot` locks.

mod apply;
mod eval;
mod index;

pub use apply::apply_update;
pub use eval::{compare_bson, matches, project};
pub use index::{IndexKeyKind, IndexSpec};

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{CollectionHandle, CountSpec, FindSpec, RemoveFlags, Session, UpdateFlags};
use crate::config::ConnectionConfig;
use crate::errors::{Result, StoreError};

const DUPLICATE_KEY: i32 = 11000;
const NS_NOT_FOUND: i32 = 26;
const COMMAND_NOT_FOUND: i32 = 59;

#[derive(Debug)]
struct CollectionData {
    docs: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Default for CollectionData {
    fn default() -> Self {
        Self { docs: Vec::new(), indexes: vec![IndexSpec::id_index()] }
    }
}

impl CollectionData {
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
        match self.indexes.iter().find(|ix| ix.collides(&self.docs, candidate, skip)) {
            Some(ix) => Err(StoreError::with_code(
                format!("E11000 duplicate key error index: {}", ix.name),
                DUPLICATE_KEY,
            )),
            None => Ok(()),
        }
    }

    fn insert(&mut self, mut document: Document) -> Result<(), StoreError> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        self.check_unique(&document, None)?;
        self.docs.push(document);
        Ok(())
    }
}

type Database = HashMap<String, Arc<RwLock<CollectionData>>>;

/// Shared backing storage; clone it to hand out more sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    databases: Arc<RwLock<HashMap<String, Database>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session(&self, database: &str) -> MemorySession {
        MemorySession { store: self.clone(), database: database.to_string() }
    }

    /// Opens a session on the configured database after validating the config.
    ///
    /// # Errors
    /// `Config` when hostname or database is missing.
    pub fn connect(&self, config: &ConnectionConfig) -> Result<MemorySession> {
        config.validate()?;
        log::debug!(target: "mongo_fluent::store", "memory connect {}", config.redacted_connection_string());
        Ok(self.session(config.database.as_deref().unwrap_or_default()))
    }

    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn collection_names(&self, database: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .databases
            .read()
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn handle(&self, database: &str, collection: &str) -> MemoryCollection {
        let data = {
            let mut dbs = self.databases.write();
            dbs.entry(database.to_string())
                .or_default()
                .entry(collection.to_string())
                .or_default()
                .clone()
        };
        MemoryCollection { name: collection.to_string(), data }
    }
}

#[derive(Debug, Clone)]
pub struct MemorySession {
    store: MemoryStore,
    database: String,
}

impl MemorySession {
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Session for MemorySession {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> MemoryCollection {
        self.store.handle(&self.database, name)
    }

    fn select_database(&mut self, name: &str) -> Result<(), StoreError> {
        self.store.databases.write().entry(name.to_string()).or_default();
        self.database = name.to_string();
        Ok(())
    }

    fn drop_database(&self, name: &str) -> Result<(), StoreError> {
        self.store.databases.write().remove(name);
        Ok(())
    }

    fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        let removed = self
            .store
            .databases
            .write()
            .get_mut(database)
            .and_then(|db| db.remove(collection));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::with_code(format!("ns not found: {database}.{collection}"), NS_NOT_FOUND)),
        }
    }

    fn run_command(&self, command: &Document) -> Result<Document, StoreError> {
        let Some((name, arg)) = command.iter().next() else {
            return Err(StoreError::with_code("empty command", COMMAND_NOT_FOUND));
        };
        match name.as_str() {
            "ping" => Ok(doc! {"ok": 1.0}),
            "count" => {
                let coll = arg.as_str().unwrap_or_default();
                let filter = command.get_document("query").cloned().unwrap_or_default();
                let n = self.collection(coll).count(&CountSpec { filter, limit: 0, skip: 0 })?;
                Ok(doc! {"n": i64::try_from(n).unwrap_or(i64::MAX), "ok": 1.0})
            }
            "drop" => {
                let coll = arg.as_str().unwrap_or_default();
                self.drop_collection(&self.database, coll)?;
                Ok(doc! {"ns": format!("{}.{coll}", self.database), "ok": 1.0})
            }
            "dropDatabase" => {
                self.drop_database(&self.database)?;
                Ok(doc! {"dropped": self.database.clone(), "ok": 1.0})
            }
            "listCollections" => {
                let batch: Vec<Bson> = self
                    .store
                    .collection_names(&self.database)
                    .into_iter()
                    .map(|n| Bson::Document(doc! {"name": n, "type": "collection"}))
                    .collect();
                Ok(doc! {"cursor": {"firstBatch": batch}, "ok": 1.0})
            }
            other => Err(StoreError::with_code(format!("no such command: '{other}'"), COMMAND_NOT_FOUND)),
        }
    }
}

/// Materialized results of a find.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    docs: std::vec::IntoIter<Document>,
}

impl Iterator for MemoryCursor {
    type Item = Result<Document, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.docs.next().map(Ok)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    data: Arc<RwLock<CollectionData>>,
}

impl MemoryCollection {
    /// Every stored document in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.data.read().docs.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn window(len: usize, skip: u64, limit: u64) -> std::ops::Range<usize> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX).min(len);
    let limit = if limit == 0 { usize::MAX } else { usize::try_from(limit).unwrap_or(usize::MAX) };
    skip..skip.saturating_add(limit).min(len)
}

impl CollectionHandle for MemoryCollection {
    type Cursor = MemoryCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, spec: &FindSpec) -> Result<MemoryCursor, StoreError> {
        let data = self.data.read();
        let mut docs: Vec<&Document> = data.docs.iter().filter(|d| matches(d, &spec.filter)).collect();
        if !spec.sort.is_empty() {
            docs.sort_by(|a, b| eval::compare_docs(a, b, &spec.sort));
        } else if let Some((field, point)) = eval::near_target(&spec.filter) {
            docs.sort_by(|a, b| {
                eval::distance(a, &field, point).total_cmp(&eval::distance(b, &field, point))
            });
        }
        let range = window(docs.len(), spec.skip, spec.limit);
        let out: Vec<Document> = docs[range].iter().map(|d| project(d, &spec.projection)).collect();
        Ok(MemoryCursor { docs: out.into_iter() })
    }

    fn count(&self, spec: &CountSpec) -> Result<u64, StoreError> {
        let data = self.data.read();
        let n = data.docs.iter().filter(|d| matches(d, &spec.filter)).count();
        Ok(window(n, spec.skip, spec.limit).len() as u64)
    }

    fn insert(&self, document: &Document) -> Result<(), StoreError> {
        self.data.write().insert(document.clone())
    }

    fn update(&self, filter: &Document, update: &Document, flags: UpdateFlags) -> Result<(), StoreError> {
        let mut data = self.data.write();
        let hits: Vec<usize> = data
            .docs
            .iter()
            .enumerate()
            .filter(|(_, d)| matches(d, filter))
            .map(|(i, _)| i)
            .take(if flags.multiple { usize::MAX } else { 1 })
            .collect();
        if hits.is_empty() {
            if flags.upsert {
                let mut seed: Document = filter
                    .iter()
                    .filter(|(k, v)| {
                        !k.starts_with('$') && !v.as_document().is_some_and(eval::is_operator_doc)
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                apply_update(&mut seed, update)?;
                data.insert(seed)?;
            }
            return Ok(());
        }
        for i in hits {
            let mut next = data.docs[i].clone();
            apply_update(&mut next, update)?;
            if next.get("_id") != data.docs[i].get("_id") {
                return Err(StoreError::with_code(
                    "Performing an update on the path '_id' would modify the immutable field '_id'",
                    66,
                ));
            }
            data.check_unique(&next, Some(i))?;
            data.docs[i] = next;
        }
        Ok(())
    }

    fn remove(&self, filter: &Document, flags: RemoveFlags) -> Result<(), StoreError> {
        let mut data = self.data.write();
        if flags.just_one {
            if let Some(i) = data.docs.iter().position(|d| matches(d, filter)) {
                data.docs.remove(i);
            }
        } else {
            data.docs.retain(|d| !matches(d, filter));
        }
        Ok(())
    }

    fn ensure_index(&self, keys: &Document, options: &Document) -> Result<bool, StoreError> {
        if keys.is_empty() {
            return Err(StoreError::with_code("index keys may not be empty", 67));
        }
        let mut data = self.data.write();
        if data.indexes.iter().any(|ix| ix.keys == *keys) {
            return Ok(true);
        }
        let spec = IndexSpec::from_request(keys, options);
        if spec.has_duplicates(&data.docs) {
            return Err(StoreError::with_code(
                format!("E11000 duplicate key error building index {}", spec.name),
                DUPLICATE_KEY,
            ));
        }
        data.indexes.push(spec);
        Ok(true)
    }

    fn delete_index(&self, keys: &Document) -> Result<bool, StoreError> {
        let mut data = self.data.write();
        match data.indexes.iter().position(|ix| ix.keys == *keys) {
            Some(i) if data.indexes[i].name == index::ID_INDEX_NAME => {
                Err(StoreError::with_code("cannot drop _id index", 72))
            }
            Some(i) => {
                data.indexes.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_indexes(&self) -> Result<(), StoreError> {
        self.data.write().indexes.retain(|ix| ix.name == index::ID_INDEX_NAME);
        Ok(())
    }

    fn index_info(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.data.read().indexes.iter().map(IndexSpec::descriptor).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coll() -> MemoryCollection {
        MemoryStore::new().session("test").collection("items")
    }

    #[test]
    fn insert_assigns_id_and_rejects_duplicates() {
        let c = coll();
        c.insert(&doc! {"_id": "a", "v": 1}).unwrap();
        c.insert(&doc! {"v": 2}).unwrap();
        assert!(c.documents()[1].get_object_id("_id").is_ok());
        let err = c.insert(&doc! {"_id": "a"}).unwrap_err();
        assert_eq!(err.code, Some(DUPLICATE_KEY));
    }

    #[test]
    fn find_sorts_skips_limits() {
        let c = coll();
        for i in 0..5 {
            c.insert(&doc! {"k": i, "even": i % 2 == 0}).unwrap();
        }
        let spec = FindSpec {
            filter: doc! {"even": true},
            projection: doc! {"k": 1, "_id": 0},
            sort: doc! {"k": -1},
            limit: 2,
            skip: 1,
        };
        let out: Vec<Document> = c.find(&spec).unwrap().map(Result::unwrap).collect();
        assert_eq!(out, vec![doc! {"k": 2}, doc! {"k": 0}]);
    }

    #[test]
    fn upsert_seeds_from_filter() {
        let c = coll();
        let flags = UpdateFlags { multiple: false, upsert: true };
        c.update(&doc! {"name": "x", "n": {"$gt": 1}}, &doc! {"$set": {"v": 1}}, flags).unwrap();
        let docs = c.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("name").unwrap(), "x");
        assert!(docs[0].get("n").is_none());
    }

    #[test]
    fn unique_index_guards_updates() {
        let c = coll();
        c.insert(&doc! {"e": "a"}).unwrap();
        c.insert(&doc! {"e": "b"}).unwrap();
        assert!(c.ensure_index(&doc! {"e": 1}, &doc! {"unique": true}).unwrap());
        let err = c
            .update(&doc! {"e": "b"}, &doc! {"$set": {"e": "a"}}, UpdateFlags::default())
            .unwrap_err();
        assert_eq!(err.code, Some(DUPLICATE_KEY));
        assert_eq!(c.index_info().unwrap().len(), 2);
        c.delete_indexes().unwrap();
        assert_eq!(c.index_info().unwrap().len(), 1);
    }

    #[test]
    fn run_command_variants() {
        let s = MemoryStore::new().session("db");
        s.collection("a").insert(&doc! {"x": 1}).unwrap();
        assert_eq!(s.run_command(&doc! {"ping": 1}).unwrap().get_f64("ok").unwrap(), 1.0);
        assert_eq!(s.run_command(&doc! {"count": "a"}).unwrap().get_i64("n").unwrap(), 1);
        assert_eq!(s.run_command(&doc! {"bogus": 1}).unwrap_err().code, Some(COMMAND_NOT_FOUND));
    }
}
