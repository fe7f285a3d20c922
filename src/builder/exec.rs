use bson::{Bson, Document, doc};
use log::{debug, warn};
use std::sync::Arc;

use super::{BuilderState, QueryBuilder, UpdateOptions};
use crate::errors::{BuilderError, Result};
use crate::query::normalize_directions;
use crate::store::{CollectionHandle, CountSpec, FindSpec, RemoveFlags, Session, UpdateFlags};
use crate::types::ID_FIELD;

/// `log` target for execution calls.
pub const EXEC_TARGET: &str = "mongo_fluent::exec";

fn require_collection(op: &str, collection: &str) -> Result<()> {
    if collection.trim().is_empty() {
        return Err(BuilderError::MissingCollection(op.to_string()));
    }
    Ok(())
}

fn finish<T>(op: &'static str, collection: &str, res: Result<T>) -> Result<T> {
    match &res {
        Ok(_) => debug!(target: EXEC_TARGET, "{op} on {collection:?} ok"),
        Err(e) => warn!(target: EXEC_TARGET, "{op} on {collection:?} failed: {e}"),
    }
    crate::op_event!(op, collection, res.is_ok());
    res
}

impl<S: Session> QueryBuilder<S> {
    /// Detaches the accumulated state, leaving the baseline behind.
    fn take_state(&mut self) -> BuilderState {
        std::mem::replace(&mut self.state, BuilderState::new(Arc::clone(&self.codec)))
    }

    fn handle(&self, op: &str, collection: &str) -> Result<S::Collection> {
        require_collection(op, collection)?;
        Ok(self.session.collection(collection))
    }

    fn fetch(&self, op: &str, collection: &str, spec: &FindSpec) -> Result<Vec<Document>> {
        let handle = self.handle(op, collection)?;
        handle
            .find(spec)
            .map_err(|e| BuilderError::remote(op, e))?
            .map(|r| r.map_err(|e| BuilderError::remote(op, e)))
            .collect()
    }

    /// Runs the accumulated find and materialises every match.
    ///
    /// # Errors
    /// `MissingCollection` or `RemoteOperationFailed`. State is reset either way.
    pub fn get(&mut self, collection: &str) -> Result<Vec<Document>> {
        let state = self.take_state();
        finish("get", collection, self.fetch("get", collection, &state.find_spec()))
    }

    /// [`get`](Self::get) with `filter` applied as equality pairs first.
    ///
    /// # Errors
    /// As `get`, plus `InvalidIdentifier` from the pairs.
    pub fn get_where(&mut self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let mut state = self.take_state();
        let res = match state.filter.where_many(filter) {
            Ok(_) => self.fetch("get_where", collection, &state.find_spec()),
            Err(e) => Err(e),
        };
        finish("get_where", collection, res)
    }

    /// First match with the limit forced to 1; `None` when nothing matches.
    ///
    /// # Errors
    /// As `get`.
    pub fn get_one(&mut self, collection: &str) -> Result<Option<Document>> {
        let mut state = self.take_state();
        state.shape.limit = 1;
        let res = self.fetch("get_one", collection, &state.find_spec()).map(|docs| docs.into_iter().next());
        finish("get_one", collection, res)
    }

    /// Counts matches inside the accumulated limit/offset window.
    ///
    /// # Errors
    /// `MissingCollection` or `RemoteOperationFailed`.
    pub fn count(&mut self, collection: &str) -> Result<u64> {
        let state = self.take_state();
        let spec = CountSpec {
            filter: state.filter.to_document(),
            limit: state.shape.limit,
            skip: state.shape.offset,
        };
        let res = self
            .handle("count", collection)
            .and_then(|h| h.count(&spec).map_err(|e| BuilderError::remote("count", e)));
        finish("count", collection, res)
    }

    /// Inserts `document` and returns its `_id` when the caller supplied one.
    /// Identifiers generated by the store are not reported.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty document, `MissingCollection`, or
    /// `RemoteOperationFailed`.
    pub fn insert(&mut self, collection: &str, document: Document) -> Result<Option<Bson>> {
        let _ = self.take_state();
        let res = self.insert_inner(collection, document);
        finish("insert", collection, res)
    }

    fn insert_inner(&self, collection: &str, document: Document) -> Result<Option<Bson>> {
        let handle = self.handle("insert", collection)?;
        if document.is_empty() {
            return Err(BuilderError::InvalidArgument("nothing to insert".into()));
        }
        handle.insert(&document).map_err(|e| BuilderError::remote("insert", e))?;
        Ok(document.get(ID_FIELD).cloned())
    }

    /// Updates a single matching document with the accumulated update and
    /// `extra` folded in, `extra` winning per field.
    ///
    /// # Errors
    /// `InvalidArgument` when `extra` is malformed or the resulting update is
    /// empty, `MissingCollection`, or `RemoteOperationFailed`.
    pub fn update(&mut self, collection: &str, extra: Document, options: UpdateOptions) -> Result<()> {
        let mut state = self.take_state();
        if options.multiple {
            debug!(target: EXEC_TARGET, "update on {collection:?} ignores multiple=true");
        }
        let res = self.update_inner(collection, &mut state, extra, options.upsert);
        finish("update", collection, res)
    }

    fn update_inner(&self, collection: &str, state: &mut BuilderState, extra: Document, upsert: bool) -> Result<()> {
        let handle = self.handle("update", collection)?;
        state.update.merge_document(extra)?;
        if state.update.is_empty() {
            return Err(BuilderError::InvalidArgument("nothing to update".into()));
        }
        let flags = UpdateFlags { multiple: false, upsert };
        handle
            .update(&state.filter.to_document(), &state.update.to_document(), flags)
            .map_err(|e| BuilderError::remote("update", e))
    }

    /// `$set`s `data` on every match. Accumulated update operators are not used.
    ///
    /// # Errors
    /// `InvalidArgument` for empty `data`, `MissingCollection`, or
    /// `RemoteOperationFailed`.
    pub fn update_all(&mut self, collection: &str, data: Document) -> Result<()> {
        let state = self.take_state();
        let res = self.handle("update_all", collection).and_then(|h| {
            if data.is_empty() {
                return Err(BuilderError::InvalidArgument("nothing to update".into()));
            }
            let flags = UpdateFlags { multiple: true, upsert: false };
            h.update(&state.filter.to_document(), &doc! {"$set": data}, flags)
                .map_err(|e| BuilderError::remote("update_all", e))
        });
        finish("update_all", collection, res)
    }

    /// Removes the first match.
    ///
    /// # Errors
    /// `MissingCollection` or `RemoteOperationFailed`.
    pub fn delete(&mut self, collection: &str) -> Result<()> {
        self.remove("delete", collection, RemoveFlags { just_one: true })
    }

    /// Removes every match.
    ///
    /// # Errors
    /// `MissingCollection` or `RemoteOperationFailed`.
    pub fn delete_all(&mut self, collection: &str) -> Result<()> {
        self.remove("delete_all", collection, RemoveFlags { just_one: false })
    }

    fn remove(&mut self, op: &'static str, collection: &str, flags: RemoveFlags) -> Result<()> {
        let state = self.take_state();
        let res = self
            .handle(op, collection)
            .and_then(|h| h.remove(&state.filter.to_document(), flags).map_err(|e| BuilderError::remote(op, e)));
        finish(op, collection, res)
    }

    /// Creates an index over `keys`, directions normalised like `order_by`.
    ///
    /// # Errors
    /// `IndexError` for empty keys or when the store declines, plus
    /// `MissingCollection` and `RemoteOperationFailed`.
    pub fn add_index(&mut self, collection: &str, keys: &Document, options: &Document) -> Result<()> {
        let _ = self.take_state();
        let res = self.handle("add_index", collection).and_then(|h| {
            let keys = index_keys("created", keys)?;
            match h.ensure_index(&keys, options) {
                Ok(true) => Ok(()),
                Ok(false) => Err(BuilderError::IndexError(format!("could not create index on {collection}"))),
                Err(e) => Err(BuilderError::remote("add_index", e)),
            }
        });
        finish("add_index", collection, res)
    }

    /// # Errors
    /// `IndexError` for empty keys or when no such index exists, plus
    /// `MissingCollection` and `RemoteOperationFailed`.
    pub fn remove_index(&mut self, collection: &str, keys: &Document) -> Result<()> {
        let _ = self.take_state();
        let res = self.handle("remove_index", collection).and_then(|h| {
            let keys = index_keys("removed", keys)?;
            match h.delete_index(&keys) {
                Ok(true) => Ok(()),
                Ok(false) => Err(BuilderError::IndexError(format!("could not remove index from {collection}"))),
                Err(e) => Err(BuilderError::remote("remove_index", e)),
            }
        });
        finish("remove_index", collection, res)
    }

    /// # Errors
    /// `MissingCollection` or `RemoteOperationFailed`.
    pub fn remove_all_indexes(&mut self, collection: &str) -> Result<()> {
        let _ = self.take_state();
        let res = self
            .handle("remove_all_indexes", collection)
            .and_then(|h| h.delete_indexes().map_err(|e| BuilderError::remote("remove_all_indexes", e)));
        finish("remove_all_indexes", collection, res)
    }

    /// Index descriptors for `collection`. Also resets accumulated state.
    ///
    /// # Errors
    /// `MissingCollection` or `RemoteOperationFailed`.
    pub fn list_indexes(&mut self, collection: &str) -> Result<Vec<Document>> {
        let _ = self.take_state();
        let res = self
            .handle("list_indexes", collection)
            .and_then(|h| h.index_info().map_err(|e| BuilderError::remote("list_indexes", e)));
        finish("list_indexes", collection, res)
    }
}

fn index_keys(verb: &str, keys: &Document) -> Result<Document> {
    if keys.is_empty() {
        return Err(BuilderError::IndexError(format!("index could not be {verb} because no keys were specified")));
    }
    Ok(normalize_directions(keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemorySession, MemoryStore};
    use crate::utils::devlog;

    fn builder() -> QueryBuilder<MemorySession> {
        QueryBuilder::new(MemoryStore::new().session("app"))
    }

    #[test]
    fn missing_collection_still_resets() {
        let mut b = builder();
        b.where_gt("n", 1).limit(2);
        let err = b.get("  ").unwrap_err();
        assert!(matches!(err, BuilderError::MissingCollection(ref op) if op == "get"));
        assert!(b.state().is_baseline());
    }

    #[test]
    fn insert_reports_supplied_id_only() {
        let mut b = builder();
        assert_eq!(b.insert("c", doc! {"_id": "x", "v": 1}).unwrap(), Some(Bson::String("x".into())));
        assert_eq!(b.insert("c", doc! {"v": 2}).unwrap(), None);
        assert!(matches!(b.insert("c", doc! {}), Err(BuilderError::InvalidArgument(_))));
        assert_eq!(b.count("c").unwrap(), 2);
    }

    #[test]
    fn every_call_emits_one_event() {
        let _g = devlog::enable_thread_sink();
        let mut b = builder();
        b.insert("c", doc! {"v": 1}).unwrap();
        let _ = b.delete("");
        let ev = devlog::events();
        assert_eq!(ev.len(), 2);
        assert_eq!(ev[0]["op"], "insert");
        assert_eq!(ev[0]["ok"], true);
        assert_eq!(ev[1]["op"], "delete");
        assert_eq!(ev[1]["ok"], false);
    }

    #[test]
    fn index_keys_are_normalised() {
        let mut b = builder();
        b.add_index("c", &doc! {"a": "DESC", "b": true}, &doc! {}).unwrap();
        let names: Vec<String> = b
            .list_indexes("c")
            .unwrap()
            .iter()
            .filter_map(|d| d.get_str("name").ok().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["_id_".to_string(), "a_-1_b_1".to_string()]);
        assert!(matches!(b.add_index("c", &doc! {}, &doc! {}), Err(BuilderError::IndexError(_))));
        assert!(matches!(b.remove_index("c", &doc! {"zz": 1}), Err(BuilderError::IndexError(_))));
        b.remove_index("c", &doc! {"a": -1, "b": 1}).unwrap();
    }
}
