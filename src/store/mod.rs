//! Boundary between the builder and the document store.
//!
//! The builder only ever hands fully rendered documents across these traits.
//! Transport, authentication and wire encoding belong to the implementor.

pub mod memory;

use bson::Document;

use crate::errors::StoreError;

/// Everything a find needs, already rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub filter: Document,
    pub projection: Document,
    pub sort: Document,
    pub limit: u64,
    pub skip: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountSpec {
    pub filter: Document,
    pub limit: u64,
    pub skip: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    pub multiple: bool,
    pub upsert: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveFlags {
    pub just_one: bool,
}

/// A named collection inside the current database.
pub trait CollectionHandle {
    type Cursor: Iterator<Item = Result<Document, StoreError>>;

    fn name(&self) -> &str;

    /// # Errors
    /// Any store failure.
    fn find(&self, spec: &FindSpec) -> Result<Self::Cursor, StoreError>;

    /// # Errors
    /// Any store failure.
    fn count(&self, spec: &CountSpec) -> Result<u64, StoreError>;

    /// # Errors
    /// Any store failure, including duplicate keys.
    fn insert(&self, document: &Document) -> Result<(), StoreError>;

    /// # Errors
    /// Any store failure.
    fn update(&self, filter: &Document, update: &Document, flags: UpdateFlags) -> Result<(), StoreError>;

    /// # Errors
    /// Any store failure.
    fn remove(&self, filter: &Document, flags: RemoveFlags) -> Result<(), StoreError>;

    /// Returns whether the index exists afterwards.
    ///
    /// # Errors
    /// Any store failure.
    fn ensure_index(&self, keys: &Document, options: &Document) -> Result<bool, StoreError>;

    /// Returns whether an index was removed.
    ///
    /// # Errors
    /// Any store failure.
    fn delete_index(&self, keys: &Document) -> Result<bool, StoreError>;

    /// # Errors
    /// Any store failure.
    fn delete_indexes(&self) -> Result<(), StoreError>;

    /// # Errors
    /// Any store failure.
    fn index_info(&self) -> Result<Vec<Document>, StoreError>;
}

/// A connection with a current database.
pub trait Session {
    type Collection: CollectionHandle;

    fn collection(&self, name: &str) -> Self::Collection;

    /// # Errors
    /// Any store failure.
    fn select_database(&mut self, name: &str) -> Result<(), StoreError>;

    /// # Errors
    /// Any store failure.
    fn drop_database(&self, name: &str) -> Result<(), StoreError>;

    /// # Errors
    /// Any store failure.
    fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError>;

    /// # Errors
    /// Unknown commands or any store failure.
    fn run_command(&self, command: &Document) -> Result<Document, StoreError>;
}
