// Shared helpers for integration tests: a collaborator that records every
// call the builder makes and can be told to fail.
#![allow(dead_code)]

use bson::{Document, doc};
use mongo_fluent::QueryBuilder;
use mongo_fluent::StoreError;
use mongo_fluent::store::{CollectionHandle, CountSpec, FindSpec, RemoveFlags, Session, UpdateFlags};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find { collection: String, spec: FindSpec },
    Count { collection: String, spec: CountSpec },
    Insert { collection: String, document: Document },
    Update { collection: String, filter: Document, update: Document, flags: UpdateFlags },
    Remove { collection: String, filter: Document, flags: RemoveFlags },
    EnsureIndex { collection: String, keys: Document, options: Document },
    DeleteIndex { collection: String, keys: Document },
    DeleteIndexes { collection: String },
    IndexInfo { collection: String },
    SelectDatabase(String),
    DropDatabase(String),
    DropCollection(String, String),
    Command(Document),
}

#[derive(Debug)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<StoreError>>,
    find_results: Mutex<Vec<Document>>,
    count_result: Mutex<u64>,
    index_result: Mutex<bool>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            find_results: Mutex::new(Vec::new()),
            count_result: Mutex::new(0),
            index_result: Mutex::new(true),
        }
    }
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }

    /// Every following store call fails with `err` until `recover` is called.
    pub fn fail_with(&self, err: StoreError) {
        *self.failure.lock() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn returns(&self, docs: Vec<Document>) {
        *self.find_results.lock() = docs;
    }

    pub fn counts(&self, n: u64) {
        *self.count_result.lock() = n;
    }

    pub fn index_result(&self, ok: bool) {
        *self.index_result.lock() = ok;
    }

    fn record(&self, call: Call) -> Result<(), StoreError> {
        self.calls.lock().push(call);
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub recorder: Arc<Recorder>,
}

#[derive(Debug, Clone)]
pub struct RecordingCollection {
    name: String,
    recorder: Arc<Recorder>,
}

impl CollectionHandle for RecordingCollection {
    type Cursor = std::vec::IntoIter<Result<Document, StoreError>>;

    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, spec: &FindSpec) -> Result<Self::Cursor, StoreError> {
        self.recorder.record(Call::Find { collection: self.name.clone(), spec: spec.clone() })?;
        let docs: Vec<_> = self.recorder.find_results.lock().iter().cloned().map(Ok).collect();
        Ok(docs.into_iter())
    }

    fn count(&self, spec: &CountSpec) -> Result<u64, StoreError> {
        self.recorder.record(Call::Count { collection: self.name.clone(), spec: spec.clone() })?;
        Ok(*self.recorder.count_result.lock())
    }

    fn insert(&self, document: &Document) -> Result<(), StoreError> {
        self.recorder.record(Call::Insert { collection: self.name.clone(), document: document.clone() })
    }

    fn update(&self, filter: &Document, update: &Document, flags: UpdateFlags) -> Result<(), StoreError> {
        self.recorder.record(Call::Update {
            collection: self.name.clone(),
            filter: filter.clone(),
            update: update.clone(),
            flags,
        })
    }

    fn remove(&self, filter: &Document, flags: RemoveFlags) -> Result<(), StoreError> {
        self.recorder.record(Call::Remove { collection: self.name.clone(), filter: filter.clone(), flags })
    }

    fn ensure_index(&self, keys: &Document, options: &Document) -> Result<bool, StoreError> {
        self.recorder.record(Call::EnsureIndex {
            collection: self.name.clone(),
            keys: keys.clone(),
            options: options.clone(),
        })?;
        Ok(*self.recorder.index_result.lock())
    }

    fn delete_index(&self, keys: &Document) -> Result<bool, StoreError> {
        self.recorder.record(Call::DeleteIndex { collection: self.name.clone(), keys: keys.clone() })?;
        Ok(*self.recorder.index_result.lock())
    }

    fn delete_indexes(&self) -> Result<(), StoreError> {
        self.recorder.record(Call::DeleteIndexes { collection: self.name.clone() })
    }

    fn index_info(&self) -> Result<Vec<Document>, StoreError> {
        self.recorder.record(Call::IndexInfo { collection: self.name.clone() })?;
        Ok(vec![doc! {"v": 2, "key": {"_id": 1}, "name": "_id_"}])
    }
}

impl Session for RecordingSession {
    type Collection = RecordingCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        RecordingCollection { name: name.to_string(), recorder: Arc::clone(&self.recorder) }
    }

    fn select_database(&mut self, name: &str) -> Result<(), StoreError> {
        self.recorder.record(Call::SelectDatabase(name.to_string()))
    }

    fn drop_database(&self, name: &str) -> Result<(), StoreError> {
        self.recorder.record(Call::DropDatabase(name.to_string()))
    }

    fn drop_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        self.recorder.record(Call::DropCollection(database.to_string(), collection.to_string()))
    }

    fn run_command(&self, command: &Document) -> Result<Document, StoreError> {
        self.recorder.record(Call::Command(command.clone()))?;
        Ok(doc! {"ok": 1.0})
    }
}

/// A builder over a fresh recorder, plus the recorder itself.
pub fn recording() -> (QueryBuilder<RecordingSession>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let session = RecordingSession { recorder: Arc::clone(&recorder) };
    (QueryBuilder::new(session), recorder)
}

/// The spec of the last find, panicking when the last call was something else.
pub fn last_find(recorder: &Recorder) -> FindSpec {
    match recorder.last() {
        Some(Call::Find { spec, .. }) => spec,
        other => panic!("expected a find, got {other:?}"),
    }
}
