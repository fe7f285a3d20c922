//! The fluent builder: accumulate, then execute once.
//!
//! A [`QueryBuilder`] owns exactly one [`BuilderState`]. Chaining calls mutate
//! it; every execution call detaches it before touching the store, so the
//! builder is back at its empty baseline whether the call succeeds or not.
//! One builder serves one in-flight query; share it across threads only behind
//! a lock (see [`crate::registry::Registry`]).

mod admin;
mod exec;

use bson::{Bson, Document};
use std::sync::Arc;

use crate::errors::Result;
use crate::query::{FilterAccumulator, LikeOptions, QueryShape, UpdateAccumulator};
use crate::store::{FindSpec, Session};
use crate::types::{IdentifierCodec, ObjectIdCodec};

pub use exec::EXEC_TARGET;

/// Options for [`QueryBuilder::update`]. `multiple` is accepted but never honoured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub multiple: bool,
}

impl UpdateOptions {
    #[must_use]
    pub fn upsert() -> Self {
        Self { upsert: true, multiple: false }
    }
}

/// Everything accumulated between two execution calls.
#[derive(Debug)]
pub struct BuilderState {
    pub filter: FilterAccumulator,
    pub update: UpdateAccumulator,
    pub shape: QueryShape,
}

impl BuilderState {
    #[must_use]
    pub fn new(codec: Arc<dyn IdentifierCodec>) -> Self {
        Self { filter: FilterAccumulator::new(codec), update: UpdateAccumulator::new(), shape: QueryShape::default() }
    }

    /// True when nothing has been accumulated.
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.filter.is_empty() && self.update.is_empty() && self.shape == QueryShape::default()
    }

    #[must_use]
    pub fn find_spec(&self) -> FindSpec {
        FindSpec {
            filter: self.filter.to_document(),
            projection: self.shape.projection.to_document(),
            sort: self.shape.sort_document(),
            limit: self.shape.limit,
            skip: self.shape.offset,
        }
    }
}

pub struct QueryBuilder<S: Session> {
    session: S,
    codec: Arc<dyn IdentifierCodec>,
    state: BuilderState,
}

impl<S: Session> std::fmt::Debug for QueryBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder").field("state", &self.state).finish_non_exhaustive()
    }
}

impl<S: Session> QueryBuilder<S> {
    /// Builder whose `_id` values are coerced to `ObjectId`.
    pub fn new(session: S) -> Self {
        Self::with_codec(session, Arc::new(ObjectIdCodec))
    }

    pub fn with_codec(session: S, codec: Arc<dyn IdentifierCodec>) -> Self {
        let state = BuilderState::new(Arc::clone(&codec));
        Self { session, codec, state }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    // ---- inspection ----

    pub fn state(&self) -> &BuilderState {
        &self.state
    }

    pub fn filter_document(&self) -> Document {
        self.state.filter.to_document()
    }

    pub fn update_document(&self) -> Document {
        self.state.update.to_document()
    }

    /// The find the next `get` would forward, without executing it.
    pub fn find_spec(&self) -> FindSpec {
        self.state.find_spec()
    }

    /// Drops everything accumulated so far.
    pub fn reset(&mut self) -> &mut Self {
        self.state = BuilderState::new(Arc::clone(&self.codec));
        self
    }

    // ---- filter ----

    /// Equality on one field, last write wins. `_id` values are coerced.
    ///
    /// # Errors
    /// `InvalidIdentifier` when an `_id` value cannot be coerced.
    pub fn where_eq(&mut self, field: &str, value: impl Into<Bson>) -> Result<&mut Self> {
        self.state.filter.where_eq(field, value)?;
        Ok(self)
    }

    /// # Errors
    /// `InvalidIdentifier`; nothing is applied in that case.
    pub fn where_many(&mut self, pairs: Document) -> Result<&mut Self> {
        self.state.filter.where_many(pairs)?;
        Ok(self)
    }

    /// Appends each pair to the `$or` list.
    ///
    /// # Errors
    /// `InvalidIdentifier`; nothing is applied in that case.
    pub fn or_where(&mut self, pairs: Document) -> Result<&mut Self> {
        self.state.filter.or_where(pairs)?;
        Ok(self)
    }

    pub fn where_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.state.filter.where_in(field, values);
        self
    }

    pub fn where_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.state.filter.where_not_in(field, values);
        self
    }

    pub fn where_in_all<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.state.filter.where_in_all(field, values);
        self
    }

    pub fn where_gt(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_gt(field, x);
        self
    }

    pub fn where_gte(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_gte(field, x);
        self
    }

    pub fn where_lt(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_lt(field, x);
        self
    }

    pub fn where_lte(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_lte(field, x);
        self
    }

    /// `x <= field <= y`
    pub fn where_between(&mut self, field: &str, x: impl Into<Bson>, y: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_between(field, x, y);
        self
    }

    /// `x < field < y`
    pub fn where_between_exclusive(&mut self, field: &str, x: impl Into<Bson>, y: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_between_exclusive(field, x, y);
        self
    }

    pub fn where_not_equal(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.state.filter.where_not_equal(field, x);
        self
    }

    pub fn where_near<I, V>(&mut self, field: &str, coordinates: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.state.filter.where_near(field, coordinates);
        self
    }

    pub fn like(&mut self, field: &str, value: &str, opts: &LikeOptions) -> &mut Self {
        self.state.filter.like(field, value, opts);
        self
    }

    // ---- update ----

    pub fn set(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.update.set(field, value);
        self
    }

    pub fn set_many(&mut self, pairs: Document) -> &mut Self {
        self.state.update.set_many(pairs);
        self
    }

    pub fn inc(&mut self, field: &str, by: impl Into<Bson>) -> &mut Self {
        self.state.update.inc(field, by);
        self
    }

    pub fn inc_many(&mut self, pairs: Document) -> &mut Self {
        self.state.update.inc_many(pairs);
        self
    }

    pub fn unset_field(&mut self, field: &str) -> &mut Self {
        self.state.update.unset_field(field);
        self
    }

    pub fn unset_fields<I, T>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.state.update.unset_fields(fields);
        self
    }

    pub fn push(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.update.push(field, value);
        self
    }

    pub fn push_many(&mut self, pairs: Document) -> &mut Self {
        self.state.update.push_many(pairs);
        self
    }

    pub fn push_all<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.state.update.push_all(field, values);
        self
    }

    pub fn push_all_many(&mut self, pairs: Document) -> &mut Self {
        self.state.update.push_all_many(pairs);
        self
    }

    pub fn pop(&mut self, field: &str) -> &mut Self {
        self.state.update.pop(field);
        self
    }

    pub fn pop_fields<I, T>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.state.update.pop_fields(fields);
        self
    }

    pub fn pull(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.update.pull(field, value);
        self
    }

    pub fn pull_all<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.state.update.pull_all(field, values);
        self
    }

    pub fn rename_field(&mut self, old: &str, new: &str) -> &mut Self {
        self.state.update.rename_field(old, new);
        self
    }

    pub fn rename_fields<I, A, B>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.state.update.rename_fields(pairs);
        self
    }

    // ---- shape ----

    /// Includes win: `excludes` only apply when `includes` is empty.
    pub fn select<I, E, A, B>(&mut self, includes: I, excludes: E) -> &mut Self
    where
        I: IntoIterator<Item = A>,
        E: IntoIterator<Item = B>,
        A: Into<String>,
        B: Into<String>,
    {
        self.state.shape.select(includes, excludes);
        self
    }

    /// `-1`, `false` and `"desc"` sort descending; anything else ascending.
    pub fn order_by(&mut self, fields: &Document) -> &mut Self {
        self.state.shape.order_by(fields);
        self
    }

    /// Ignored unless `n >= 1`.
    pub fn limit(&mut self, n: i64) -> &mut Self {
        self.state.shape.limit(n);
        self
    }

    /// Ignored when negative.
    pub fn offset(&mut self, n: i64) -> &mut Self {
        self.state.shape.offset(n);
        self
    }
}
