//! Filter accumulator: one clause per field plus the `$or` disjunction.

use std::sync::Arc;

use bson::{Bson, Document};

use super::clause::{self, FilterOp, Fragment, LikeOptions, Pattern};
use crate::errors::{BuilderError, Result};
use crate::types::{ID_FIELD, IdentifierCodec, OR_KEY};

/// Everything accumulated for a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Plain equality; last write wins.
    Equals(Bson),
    Pattern(Pattern),
    /// Operator map in insertion order; one entry per operator.
    Operators(Vec<(FilterOp, Bson)>),
}

impl Clause {
    /// Looks up an operator's operand, whatever form the clause currently has.
    #[must_use]
    pub fn operator(&self, op: FilterOp) -> Option<&Bson> {
        match self {
            Self::Equals(v) if op == FilterOp::Eq => Some(v),
            Self::Operators(ops) => ops.iter().find(|(o, _)| *o == op).map(|(_, v)| v),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Equals(v) => v.clone(),
            Self::Pattern(p) => Bson::Document(p.to_document()),
            Self::Operators(ops) => {
                let mut d = Document::new();
                for (op, v) in ops {
                    d.insert(op.symbol(), v.clone());
                }
                Bson::Document(d)
            }
        }
    }

    /// Folds a fragment into an existing clause.
    ///
    /// Literals and patterns are upgraded into operator entries when an operator
    /// fragment arrives; a pattern replaces any literal or earlier pattern.
    fn merge(existing: Option<Self>, fragment: Fragment) -> Self {
        match (existing, fragment) {
            (None | Some(Self::Equals(_)) | Some(Self::Pattern(_)), Fragment::Pattern(p)) => {
                Self::Pattern(p)
            }
            (Some(Self::Operators(mut ops)), Fragment::Pattern(p)) => {
                upsert_ops(&mut ops, p.to_operators());
                Self::Operators(ops)
            }
            (None, Fragment::Operators(new)) => {
                let mut ops = Vec::with_capacity(new.len());
                upsert_ops(&mut ops, new);
                Self::Operators(ops)
            }
            (Some(Self::Equals(v)), Fragment::Operators(new)) => {
                let mut ops = vec![(FilterOp::Eq, v)];
                upsert_ops(&mut ops, new);
                Self::Operators(ops)
            }
            (Some(Self::Pattern(p)), Fragment::Operators(new)) => {
                let mut ops = p.to_operators();
                upsert_ops(&mut ops, new);
                Self::Operators(ops)
            }
            (Some(Self::Operators(mut ops)), Fragment::Operators(new)) => {
                upsert_ops(&mut ops, new);
                Self::Operators(ops)
            }
        }
    }
}

fn upsert_ops(ops: &mut Vec<(FilterOp, Bson)>, new: Vec<(FilterOp, Bson)>) {
    for (op, v) in new {
        match ops.iter_mut().find(|(o, _)| *o == op) {
            Some(slot) => slot.1 = v,
            None => ops.push((op, v)),
        }
    }
}

pub struct FilterAccumulator {
    codec: Arc<dyn IdentifierCodec>,
    clauses: Vec<(String, Clause)>,
    disjunction: Option<Vec<(String, Bson)>>,
}

impl std::fmt::Debug for FilterAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterAccumulator")
            .field("clauses", &self.clauses)
            .field("disjunction", &self.disjunction)
            .finish()
    }
}

impl FilterAccumulator {
    pub fn new(codec: Arc<dyn IdentifierCodec>) -> Self {
        Self { codec, clauses: Vec::new(), disjunction: None }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.disjunction.is_none()
    }

    #[must_use]
    pub fn clause(&self, field: &str) -> Option<&Clause> {
        self.clauses.iter().find(|(f, _)| f == field).map(|(_, c)| c)
    }

    #[must_use]
    pub fn clauses(&self) -> &[(String, Clause)] {
        &self.clauses
    }

    #[must_use]
    pub fn disjunction(&self) -> Option<&[(String, Bson)]> {
        self.disjunction.as_deref()
    }

    pub fn clear(&mut self) {
        self.clauses.clear();
        self.disjunction = None;
    }

    /// Equality on one field, overwriting whatever the field held.
    ///
    /// # Errors
    /// `InvalidIdentifier` when `field` is `_id` and the value cannot be coerced.
    pub fn where_eq(&mut self, field: &str, value: impl Into<Bson>) -> Result<&mut Self> {
        let value = self.coerce(field, value.into())?;
        self.put(field, Clause::Equals(value));
        Ok(self)
    }

    /// Equality for every pair of `pairs`. Nothing is applied if any identifier fails.
    ///
    /// # Errors
    /// `InvalidIdentifier` when an `_id` value cannot be coerced.
    pub fn where_many(&mut self, pairs: Document) -> Result<&mut Self> {
        let coerced = pairs
            .into_iter()
            .map(|(k, v)| self.coerce(&k, v).map(|v| (k, v)))
            .collect::<Result<Vec<_>>>()?;
        for (k, v) in coerced {
            self.put(&k, Clause::Equals(v));
        }
        Ok(self)
    }

    /// Appends one `{field: value}` alternative per pair to the disjunction.
    ///
    /// # Errors
    /// `InvalidIdentifier` when an `_id` value cannot be coerced.
    pub fn or_where(&mut self, pairs: Document) -> Result<&mut Self> {
        if pairs.is_empty() {
            return Ok(self);
        }
        let coerced = pairs
            .into_iter()
            .map(|(k, v)| self.coerce(&k, v).map(|v| (k, v)))
            .collect::<Result<Vec<_>>>()?;
        self.disjunction.get_or_insert_with(Vec::new).extend(coerced);
        Ok(self)
    }

    /// Merges a normalizer fragment into `field`'s clause.
    pub fn apply(&mut self, field: &str, fragment: Fragment) -> &mut Self {
        let pos = self.clauses.iter().position(|(f, _)| f == field);
        match pos {
            Some(i) => {
                let slot = &mut self.clauses[i].1;
                let old = std::mem::replace(slot, Clause::Operators(Vec::new()));
                *slot = Clause::merge(Some(old), fragment);
            }
            None => self.clauses.push((field.to_string(), Clause::merge(None, fragment))),
        }
        self
    }

    pub fn where_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.apply(field, clause::membership(FilterOp::In, values))
    }

    pub fn where_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.apply(field, clause::membership(FilterOp::Nin, values))
    }

    pub fn where_in_all<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.apply(field, clause::membership(FilterOp::All, values))
    }

    pub fn where_gt(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.apply(field, clause::compare(FilterOp::Gt, x))
    }

    pub fn where_gte(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.apply(field, clause::compare(FilterOp::Gte, x))
    }

    pub fn where_lt(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.apply(field, clause::compare(FilterOp::Lt, x))
    }

    pub fn where_lte(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.apply(field, clause::compare(FilterOp::Lte, x))
    }

    pub fn where_between(
        &mut self,
        field: &str,
        x: impl Into<Bson>,
        y: impl Into<Bson>,
    ) -> &mut Self {
        self.apply(field, clause::between(x, y))
    }

    pub fn where_between_exclusive(
        &mut self,
        field: &str,
        x: impl Into<Bson>,
        y: impl Into<Bson>,
    ) -> &mut Self {
        self.apply(field, clause::between_exclusive(x, y))
    }

    pub fn where_not_equal(&mut self, field: &str, x: impl Into<Bson>) -> &mut Self {
        self.apply(field, clause::not_equal(x))
    }

    pub fn where_near<I, V>(&mut self, field: &str, coordinates: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.apply(field, clause::near(coordinates))
    }

    pub fn like(&mut self, field: &str, value: &str, opts: &LikeOptions) -> &mut Self {
        self.apply(field.trim(), clause::like(value, opts))
    }

    /// The canonical filter document; the disjunction goes last under `$or`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        for (field, c) in &self.clauses {
            out.insert(field.clone(), c.to_bson());
        }
        if let Some(alts) = &self.disjunction {
            let arr: Vec<Bson> = alts
                .iter()
                .map(|(k, v)| {
                    let mut d = Document::new();
                    d.insert(k.clone(), v.clone());
                    Bson::Document(d)
                })
                .collect();
            out.insert(OR_KEY, Bson::Array(arr));
        }
        out
    }

    fn put(&mut self, field: &str, c: Clause) {
        match self.clauses.iter_mut().find(|(f, _)| f == field) {
            Some(slot) => slot.1 = c,
            None => self.clauses.push((field.to_string(), c)),
        }
    }

    fn coerce(&self, field: &str, value: Bson) -> Result<Bson> {
        if field != ID_FIELD || self.codec.is_native(&value) {
            return Ok(value);
        }
        self.codec.coerce(&value).map_err(BuilderError::InvalidIdentifier)
    }
}
