//! Update accumulator: field assignments grouped by update operator.

use bson::{Bson, Document};

use crate::errors::{BuilderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    Set,
    Inc,
    Unset,
    Push,
    PushAll,
    Pop,
    Pull,
    PullAll,
    Rename,
}

impl UpdateOp {
    pub const ALL: [Self; 9] = [
        Self::Set,
        Self::Inc,
        Self::Unset,
        Self::Push,
        Self::PushAll,
        Self::Pop,
        Self::Pull,
        Self::PullAll,
        Self::Rename,
    ];

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Set => "$set",
            Self::Inc => "$inc",
            Self::Unset => "$unset",
            Self::Push => "$push",
            Self::PushAll => "$pushAll",
            Self::Pop => "$pop",
            Self::Pull => "$pull",
            Self::PullAll => "$pullAll",
            Self::Rename => "$rename",
        }
    }

    #[must_use]
    pub fn from_symbol(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == s)
    }

    /// `$unset` and `$rename` accumulate a list of pairs instead of a per-field map.
    #[must_use]
    pub const fn is_pair_list(self) -> bool {
        matches!(self, Self::Unset | Self::Rename)
    }
}

/// One operator's assignments.
#[derive(Debug, Clone, PartialEq)]
pub enum Bucket {
    /// At most one entry per field; a later write replaces the value in place.
    Keyed(Vec<(String, Bson)>),
    /// Append-only; repeated fields are kept.
    Pairs(Vec<(String, Bson)>),
}

impl Bucket {
    fn for_op(op: UpdateOp) -> Self {
        if op.is_pair_list() { Self::Pairs(Vec::new()) } else { Self::Keyed(Vec::new()) }
    }

    fn write(&mut self, field: String, value: Bson) {
        match self {
            Self::Keyed(entries) => match entries.iter_mut().find(|(f, _)| *f == field) {
                Some(slot) => slot.1 = value,
                None => entries.push((field, value)),
            },
            Self::Pairs(entries) => entries.push((field, value)),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, Bson)] {
        match self {
            Self::Keyed(e) | Self::Pairs(e) => e,
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.entries().iter().rev().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    /// Wire form; for pair lists a repeated field keeps its latest value.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut d = Document::new();
        for (f, v) in self.entries() {
            d.insert(f.clone(), v.clone());
        }
        d
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateAccumulator {
    buckets: Vec<(UpdateOp, Bucket)>,
}

impl UpdateAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    #[must_use]
    pub fn bucket(&self, op: UpdateOp) -> Option<&Bucket> {
        self.buckets.iter().find(|(o, _)| *o == op).map(|(_, b)| b)
    }

    /// Writes one assignment, creating the operator's bucket on first use.
    pub fn write(&mut self, op: UpdateOp, field: impl Into<String>, value: impl Into<Bson>) -> &mut Self {
        let idx = match self.buckets.iter().position(|(o, _)| *o == op) {
            Some(i) => i,
            None => {
                self.buckets.push((op, Bucket::for_op(op)));
                self.buckets.len() - 1
            }
        };
        self.buckets[idx].1.write(field.into(), value.into());
        self
    }

    fn write_all(&mut self, op: UpdateOp, pairs: Document) -> &mut Self {
        for (k, v) in pairs {
            self.write(op, k, v);
        }
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.write(UpdateOp::Set, field, value)
    }

    pub fn set_many(&mut self, pairs: Document) -> &mut Self {
        self.write_all(UpdateOp::Set, pairs)
    }

    pub fn inc(&mut self, field: &str, by: impl Into<Bson>) -> &mut Self {
        self.write(UpdateOp::Inc, field, by)
    }

    pub fn inc_many(&mut self, pairs: Document) -> &mut Self {
        self.write_all(UpdateOp::Inc, pairs)
    }

    pub fn unset_field(&mut self, field: &str) -> &mut Self {
        self.write(UpdateOp::Unset, field, 1)
    }

    pub fn unset_fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for f in fields {
            self.write(UpdateOp::Unset, f, 1);
        }
        self
    }

    pub fn push(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.write(UpdateOp::Push, field, value)
    }

    pub fn push_many(&mut self, pairs: Document) -> &mut Self {
        self.write_all(UpdateOp::Push, pairs)
    }

    pub fn push_all<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let list: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.write(UpdateOp::PushAll, field, Bson::Array(list))
    }

    /// Batch `$pushAll`; a non-array value is pushed as a one-element list.
    pub fn push_all_many(&mut self, pairs: Document) -> &mut Self {
        for (k, v) in pairs {
            let list = match v {
                Bson::Array(a) => a,
                other => vec![other],
            };
            self.write(UpdateOp::PushAll, k, Bson::Array(list));
        }
        self
    }

    /// Removes the first element of the array.
    pub fn pop(&mut self, field: &str) -> &mut Self {
        self.write(UpdateOp::Pop, field, -1)
    }

    pub fn pop_fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for f in fields {
            self.write(UpdateOp::Pop, f, -1);
        }
        self
    }

    pub fn pull(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.write(UpdateOp::Pull, field, value)
    }

    pub fn pull_all<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let list: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.write(UpdateOp::PullAll, field, Bson::Array(list))
    }

    pub fn rename_field(&mut self, old: &str, new: &str) -> &mut Self {
        self.write(UpdateOp::Rename, old, new)
    }

    pub fn rename_fields<I, A, B>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        for (old, new) in pairs {
            let new: String = new.into();
            self.write(UpdateOp::Rename, old, new);
        }
        self
    }

    /// Folds an update document in, the incoming values winning per field.
    ///
    /// `$`-prefixed keys name operator buckets and must hold a sub-document; any
    /// other key is treated as a `$set` assignment.
    ///
    /// # Errors
    /// `InvalidArgument` for an unknown operator or a bucket that is not a document.
    pub fn merge_document(&mut self, update: Document) -> Result<&mut Self> {
        let mut plain = Document::new();
        let mut buckets = Vec::new();
        for (k, v) in update {
            if !k.starts_with('$') {
                plain.insert(k, v);
                continue;
            }
            let op = UpdateOp::from_symbol(&k)
                .ok_or_else(|| BuilderError::InvalidArgument(format!("unknown update operator {k}")))?;
            match v {
                Bson::Document(d) => buckets.push((op, d)),
                other => {
                    return Err(BuilderError::InvalidArgument(format!(
                        "{k} expects a document, got {:?}",
                        other.element_type()
                    )));
                }
            }
        }
        for (op, d) in buckets {
            self.write_all(op, d);
        }
        self.write_all(UpdateOp::Set, plain);
        Ok(self)
    }

    /// The canonical update document, operators in first-use order.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut out = Document::new();
        for (op, bucket) in &self.buckets {
            out.insert(op.symbol(), Bson::Document(bucket.to_document()));
        }
        out
    }
}
