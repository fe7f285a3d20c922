use bson::{Bson, Document, doc};
use ordered_float::OrderedFloat;
use std::collections::HashSet;

use super::eval::get_path;

pub const ID_INDEX_NAME: &str = "_id_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKeyKind {
    Null,
    Str(String),
    Num(OrderedFloat<f64>),
    Bool(bool),
    Oid([u8; 12]),
    Other(String),
}

/// Equality key for a value; numbers of every width share one key space.
#[must_use]
pub fn key_from_bson(v: Option<&Bson>) -> IndexKeyKind {
    match v {
        None | Some(Bson::Null) => IndexKeyKind::Null,
        Some(Bson::String(s)) => IndexKeyKind::Str(s.clone()),
        Some(Bson::Int32(i)) => IndexKeyKind::Num(OrderedFloat(f64::from(*i))),
        #[allow(clippy::cast_precision_loss)]
        Some(Bson::Int64(i)) => IndexKeyKind::Num(OrderedFloat(*i as f64)),
        Some(Bson::Double(f)) => IndexKeyKind::Num(OrderedFloat(*f)),
        Some(Bson::Boolean(b)) => IndexKeyKind::Bool(*b),
        Some(Bson::ObjectId(o)) => IndexKeyKind::Oid(o.bytes()),
        Some(other) => IndexKeyKind::Other(format!("{other:?}")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Document,
    pub unique: bool,
}

impl IndexSpec {
    #[must_use]
    pub fn id_index() -> Self {
        Self { name: ID_INDEX_NAME.to_string(), keys: doc! {"_id": 1}, unique: true }
    }

    /// Honours the `name` and `unique` options; the default name joins each key
    /// with its direction (`a_1_b_-1`).
    #[must_use]
    pub fn from_request(keys: &Document, options: &Document) -> Self {
        let name = options.get_str("name").map(str::to_string).unwrap_or_else(|_| {
            keys.iter()
                .map(|(k, v)| format!("{k}_{v}"))
                .collect::<Vec<_>>()
                .join("_")
        });
        let unique = options.get_bool("unique").unwrap_or(false);
        Self { name, keys: keys.clone(), unique }
    }

    #[must_use]
    pub fn descriptor(&self) -> Document {
        let mut d = doc! {"v": 2, "key": self.keys.clone(), "name": self.name.clone()};
        if self.unique && self.name != ID_INDEX_NAME {
            d.insert("unique", true);
        }
        d
    }

    #[must_use]
    pub fn key_for(&self, doc: &Document) -> Vec<IndexKeyKind> {
        self.keys.keys().map(|f| key_from_bson(get_path(doc, f))).collect()
    }

    /// Whether `candidate` collides with any of `docs` other than the one at `skip`.
    #[must_use]
    pub fn collides(&self, docs: &[Document], candidate: &Document, skip: Option<usize>) -> bool {
        if !self.unique {
            return false;
        }
        let key = self.key_for(candidate);
        docs.iter()
            .enumerate()
            .any(|(i, d)| Some(i) != skip && self.key_for(d) == key)
    }

    /// Whether existing data already violates this index.
    #[must_use]
    pub fn has_duplicates(&self, docs: &[Document]) -> bool {
        let mut seen = HashSet::with_capacity(docs.len());
        self.unique && docs.iter().any(|d| !seen.insert(self.key_for(d)))
    }
}
