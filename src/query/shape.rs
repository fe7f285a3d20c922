//! Projection, sort order and pagination.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// `-1`, `false` and `"desc"` (any case) mean descending; anything else ascending.
    #[must_use]
    pub fn from_bson(v: &Bson) -> Self {
        let desc = match v {
            Bson::Int32(i) => *i == -1,
            Bson::Int64(i) => *i == -1,
            Bson::Double(f) => *f == -1.0,
            Bson::Boolean(b) => !*b,
            Bson::String(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("desc") || s == "-1"
            }
            _ => false,
        };
        if desc { Self::Desc } else { Self::Asc }
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Rewrites every value of `keys` to `1` or `-1`.
#[must_use]
pub fn normalize_directions(keys: &Document) -> Document {
    let mut out = Document::new();
    for (k, v) in keys {
        out.insert(k.clone(), Order::from_bson(v).as_i32());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    entries: Vec<(String, Selection)>,
}

impl Projection {
    fn mark(&mut self, field: String, sel: Selection) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = sel,
            None => self.entries.push((field, sel)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn has_include(&self) -> bool {
        self.entries.iter().any(|(_, s)| *s == Selection::Include)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<Selection> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, s)| *s)
    }

    /// As soon as one include is present every exclude is dropped.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let include = self.has_include();
        let mut out = Document::new();
        for (f, s) in &self.entries {
            match (include, s) {
                (true, Selection::Include) => {
                    out.insert(f.clone(), 1);
                }
                (false, Selection::Exclude) => {
                    out.insert(f.clone(), 0);
                }
                _ => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub projection: Projection,
    pub sort: Vec<SortSpec>,
    pub limit: u64,
    pub offset: u64,
}

impl Default for QueryShape {
    fn default() -> Self {
        Self { projection: Projection::default(), sort: Vec::new(), limit: DEFAULT_LIMIT, offset: 0 }
    }
}

impl QueryShape {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Marks `includes`; only when that is empty are `excludes` marked.
    pub fn select<I, E, S, T>(&mut self, includes: I, excludes: E) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let includes: Vec<String> = includes.into_iter().map(Into::into).collect();
        if includes.is_empty() {
            for f in excludes {
                self.projection.mark(f.into(), Selection::Exclude);
            }
        } else {
            for f in includes {
                self.projection.mark(f, Selection::Include);
            }
        }
        self
    }

    pub fn order_by(&mut self, fields: &Document) -> &mut Self {
        for (f, v) in fields {
            self.order_by_field(f, Order::from_bson(v));
        }
        self
    }

    /// Re-sorting a field keeps its original position.
    pub fn order_by_field(&mut self, field: &str, order: Order) -> &mut Self {
        match self.sort.iter_mut().find(|s| s.field == field) {
            Some(s) => s.order = order,
            None => self.sort.push(SortSpec { field: field.to_string(), order }),
        }
        self
    }

    /// Values below 1 are ignored.
    pub fn limit(&mut self, n: i64) -> &mut Self {
        if let Ok(n) = u64::try_from(n)
            && n >= 1
        {
            self.limit = n;
        }
        self
    }

    /// Negative values are ignored.
    pub fn offset(&mut self, n: i64) -> &mut Self {
        if let Ok(n) = u64::try_from(n) {
            self.offset = n;
        }
        self
    }

    #[must_use]
    pub fn sort_document(&self) -> Document {
        let mut out = Document::new();
        for s in &self.sort {
            out.insert(s.field.clone(), s.order.as_i32());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn order_from_bson_variants() {
        assert_eq!(Order::from_bson(&Bson::Int32(-1)), Order::Desc);
        assert_eq!(Order::from_bson(&Bson::Boolean(false)), Order::Desc);
        assert_eq!(Order::from_bson(&Bson::String("DeSc".into())), Order::Desc);
        assert_eq!(Order::from_bson(&Bson::String("asc".into())), Order::Asc);
        assert_eq!(Order::from_bson(&Bson::Int32(0)), Order::Asc);
        assert_eq!(Order::from_bson(&Bson::Boolean(true)), Order::Asc);
    }

    #[test]
    fn include_beats_exclude_across_calls() {
        let mut s = QueryShape::default();
        s.select(Vec::<String>::new(), ["secret"]);
        assert_eq!(s.projection.to_document(), doc! {"secret": 0});
        s.select(["name"], ["ignored"]);
        assert_eq!(s.projection.to_document(), doc! {"name": 1});
        assert_eq!(s.projection.get("ignored"), None);
    }

    #[test]
    fn limit_and_offset_ignore_bad_input() {
        let mut s = QueryShape::default();
        s.limit(0).limit(-5);
        assert_eq!(s.limit, DEFAULT_LIMIT);
        s.limit(5).offset(-1);
        assert_eq!((s.limit, s.offset), (5, 0));
        s.offset(3).offset(0);
        assert_eq!(s.offset, 0);
    }

    #[test]
    fn normalize_directions_maps_every_key() {
        let keys = doc! {"a": "ASC", "b": -1, "c": false};
        assert_eq!(normalize_directions(&keys), doc! {"a": 1, "b": -1, "c": -1});
    }
}
