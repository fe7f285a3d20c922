use bson::{Bson, Document};
use std::cmp::Ordering;

// Safety limits
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_SORT_FIELDS: usize = 8;

/// Evaluates a rendered filter document against `doc`.
pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, cond)| match k.as_str() {
        "$or" => sub_filters(cond).any(|f| matches(doc, f)),
        "$and" => sub_filters(cond).all(|f| matches(doc, f)),
        "$nor" => !sub_filters(cond).any(|f| matches(doc, f)),
        _ => field_matches(get_path(doc, k), cond),
    })
}

fn sub_filters(cond: &Bson) -> impl Iterator<Item = &Document> {
    cond.as_array().into_iter().flatten().filter_map(Bson::as_document)
}

pub fn field_matches(value: Option<&Bson>, cond: &Bson) -> bool {
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => eval_operators(value, ops),
        expected => value.is_some_and(|v| equals_or_contains(v, expected)),
    }
}

pub(crate) fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}

fn eval_operators(value: Option<&Bson>, ops: &Document) -> bool {
    let options = ops.get("$options").and_then(Bson::as_str).unwrap_or("");
    ops.iter().all(|(op, arg)| match op.as_str() {
        "$eq" => value.is_some_and(|v| equals_or_contains(v, arg)),
        "$ne" => !value.is_some_and(|v| equals_or_contains(v, arg)),
        "$gt" => cmp_matches(value, arg, |o| o == Ordering::Greater),
        "$gte" => cmp_matches(value, arg, |o| o != Ordering::Less),
        "$lt" => cmp_matches(value, arg, |o| o == Ordering::Less),
        "$lte" => cmp_matches(value, arg, |o| o != Ordering::Greater),
        "$in" => value.is_some_and(|v| in_list(v, arg)),
        "$nin" => !value.is_some_and(|v| in_list(v, arg)),
        "$all" => contains_all(value, arg),
        "$exists" => value.is_some() == arg.as_bool().unwrap_or(true),
        "$near" => value.and_then(coordinates).is_some(),
        "$regex" => value.is_some_and(|v| regex_matches(v, arg, options)),
        "$options" => true,
        "$not" => match arg {
            Bson::Document(d) => !eval_operators(value, d),
            _ => false,
        },
        _ => false,
    })
}

fn elements(v: &Bson) -> Vec<&Bson> {
    match v {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn equals_or_contains(v: &Bson, expected: &Bson) -> bool {
    values_equal(v, expected)
        || matches!(v, Bson::Array(items) if items.iter().any(|i| values_equal(i, expected)))
}

fn cmp_matches(value: Option<&Bson>, arg: &Bson, pred: impl Fn(Ordering) -> bool) -> bool {
    value.is_some_and(|v| elements(v).into_iter().any(|e| compare_same_class(e, arg).is_some_and(&pred)))
}

fn in_list(v: &Bson, list: &Bson) -> bool {
    let Some(list) = list.as_array() else { return false };
    list.iter().any(|x| equals_or_contains(v, x))
}

fn contains_all(value: Option<&Bson>, list: &Bson) -> bool {
    let (Some(v), Some(list)) = (value, list.as_array()) else { return false };
    !list.is_empty() && list.iter().all(|x| equals_or_contains(v, x))
}

fn regex_matches(v: &Bson, pattern: &Bson, options: &str) -> bool {
    let Some(pattern) = pattern.as_str() else { return false };
    let mut re = regex::RegexBuilder::new(pattern);
    re.case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'));
    let Ok(re) = re.build() else { return false };
    elements(v).into_iter().any(|e| e.as_str().is_some_and(|s| re.is_match(s)))
}

/// A `[x, y]` pair or a GeoJSON point.
pub fn coordinates(v: &Bson) -> Option<(f64, f64)> {
    match v {
        Bson::Array(items) if items.len() == 2 => Some((as_f64(&items[0])?, as_f64(&items[1])?)),
        Bson::Document(d) => d.get("coordinates").and_then(coordinates),
        _ => None,
    }
}

/// First top-level `$near` clause of a filter.
pub fn near_target(filter: &Document) -> Option<(String, (f64, f64))> {
    filter.iter().find_map(|(field, cond)| {
        let ops = cond.as_document()?;
        let target = ops.get("$near")?;
        let point = match target {
            Bson::Document(d) => d.get("$geometry").and_then(coordinates),
            other => coordinates(other),
        }?;
        Some((field.clone(), point))
    })
}

pub fn distance(doc: &Document, field: &str, to: (f64, f64)) -> f64 {
    get_path(doc, field)
        .and_then(coordinates)
        .map_or(f64::INFINITY, |(x, y)| ((x - to.0).powi(2) + (y - to.1).powi(2)).sqrt())
}

pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        cur = cur.as_document()?.get(part)?;
    }
    Some(cur)
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering within one type class; `None` when the classes differ.
fn compare_same_class(a: &Bson, b: &Bson) -> Option<Ordering> {
    if is_num(a) && is_num(b) {
        return as_f64(a)?.partial_cmp(&as_f64(b)?);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        _ => None,
    }
}

/// Total order used for sorting: by type class first, then by value.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        let x = as_f64(a).unwrap_or(f64::NAN);
        let y = as_f64(b).unwrap_or(f64::NAN);
        return x.total_cmp(&y);
    }
    compare_same_class(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}

/// Compares two documents under an ordered `{field: 1 | -1}` sort document.
pub fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, dir) in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let desc = as_f64(dir).is_some_and(|d| d < 0.0);
            return if desc { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

/// Applies an include (`1`) or exclude (`0`) projection to top-level fields.
/// `_id` is kept in include mode unless explicitly excluded.
pub fn project(doc: &Document, projection: &Document) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }
    let truthy = |v: &Bson| as_f64(v).map_or_else(|| v.as_bool().unwrap_or(false), |n| n != 0.0);
    let include = projection.iter().any(|(k, v)| k != "_id" && truthy(v));
    let top = |k: &str| k.split('.').next().unwrap_or(k).to_string();
    if include {
        let mut out = Document::new();
        let keep_id = projection.get("_id").is_none_or(truthy);
        if keep_id && let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
        for (k, v) in projection {
            let key = top(k);
            if key != "_id" && truthy(v) && let Some(val) = doc.get(&key) {
                out.insert(key, val.clone());
            }
        }
        out
    } else {
        let mut out = doc.clone();
        for (k, v) in projection {
            if !truthy(v) {
                out.remove(&top(k));
            }
        }
        out
    }
}
