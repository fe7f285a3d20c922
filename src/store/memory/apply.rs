use bson::{Bson, Document};

use super::eval::{as_f64, field_matches, is_operator_doc, matches, values_equal};
use crate::errors::StoreError;

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> Option<&'a mut Document> {
    if !matches!(root.get(key), Some(Bson::Document(_))) {
        root.insert(key.to_string(), Bson::Document(Document::new()));
    }
    root.get_mut(key).and_then(Bson::as_document_mut)
}

/// Walks `path` creating intermediate sub-documents; returns the parent and the last segment.
fn traverse_to_parent<'a>(root: &'a mut Document, path: &str) -> Option<(&'a mut Document, String)> {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            return Some((cur, seg.to_string()));
        }
        cur = ensure_subdoc(cur, seg)?;
    }
    None
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> bool {
    let Some((parent, last)) = traverse_to_parent(root, path) else { return false };
    let old = parent.insert(last, value.clone());
    old.as_ref() != Some(&value)
}

fn get_path(root: &Document, path: &str) -> Option<Bson> {
    super::eval::get_path(root, path).cloned()
}

fn unset_path(root: &mut Document, path: &str) -> bool {
    if get_path(root, path).is_none() {
        return false;
    }
    traverse_to_parent(root, path).is_some_and(|(parent, last)| parent.remove(&last).is_some())
}

/// Integer widths are kept while the sum fits; anything else becomes a double.
#[allow(clippy::cast_precision_loss)]
fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    let as_i64 = |v: &Bson| match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    };
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => Some(
            x.checked_add(*y).map_or_else(|| Bson::Int64(i64::from(*x) + i64::from(*y)), Bson::Int32),
        ),
        _ => match (as_i64(a), as_i64(b)) {
            (Some(x), Some(y)) => Some(
                x.checked_add(y).map_or_else(|| Bson::Double(x as f64 + y as f64), Bson::Int64),
            ),
            _ => Some(Bson::Double(as_f64(a)? + as_f64(b)?)),
        },
    }
}

fn array_at(root: &Document, path: &str, op: &str) -> Result<Vec<Bson>, StoreError> {
    match get_path(root, path) {
        None => Ok(Vec::new()),
        Some(Bson::Array(a)) => Ok(a),
        Some(_) => Err(StoreError::with_code(
            format!("Cannot apply {op} to non-array field '{path}'"),
            2,
        )),
    }
}

fn bucket<'a>(op: &str, arg: &'a Bson) -> Result<&'a Document, StoreError> {
    arg.as_document()
        .ok_or_else(|| StoreError::with_code(format!("Modifiers operate on fields but {op} has none"), 9))
}

fn pull_matches(elem: &Bson, cond: &Bson) -> bool {
    match (elem, cond) {
        (_, Bson::Document(c)) if is_operator_doc(c) => field_matches(Some(elem), cond),
        (Bson::Document(e), Bson::Document(c)) => matches(e, c),
        _ => values_equal(elem, cond),
    }
}

/// Applies a rendered update document in place, returning whether anything changed.
///
/// A document without `$` operators replaces every field except `_id`.
///
/// # Errors
/// Unknown operators, non-numeric `$inc` targets and non-array targets of array operators.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, StoreError> {
    if !update.keys().any(|k| k.starts_with('$')) {
        let mut replacement = update.clone();
        if let Some(id) = doc.get("_id") {
            replacement.insert("_id", id.clone());
        }
        let changed = *doc != replacement;
        *doc = replacement;
        return Ok(changed);
    }
    let mut changed = false;
    for (op, arg) in update {
        let fields = bucket(op, arg)?;
        for (path, v) in fields {
            changed |= match op.as_str() {
                "$set" => set_path(doc, path, v.clone()),
                "$unset" => unset_path(doc, path),
                "$inc" => {
                    let cur = get_path(doc, path).unwrap_or(Bson::Int32(0));
                    let sum = add_numbers(&cur, v).ok_or_else(|| {
                        StoreError::with_code(
                            format!("Cannot apply $inc to a value of non-numeric type at '{path}'"),
                            14,
                        )
                    })?;
                    set_path(doc, path, sum)
                }
                "$push" => {
                    let mut arr = array_at(doc, path, op)?;
                    match v.as_document().and_then(|d| d.get("$each")) {
                        Some(Bson::Array(each)) => arr.extend(each.iter().cloned()),
                        _ => arr.push(v.clone()),
                    }
                    set_path(doc, path, Bson::Array(arr))
                }
                "$pushAll" => {
                    let mut arr = array_at(doc, path, op)?;
                    let Bson::Array(items) = v else {
                        return Err(StoreError::with_code("$pushAll requires an array argument", 2));
                    };
                    arr.extend(items.iter().cloned());
                    set_path(doc, path, Bson::Array(arr))
                }
                "$pop" => {
                    let mut arr = array_at(doc, path, op)?;
                    if arr.is_empty() {
                        false
                    } else {
                        if as_f64(v).is_some_and(|n| n < 0.0) {
                            arr.remove(0);
                        } else {
                            arr.pop();
                        }
                        set_path(doc, path, Bson::Array(arr))
                    }
                }
                "$pull" => {
                    let mut arr = array_at(doc, path, op)?;
                    let before = arr.len();
                    arr.retain(|e| !pull_matches(e, v));
                    arr.len() != before && set_path(doc, path, Bson::Array(arr))
                }
                "$pullAll" => {
                    let mut arr = array_at(doc, path, op)?;
                    let Bson::Array(items) = v else {
                        return Err(StoreError::with_code("$pullAll requires an array argument", 2));
                    };
                    let before = arr.len();
                    arr.retain(|e| !items.iter().any(|x| values_equal(e, x)));
                    arr.len() != before && set_path(doc, path, Bson::Array(arr))
                }
                "$rename" => {
                    let Some(target) = v.as_str() else {
                        return Err(StoreError::with_code("$rename target must be a string", 2));
                    };
                    match get_path(doc, path) {
                        Some(val) => {
                            unset_path(doc, path);
                            set_path(doc, target, val);
                            true
                        }
                        None => false,
                    }
                }
                other => {
                    return Err(StoreError::with_code(format!("Unknown modifier: {other}"), 9));
                }
            };
        }
    }
    Ok(changed)
}
