use bson::doc;
use mongo_fluent::query::{Order, QueryShape, Selection, SortSpec, normalize_directions};
use mongo_fluent::types::DEFAULT_LIMIT;

#[test]
fn order_by_directions() {
    let mut s = QueryShape::default();
    s.order_by(&doc! {"a": -1, "b": "asc"});
    assert_eq!(
        s.sort,
        vec![SortSpec { field: "a".into(), order: Order::Desc }, SortSpec { field: "b".into(), order: Order::Asc }]
    );
    s.clear();
    s.order_by(&doc! {"a": "DESC", "b": false, "c": 1, "d": "whatever"});
    assert_eq!(s.sort_document(), doc! {"a": -1, "b": -1, "c": 1, "d": 1});
}

#[test]
fn limit_and_offset_ignore_bad_input() {
    let mut s = QueryShape::default();
    assert_eq!(s.limit, DEFAULT_LIMIT);
    s.limit(0).limit(-5);
    assert_eq!(s.limit, DEFAULT_LIMIT);
    s.limit(5);
    assert_eq!(s.limit, 5);
    s.offset(-1);
    assert_eq!(s.offset, 0);
    s.offset(7).offset(0);
    assert_eq!(s.offset, 0);
}

#[test]
fn includes_win_over_excludes() {
    let mut s = QueryShape::default();
    s.select(Vec::<String>::new(), ["secret"]);
    assert_eq!(s.projection.to_document(), doc! {"secret": 0});
    s.select(["name"], ["ignored"]);
    assert_eq!(s.projection.get("ignored"), None);
    assert!(s.projection.has_include());
    assert_eq!(s.projection.get("name"), Some(Selection::Include));
    // once an include exists the earlier exclude no longer renders
    assert_eq!(s.projection.to_document(), doc! {"name": 1});
}

#[test]
fn index_directions_share_the_sort_convention() {
    assert_eq!(normalize_directions(&doc! {"a": "desc", "b": 1, "c": -1_i64}), doc! {"a": -1, "b": 1, "c": -1});
}
