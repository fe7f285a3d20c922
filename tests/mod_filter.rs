use bson::{Bson, doc, oid::ObjectId};
use mongo_fluent::query::{Clause, FilterOp};
use mongo_fluent::store::memory::MemoryStore;
use mongo_fluent::{BuilderError, LikeOptions, PassthroughCodec, QueryBuilder};
use std::sync::Arc;

fn builder() -> QueryBuilder<mongo_fluent::store::memory::MemorySession> {
    QueryBuilder::new(MemoryStore::new().session("t"))
}

#[test]
fn equality_is_last_write_wins() {
    let mut b = builder();
    b.where_eq("a", 1).unwrap().where_eq("a", 2).unwrap();
    assert_eq!(b.filter_document(), doc! {"a": 2});
}

#[test]
fn or_where_appends_alternatives() {
    let mut b = builder();
    b.or_where(doc! {"a": 1}).unwrap().or_where(doc! {"b": 2}).unwrap().or_where(doc! {}).unwrap();
    assert_eq!(b.filter_document(), doc! {"$or": [{"a": 1}, {"b": 2}]});
    assert_eq!(b.state().filter.disjunction().map(<[_]>::len), Some(2));
}

#[test]
fn ranges_compose_on_one_field() {
    let mut b = builder();
    b.where_between("n", 10, 20);
    assert_eq!(b.filter_document(), doc! {"n": {"$gte": 10, "$lte": 20}});
    b.reset().where_between_exclusive("n", 10, 20).where_not_equal("n", 15);
    assert_eq!(b.filter_document(), doc! {"n": {"$gt": 10, "$lt": 20, "$ne": 15}});
    // an operator already present is overwritten in place
    b.where_gt("n", 11);
    assert_eq!(b.filter_document(), doc! {"n": {"$gt": 11, "$lt": 20, "$ne": 15}});
}

#[test]
fn membership_and_near() {
    let mut b = builder();
    b.where_in("tags", ["a", "b"]).where_not_in("state", [0, 1]).where_in_all("roles", ["x"]);
    b.where_near("loc", [1.5, -2.0]);
    assert_eq!(
        b.filter_document(),
        doc! {
            "tags": {"$in": ["a", "b"]},
            "state": {"$nin": [0, 1]},
            "roles": {"$all": ["x"]},
            "loc": {"$near": [1.5, -2.0]},
        }
    );
}

#[test]
fn equality_upgrades_into_eq_when_an_operator_arrives() {
    let mut b = builder();
    b.where_eq("n", 5).unwrap().where_lt("n", 9);
    assert_eq!(b.filter_document(), doc! {"n": {"$eq": 5, "$lt": 9}});
    assert_eq!(b.state().filter.clause("n").and_then(|c| c.operator(FilterOp::Eq)), Some(&Bson::Int32(5)));
}

#[test]
fn like_patterns() {
    let mut b = builder();
    b.like("name", "O'Brien", &LikeOptions::default().anchor_start());
    match b.state().filter.clause("name") {
        Some(Clause::Pattern(p)) => {
            assert!(p.is_case_insensitive());
            assert!(p.is_anchored_start());
            assert!(!p.is_anchored_end());
        }
        other => panic!("expected a pattern, got {other:?}"),
    }

    b.reset().like("path", " a.b$ ", &LikeOptions::default().flags("mxi").anchor_end());
    assert_eq!(b.filter_document(), doc! {"path": {"$regex": "a\\.b\\$$", "$options": "imx"}});

    // a pattern next to other operators becomes $regex/$options entries
    b.reset().where_not_equal("s", "zz").like("s", "z", &LikeOptions::default().flags(""));
    assert_eq!(b.filter_document(), doc! {"s": {"$ne": "zz", "$regex": "z"}});
}

#[test]
fn identifier_coercion() {
    let mut b = builder();
    let oid = ObjectId::new();
    b.where_many(doc! {"_id": oid.to_hex(), "x": 1}).unwrap();
    assert_eq!(b.filter_document(), doc! {"_id": oid, "x": 1});

    let err = b.reset().where_many(doc! {"x": 1, "_id": 42}).unwrap_err();
    assert!(matches!(err, BuilderError::InvalidIdentifier(_)));
    assert!(b.filter_document().is_empty(), "nothing applied on failure");

    assert!(b.or_where(doc! {"_id": "zz"}).is_err());

    let mut raw = QueryBuilder::with_codec(MemoryStore::new().session("t"), Arc::new(PassthroughCodec));
    raw.where_eq("_id", "plain").unwrap();
    assert_eq!(raw.filter_document(), doc! {"_id": "plain"});
}
