use bson::{Bson, doc};
use mongo_fluent::query::{Bucket, UpdateAccumulator, UpdateOp};
use mongo_fluent::BuilderError;

#[test]
fn buckets_are_created_lazily_and_overwrite_per_field() {
    let mut u = UpdateAccumulator::new();
    assert!(u.is_empty());
    u.set("a", 1).inc("n", 2).set("a", 3).push("list", "x");
    assert_eq!(u.to_document(), doc! {"$set": {"a": 3}, "$inc": {"n": 2}, "$push": {"list": "x"}});
    assert!(u.bucket(UpdateOp::Pop).is_none());
}

#[test]
fn unset_and_rename_keep_every_pair() {
    let mut u = UpdateAccumulator::new();
    u.unset_field("a").unset_fields(["b", "a"]);
    u.rename_field("old", "new").rename_fields([("old", "newer")]);
    match u.bucket(UpdateOp::Unset) {
        Some(Bucket::Pairs(p)) => assert_eq!(p.len(), 3),
        other => panic!("expected pairs, got {other:?}"),
    }
    assert_eq!(u.bucket(UpdateOp::Rename).and_then(|b| b.get("old")), Some(&Bson::String("newer".into())));
    assert_eq!(u.to_document(), doc! {"$unset": {"a": 1, "b": 1}, "$rename": {"old": "newer"}});
}

#[test]
fn array_operators() {
    let mut u = UpdateAccumulator::new();
    u.push_all("tags", ["a", "b"]).pop("queue").pop_fields(["stack"]).pull("tags", "c").pull_all("ids", [1, 2]);
    assert_eq!(
        u.to_document(),
        doc! {
            "$pushAll": {"tags": ["a", "b"]},
            "$pop": {"queue": -1, "stack": -1},
            "$pull": {"tags": "c"},
            "$pullAll": {"ids": [1, 2]},
        }
    );
}

#[test]
fn batch_forms() {
    let mut u = UpdateAccumulator::new();
    u.set_many(doc! {"a": 1, "b": 2}).inc_many(doc! {"n": 1}).push_many(doc! {"l": 0}).push_all_many(doc! {"m": 5});
    assert_eq!(
        u.to_document(),
        doc! {"$set": {"a": 1, "b": 2}, "$inc": {"n": 1}, "$push": {"l": 0}, "$pushAll": {"m": [5]}}
    );
}

#[test]
fn merge_document_incoming_wins() {
    let mut u = UpdateAccumulator::new();
    u.set("a", 1).inc("n", 1);
    u.merge_document(doc! {"a": 2, "$inc": {"n": 5}}).unwrap();
    assert_eq!(u.to_document(), doc! {"$set": {"a": 2}, "$inc": {"n": 5}});
    assert!(matches!(u.merge_document(doc! {"$set": 1}), Err(BuilderError::InvalidArgument(_))));
    u.clear();
    assert!(u.is_empty());
}
