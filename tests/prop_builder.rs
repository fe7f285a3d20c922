use bson::doc;
use mongo_fluent::QueryBuilder;
use mongo_fluent::store::memory::{MemorySession, MemoryStore};
use mongo_fluent::types::DEFAULT_LIMIT;
use proptest::prelude::*;

fn builder() -> QueryBuilder<MemorySession> {
    QueryBuilder::new(MemoryStore::new().session("prop"))
}

proptest! {
    #[test]
    fn prop_equality_last_write_wins(field in "[a-z]{1,8}", x in any::<i64>(), y in any::<i64>()) {
        let mut b = builder();
        b.where_eq(&field, x).unwrap().where_eq(&field, y).unwrap();
        let mut expected = bson::Document::new();
        expected.insert(field, y);
        prop_assert_eq!(b.filter_document(), expected);
    }

    #[test]
    fn prop_or_where_appends(values in proptest::collection::vec(any::<i32>(), 1..20)) {
        let mut b = builder();
        for v in &values {
            b.or_where(doc! {"v": *v}).unwrap();
        }
        let rendered = b.filter_document();
        let alts = rendered.get_array("$or").unwrap();
        prop_assert_eq!(alts.len(), values.len());
    }

    #[test]
    fn prop_limit_permissive(first in 1i64..1000, second in -1000i64..1000) {
        let mut b = builder();
        b.limit(first).limit(second);
        let expected = if second >= 1 { second } else { first };
        prop_assert_eq!(b.find_spec().limit, u64::try_from(expected).unwrap());
    }

    #[test]
    fn prop_between_sets_both_bounds(lo in any::<i32>(), hi in any::<i32>()) {
        let mut b = builder();
        b.where_between("n", lo, hi);
        prop_assert_eq!(b.filter_document(), doc! {"n": {"$gte": lo, "$lte": hi}});
    }

    #[test]
    fn prop_get_sorts_filters_and_resets(
        rows in proptest::collection::vec((any::<i32>(), any::<bool>()), 0..40),
        limit in 1i64..50,
    ) {
        let mut b = builder();
        for (n, keep) in &rows {
            b.insert("rows", doc! {"n": *n, "keep": *keep}).unwrap();
        }
        let docs = b
            .where_eq("keep", true)
            .unwrap()
            .order_by(&doc! {"n": "desc"})
            .limit(limit)
            .get("rows")
            .unwrap();
        let kept = rows.iter().filter(|(_, k)| *k).count();
        prop_assert_eq!(docs.len(), kept.min(usize::try_from(limit).unwrap()));
        for w in docs.windows(2) {
            prop_assert!(w[0].get_i32("n").unwrap() >= w[1].get_i32("n").unwrap());
        }
        prop_assert!(b.state().is_baseline());
        prop_assert_eq!(b.find_spec().limit, DEFAULT_LIMIT);
    }
}
