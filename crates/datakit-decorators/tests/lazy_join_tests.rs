mod common;

use common::{caller, library, projection, record, values, Call};
use datakit_core::{
    AggregateOperation, Aggregation, Collection, ConditionTree, Filter, Operator,
    PaginatedFilter, Sort,
};
use datakit_decorators::LazyJoinCollection;
use serde_json::json;

#[tokio::test]
async fn test_relation_read_through_its_key_skips_the_join() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let records = customers
        .list(&caller(), &PaginatedFilter::new(), &projection(&["id", "card:id"]))
        .await
        .unwrap();

    assert_eq!(
        values(&records),
        vec![
            json!({"id": 1, "card": {"id": 2}}),
            json!({"id": 2}),
            json!({"id": 3, "card": {"id": 1}}),
        ]
    );
    assert_eq!(
        source.memory_collection("customers").listed_projections(),
        vec![vec!["id", "card_id"]]
    );
}

#[tokio::test]
async fn test_requested_foreign_key_is_kept() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let records = customers
        .list(
            &caller(),
            &PaginatedFilter::new(),
            &projection(&["card_id", "card:id"]),
        )
        .await
        .unwrap();

    assert_eq!(records[0], record(json!({"card_id": 2, "card": {"id": 2}})));
    assert_eq!(records[1], record(json!({"card_id": null})));
    assert_eq!(
        source.memory_collection("customers").listed_projections(),
        vec![vec!["card_id"]]
    );
}

#[tokio::test]
async fn test_other_relation_fields_still_join() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let records = customers
        .list(
            &caller(),
            &PaginatedFilter::new(),
            &projection(&["id", "card:id", "card:type"]),
        )
        .await
        .unwrap();

    assert_eq!(
        records[0],
        record(json!({"id": 1, "card": {"id": 2, "type": "amex"}}))
    );
    assert_eq!(records[1], record(json!({"id": 2, "card": null})));
    assert_eq!(
        source.memory_collection("customers").listed_projections(),
        vec![vec!["id", "card:id", "card:type"]]
    );
}

#[tokio::test]
async fn test_filters_on_the_target_key_use_the_foreign_key() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let filter = PaginatedFilter::new()
        .with_condition_tree(ConditionTree::leaf("card:id", Operator::Present, json!(null)))
        .with_sort(Sort::new().descending("card:id"));
    let records = customers
        .list(&caller(), &filter, &projection(&["name"]))
        .await
        .unwrap();

    assert_eq!(
        values(&records),
        vec![json!({"name": "Ann"}), json!({"name": "Cid"})]
    );

    let calls = source.memory_collection("customers").calls();
    let Call::List { filter, .. } = &calls[0] else {
        panic!("expected a list call");
    };
    let fields: Vec<String> = filter.condition_tree.as_ref().unwrap().projection().into();
    assert_eq!(fields, vec!["card_id"]);
    assert_eq!(filter.sort.as_ref().unwrap().clauses[0].field, "card_id");
}

#[tokio::test]
async fn test_filters_on_other_relation_fields_are_untouched() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let filter = PaginatedFilter::new().with_condition_tree(ConditionTree::leaf(
        "card:type",
        Operator::Equal,
        json!("visa"),
    ));
    let records = customers
        .list(&caller(), &filter, &projection(&["name"]))
        .await
        .unwrap();

    assert_eq!(values(&records), vec![json!({"name": "Cid"})]);

    let calls = source.memory_collection("customers").calls();
    let Call::List { filter, .. } = &calls[0] else {
        panic!("expected a list call");
    };
    let fields: Vec<String> = filter.condition_tree.as_ref().unwrap().projection().into();
    assert_eq!(fields, vec!["card:type"]);
}

#[tokio::test]
async fn test_aggregate_groups_are_renamed_back() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let aggregation = Aggregation::new(AggregateOperation::Count).with_group("card:id", None);
    let results = customers
        .aggregate(&caller(), &Filter::new(), &aggregation, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|result| result.group.contains_key("card:id") && !result.group.contains_key("card_id")));

    let calls = source.memory_collection("customers").calls();
    let Call::Aggregate { aggregation, .. } = &calls[0] else {
        panic!("expected an aggregate call");
    };
    assert_eq!(aggregation.groups[0].field, "card_id");
}

#[tokio::test]
async fn test_aggregate_keeps_a_requested_foreign_key_group() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source);
    let customers = lazy.collection("customers").unwrap();

    let aggregation = Aggregation::new(AggregateOperation::Count)
        .with_group("card_id", None)
        .with_group("card:id", None);
    let results = customers
        .aggregate(&caller(), &Filter::new(), &aggregation, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for result in &results {
        assert_eq!(result.group.get("card_id"), result.group.get("card:id"));
        assert!(result.group.contains_key("card_id"));
    }
}

#[tokio::test]
async fn test_update_filter_is_rewritten() {
    let source = library();
    let lazy = LazyJoinCollection::decorate(source.clone());
    let customers = lazy.collection("customers").unwrap();

    let filter = Filter::new().with_condition_tree(ConditionTree::leaf(
        "card:id",
        Operator::Equal,
        json!(1),
    ));
    customers
        .update(&caller(), &filter, record(json!({"name": "Cyd"})))
        .await
        .unwrap();

    let calls = source.memory_collection("customers").calls();
    let Call::Update { filter } = &calls[0] else {
        panic!("expected an update call");
    };
    let fields: Vec<String> = filter.condition_tree.as_ref().unwrap().projection().into();
    assert_eq!(fields, vec!["card_id"]);

    let records = customers
        .list(
            &caller(),
            &PaginatedFilter::new(),
            &projection(&["name"]),
        )
        .await
        .unwrap();
    assert_eq!(records[2], record(json!({"name": "Cyd"})));
}
