//! End-to-end sharded query pipeline test: config → rule set → routing →
//! parallel fan-out → distinct-aggregate merge.
//!
//! Scenario A — Key-pinned routing:
//!   1. Build the rule set from toml configuration
//!   2. Route an order lookup by user_id + order_id, verify the single node
//!   3. Execute and read the node's rows back
//!
//! Scenario B — Broadcast table:
//!   1. Route a broadcast table, verify one node per data source
//!
//! Scenario C — Binding group co-location:
//!   1. Route the order table and its line-item table with the same keys
//!   2. Verify the physical suffixes agree position by position
//!
//! Scenario D — Distinct-aggregate merge:
//!   1. Fan a full-scan out across four order shards
//!   2. Merge with COUNT(DISTINCT order_id) and AVG(DISTINCT order_id) items
//!   3. Verify the collapsed count and the recomposed average
//!
//! Scenario E — Fail-fast:
//!   1. Make one shard's query fail
//!   2. Verify the whole execution errors, no partial results
//!
//! Scenario F — Context lifecycle:
//!   1. Close the context, verify further operations are rejected

use std::collections::HashMap;
use std::sync::Arc;

use kestrel_common::config::ShardingConfig;
use kestrel_common::datum::Datum;
use kestrel_common::error::{ExecutionError, KestrelError};
use kestrel_execute::{ShardRows, ShardingContext};
use kestrel_merge::{
    AggregationDistinctQueryResult, AggregationDistinctSelectItem, AggregationKind,
    QueryResult,
};
use kestrel_route::{Column, ConditionExpr, DataNode, ShardingCondition, ShardingRule};

const CONFIG: &str = r#"
    data_sources = ["ds_0", "ds_1"]
    broadcast_tables = ["t_config"]
    binding_tables = [["t_order", "t_order_item"]]

    [[tables]]
    logical_table = "t_order"
    actual_tables = ["t_order_0", "t_order_1"]
    database_strategy = { column = "user_id", algorithm = { kind = "modulo" } }
    table_strategy = { column = "order_id", algorithm = { kind = "suffix_modulo" } }
    generate_key_column = "order_id"

    [[tables]]
    logical_table = "t_order_item"
    actual_tables = ["t_order_item_0", "t_order_item_1"]
    database_strategy = { column = "user_id", algorithm = { kind = "modulo" } }
    table_strategy = { column = "order_id", algorithm = { kind = "suffix_modulo" } }
"#;

const AGG_LABELS: [&str; 5] = [
    "order_id",
    "c",
    "a",
    "AVG_DERIVED_COUNT_0",
    "AVG_DERIVED_SUM_0",
];

fn build_context() -> ShardingContext {
    let config = ShardingConfig::from_toml(CONFIG).unwrap();
    let rule = ShardingRule::from_config(&config).unwrap();
    ShardingContext::new(Arc::new(rule))
}

fn eq_condition(column: &str, table: &str, value: i64) -> ShardingCondition {
    ShardingCondition::equal(
        Column::new(column, table),
        0,
        0,
        ConditionExpr::Literal(Datum::Int64(value)),
    )
}

/// In-memory stand-in for the physical databases: rows keyed by data node.
fn order_storage() -> HashMap<String, Vec<Vec<Datum>>> {
    let mut storage = HashMap::new();
    storage.insert(
        "ds_0.t_order_0".to_string(),
        vec![vec![Datum::Int64(10), Datum::Int64(2), Datum::Text("OK".into())]],
    );
    storage.insert(
        "ds_0.t_order_1".to_string(),
        vec![vec![Datum::Int64(11), Datum::Int64(2), Datum::Text("OK".into())]],
    );
    storage.insert(
        "ds_1.t_order_0".to_string(),
        vec![vec![Datum::Int64(12), Datum::Int64(3), Datum::Text("LATE".into())]],
    );
    storage.insert(
        "ds_1.t_order_1".to_string(),
        vec![vec![Datum::Int64(13), Datum::Int64(3), Datum::Text("OK".into())]],
    );
    storage
}

fn order_query(
    storage: &HashMap<String, Vec<Vec<Datum>>>,
) -> impl Fn(&DataNode) -> Result<ShardRows, KestrelError> + Sync + '_ {
    move |node: &DataNode| {
        let rows = storage
            .get(&node.to_string())
            .cloned()
            .ok_or_else(|| ExecutionError::ShardFailure {
                data_node: node.to_string(),
                reason: "no such shard".into(),
            })?;
        Ok(ShardRows {
            labels: vec!["order_id".into(), "user_id".into(), "status".into()],
            rows,
        })
    }
}

#[test]
fn key_pinned_routing_hits_one_shard() {
    let ctx = build_context();
    let conditions = vec![
        eq_condition("user_id", "t_order", 2),
        eq_condition("order_id", "t_order", 10),
    ];
    let routed = ctx.route("t_order", &conditions, &[]).unwrap();
    assert_eq!(routed.data_nodes().len(), 1);
    assert_eq!(routed.data_nodes()[0].to_string(), "ds_0.t_order_0");

    let storage = order_storage();
    let mut results = ctx
        .execute_query("t_order", &conditions, &[], &order_query(&storage))
        .unwrap();
    assert_eq!(results.len(), 1);
    let shard = &mut results[0];
    assert!(shard.next().unwrap());
    assert_eq!(shard.value_by_label("status").unwrap(), Datum::Text("OK".into()));
    assert!(!shard.next().unwrap());
}

#[test]
fn broadcast_table_routes_to_every_data_source() {
    let ctx = build_context();
    let routed = ctx.route("t_config", &[], &[]).unwrap();
    let rendered: Vec<String> = routed.data_nodes().iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["ds_0.t_config", "ds_1.t_config"]);
}

#[test]
fn binding_group_members_colocate() {
    let ctx = build_context();
    for (user_id, order_id) in [(2, 10), (2, 11), (3, 12), (3, 13)] {
        let order_route = ctx
            .route(
                "t_order",
                &[
                    eq_condition("user_id", "t_order", user_id),
                    eq_condition("order_id", "t_order", order_id),
                ],
                &[],
            )
            .unwrap();
        let item_route = ctx
            .route(
                "t_order_item",
                &[
                    eq_condition("user_id", "t_order_item", user_id),
                    eq_condition("order_id", "t_order_item", order_id),
                ],
                &[],
            )
            .unwrap();
        assert_eq!(order_route.data_nodes().len(), item_route.data_nodes().len());
        for (order_node, item_node) in order_route
            .data_nodes()
            .iter()
            .zip(item_route.data_nodes())
        {
            assert_eq!(order_node.data_source_name(), item_node.data_source_name());
            let order_suffix = order_node.table_name().rsplit('_').next().unwrap();
            let item_suffix = item_node.table_name().rsplit('_').next().unwrap();
            assert_eq!(order_suffix, item_suffix, "suffixes must agree positionally");
        }
    }
}

#[test]
fn distinct_aggregates_merge_across_shards() {
    let ctx = build_context();

    // Each data source duplicates its order_id across both of its actual
    // tables, so COUNT(DISTINCT order_id) must collapse them.
    let mut storage: HashMap<String, Vec<Vec<Datum>>> = HashMap::new();
    for (node, value) in [
        ("ds_0.t_order_0", 10),
        ("ds_0.t_order_1", 10),
        ("ds_1.t_order_0", 20),
        ("ds_1.t_order_1", 20),
    ] {
        storage.insert(
            node.to_string(),
            vec![(0..5).map(|_| Datum::Int64(value)).collect()],
        );
    }
    let query = |node: &DataNode| {
        let rows = storage
            .get(&node.to_string())
            .cloned()
            .ok_or_else(|| ExecutionError::ShardFailure {
                data_node: node.to_string(),
                reason: "no such shard".into(),
            })?;
        Ok(ShardRows {
            labels: AGG_LABELS.iter().map(|l| (*l).to_string()).collect(),
            rows,
        })
    };

    let results = ctx.execute_query("t_order", &[], &[], &query).unwrap();
    assert_eq!(results.len(), 4);

    let items = vec![
        AggregationDistinctSelectItem::simple(
            AggregationKind::Count,
            "(DISTINCT order_id)",
            "c",
            "order_id",
        )
        .unwrap(),
        AggregationDistinctSelectItem::avg("(DISTINCT order_id)", "a", "order_id", 0),
    ];
    let boxed: Vec<Box<dyn QueryResult>> = results
        .into_iter()
        .map(|r| Box::new(r) as Box<dyn QueryResult>)
        .collect();
    let mut merged = AggregationDistinctQueryResult::new(boxed, &items).unwrap();

    assert_eq!(merged.divide().len(), 2);

    assert!(merged.next().unwrap());
    assert_eq!(merged.value_by_label("order_id").unwrap(), Datum::Int64(10));
    assert_eq!(merged.value_by_label("c").unwrap(), Datum::Int64(1));
    assert_eq!(merged.value_by_label("a").unwrap(), Datum::Float64(10.0));

    assert!(merged.next().unwrap());
    assert_eq!(merged.value_by_label("order_id").unwrap(), Datum::Int64(20));
    assert_eq!(merged.value_by_label("c").unwrap(), Datum::Int64(1));
    assert_eq!(merged.value_by_label("a").unwrap(), Datum::Float64(20.0));

    assert!(!merged.next().unwrap());
}

#[test]
fn one_failing_shard_aborts_the_query() {
    let ctx = build_context();
    let mut storage = order_storage();
    storage.remove("ds_1.t_order_1");

    // Full fan-out: no sharding conditions.
    let err = ctx
        .execute_query("t_order", &[], &[], &order_query(&storage))
        .unwrap_err();
    match err {
        KestrelError::Execution(ExecutionError::ShardFailure { data_node, .. }) => {
            assert_eq!(data_node, "ds_1.t_order_1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn closed_context_rejects_operations() {
    let ctx = build_context();
    ctx.close();
    assert!(matches!(
        ctx.route("t_order", &[], &[]),
        Err(KestrelError::Execution(ExecutionError::ContextClosed))
    ));
}
