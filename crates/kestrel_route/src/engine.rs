//! The routing engine: resolves the minimal set of data nodes one logical
//! statement must visit. A pure function of (rule set, condition values),
//! deterministic and side-effect-free.

use kestrel_common::datum::Datum;
use kestrel_common::error::{KestrelError, RouteError};

use crate::condition::ShardingCondition;
use crate::data_node::DataNode;
use crate::sharding_rule::ShardingRule;
use crate::table_rule::TableRule;

/// The outcome of routing one logical table: the ordered set of physical
/// locations to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResult {
    logical_table: String,
    data_nodes: Vec<DataNode>,
}

impl RouteResult {
    pub fn logical_table(&self) -> &str {
        &self.logical_table
    }

    pub fn data_nodes(&self) -> &[DataNode] {
        &self.data_nodes
    }

    pub fn is_single_node(&self) -> bool {
        self.data_nodes.len() == 1
    }
}

/// Route one logical table against the rule set.
///
/// - Broadcast tables short-circuit to every data source, unsharded.
/// - A table inside a binding group is never routed independently: the
///   group's primary member is routed and the result replayed positionally.
/// - Otherwise the table's database- and table-axis strategies select among
///   the rule's actual data nodes; an axis with no strategy or no usable
///   condition value routes the full axis.
pub fn route(
    rule: &ShardingRule,
    logical_table: &str,
    conditions: &[ShardingCondition],
    parameters: &[Datum],
) -> Result<RouteResult, KestrelError> {
    if rule.is_broadcast(logical_table) {
        let data_nodes: Vec<DataNode> = rule
            .data_source_names()
            .iter()
            .map(|ds| DataNode::new(ds.clone(), logical_table.to_string()))
            .collect();
        tracing::debug!(table = logical_table, nodes = data_nodes.len(), "broadcast route");
        return Ok(RouteResult {
            logical_table: logical_table.to_string(),
            data_nodes,
        });
    }

    let table_rule = rule.table_rule(logical_table)?;

    if let Some(group) = rule.binding_group(logical_table) {
        let primary = group.primary();
        if !primary.logical_table().eq_ignore_ascii_case(logical_table) {
            let primary_nodes =
                route_standard(rule, primary, logical_table, conditions, parameters)?;
            let mut data_nodes = Vec::with_capacity(primary_nodes.len());
            for node in &primary_nodes {
                let actual = group.binding_actual_table(
                    node.data_source_name(),
                    logical_table,
                    node.table_name(),
                )?;
                data_nodes.push(DataNode::new(node.data_source_name().to_string(), actual));
            }
            tracing::debug!(
                table = logical_table,
                primary = primary.logical_table(),
                nodes = data_nodes.len(),
                "binding route replayed"
            );
            return Ok(RouteResult {
                logical_table: logical_table.to_string(),
                data_nodes,
            });
        }
    }

    let data_nodes = route_standard(rule, table_rule, logical_table, conditions, parameters)?;
    tracing::debug!(table = logical_table, nodes = data_nodes.len(), "standard route");
    Ok(RouteResult {
        logical_table: logical_table.to_string(),
        data_nodes,
    })
}

fn route_standard(
    rule: &ShardingRule,
    table_rule: &TableRule,
    requested_table: &str,
    conditions: &[ShardingCondition],
    parameters: &[Datum],
) -> Result<Vec<DataNode>, KestrelError> {
    let available_sources = table_rule.actual_data_source_names();

    let selected_sources = match rule.database_strategy_for(table_rule) {
        Some(strategy) => {
            let values = condition_values(
                conditions,
                parameters,
                strategy.column(),
                table_rule.logical_table(),
                requested_table,
            )?;
            if values.is_empty() {
                available_sources.clone()
            } else {
                let selected = strategy.do_sharding(&available_sources, &values);
                if selected.is_empty() {
                    return Err(RouteError::NoRoute {
                        table: requested_table.to_string(),
                    }
                    .into());
                }
                selected
            }
        }
        None => available_sources.clone(),
    };

    let mut data_nodes = Vec::new();
    for data_source in &selected_sources {
        let available_tables = table_rule.actual_table_names(data_source);
        let selected_tables = match rule.table_strategy_for(table_rule) {
            Some(strategy) => {
                let values = condition_values(
                    conditions,
                    parameters,
                    strategy.column(),
                    table_rule.logical_table(),
                    requested_table,
                )?;
                if values.is_empty() {
                    available_tables
                } else {
                    let selected = strategy.do_sharding(&available_tables, &values);
                    if selected.is_empty() {
                        return Err(RouteError::NoRoute {
                            table: requested_table.to_string(),
                        }
                        .into());
                    }
                    selected
                }
            }
            None => available_tables,
        };
        for table in selected_tables {
            data_nodes.push(DataNode::new(data_source.clone(), table));
        }
    }

    if data_nodes.is_empty() {
        return Err(RouteError::NoRoute {
            table: requested_table.to_string(),
        }
        .into());
    }
    Ok(data_nodes)
}

/// Collect every condition value usable for the given strategy column.
/// Column names compare case-insensitively; a condition qualified with a
/// table name only counts when it names the rule's own table or the table
/// the caller asked to route (the latter covers binding-group replay, where
/// predicates are written against the member table).
fn condition_values(
    conditions: &[ShardingCondition],
    parameters: &[Datum],
    strategy_column: &str,
    rule_table: &str,
    requested_table: &str,
) -> Result<Vec<Datum>, KestrelError> {
    let mut values = Vec::new();
    for condition in conditions {
        if !condition.column().name_matches(strategy_column) {
            continue;
        }
        let table = condition.column().table_name();
        if !table.is_empty()
            && !table.eq_ignore_ascii_case(rule_table)
            && !table.eq_ignore_ascii_case(requested_table)
        {
            continue;
        }
        values.extend(condition.values(parameters)?);
    }
    Ok(values)
}
