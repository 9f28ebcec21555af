use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kestrel_common::datum::Datum;
use kestrel_common::error::{ExecutionError, KestrelError};
use kestrel_merge::MemoryQueryResult;
use kestrel_route::{route, DataNode, RouteResult, ShardingCondition, ShardingRule};

use crate::scatter::{ShardQueryExecutor, ShardRows};

/// An explicitly scoped execution context: one rule set plus one executor,
/// constructed at startup and disposed with [`close`](Self::close).
///
/// Every operation checks the lifecycle flag first, so use-after-close is a
/// reported error instead of silently reading stale state. There is no
/// global registry behind this type; dropping it releases everything it
/// owns, and nothing leaks across contexts.
pub struct ShardingContext {
    rule: Arc<ShardingRule>,
    executor: ShardQueryExecutor,
    closed: AtomicBool,
}

impl ShardingContext {
    pub fn new(rule: Arc<ShardingRule>) -> Self {
        Self {
            rule,
            executor: ShardQueryExecutor::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn rule(&self) -> &ShardingRule {
        &self.rule
    }

    /// Resolve the data nodes one logical statement must visit.
    pub fn route(
        &self,
        logical_table: &str,
        conditions: &[ShardingCondition],
        parameters: &[Datum],
    ) -> Result<RouteResult, KestrelError> {
        self.ensure_open()?;
        route(&self.rule, logical_table, conditions, parameters)
    }

    /// Route, then fan the per-shard query out across the routed nodes.
    /// Returns one materialized result per node, ready for the merge layer.
    pub fn execute_query<F>(
        &self,
        logical_table: &str,
        conditions: &[ShardingCondition],
        parameters: &[Datum],
        query: &F,
    ) -> Result<Vec<MemoryQueryResult>, KestrelError>
    where
        F: Fn(&DataNode) -> Result<ShardRows, KestrelError> + Sync,
    {
        let route_result = self.route(logical_table, conditions, parameters)?;
        self.executor.execute(route_result.data_nodes(), query)
    }

    /// Release the context. Idempotent; every later operation fails with
    /// `ContextClosed`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("sharding context closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ExecutionError> {
        if self.is_closed() {
            return Err(ExecutionError::ContextClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_route::TableRule;

    fn context() -> ShardingContext {
        let rule = ShardingRule::builder()
            .data_sources(["ds_0", "ds_1"])
            .table_rule(
                TableRule::builder("t_order")
                    .data_sources(["ds_0", "ds_1"])
                    .actual_tables(["t_order_0"])
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        ShardingContext::new(Arc::new(rule))
    }

    fn empty_shard(_node: &DataNode) -> Result<ShardRows, KestrelError> {
        Ok(ShardRows {
            labels: vec!["order_id".into()],
            rows: vec![],
        })
    }

    #[test]
    fn routes_and_executes_while_open() {
        let ctx = context();
        let routed = ctx.route("t_order", &[], &[]).unwrap();
        assert_eq!(routed.data_nodes().len(), 2);
        let results = ctx
            .execute_query("t_order", &[], &[], &empty_shard)
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let ctx = context();
        assert!(!ctx.is_closed());
        ctx.close();
        ctx.close();
        assert!(ctx.is_closed());
        assert!(matches!(
            ctx.route("t_order", &[], &[]),
            Err(KestrelError::Execution(ExecutionError::ContextClosed))
        ));
        assert!(matches!(
            ctx.execute_query("t_order", &[], &[], &empty_shard),
            Err(KestrelError::Execution(ExecutionError::ContextClosed))
        ));
    }
}
