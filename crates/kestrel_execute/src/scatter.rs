use std::time::Instant;

use kestrel_common::datum::Datum;
use kestrel_common::error::{ExecutionError, KestrelError};
use kestrel_merge::MemoryQueryResult;
use kestrel_route::DataNode;

/// One shard's drained tuple stream: the rewritten column labels plus every
/// row, in the shard's native order.
#[derive(Debug, Clone)]
pub struct ShardRows {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<Datum>>,
}

/// Executes a per-shard query callback against every routed data node in
/// parallel and materializes one [`MemoryQueryResult`] per node.
///
/// Failure policy is strict: the first failing node (in node order) aborts
/// the whole call and its error propagates unchanged to the caller. A
/// panicking worker is contained and reported as a `WorkerPanic` for its
/// node rather than tearing down the process.
#[derive(Debug, Default)]
pub struct ShardQueryExecutor;

impl ShardQueryExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute<F>(
        &self,
        data_nodes: &[DataNode],
        query: &F,
    ) -> Result<Vec<MemoryQueryResult>, KestrelError>
    where
        F: Fn(&DataNode) -> Result<ShardRows, KestrelError> + Sync,
    {
        let outcomes: Vec<Result<(ShardRows, u64), KestrelError>> = std::thread::scope(|s| {
            let handles: Vec<_> = data_nodes
                .iter()
                .map(|node| {
                    s.spawn(move || {
                        let start = Instant::now();
                        let rows = query(node)?;
                        Ok((rows, start.elapsed().as_micros() as u64))
                    })
                })
                .collect();
            handles
                .into_iter()
                .zip(data_nodes)
                .map(|(handle, node)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ExecutionError::WorkerPanic {
                            data_node: node.to_string(),
                        }
                        .into())
                    })
                })
                .collect()
        });

        let mut results = Vec::with_capacity(data_nodes.len());
        for (outcome, node) in outcomes.into_iter().zip(data_nodes) {
            match outcome {
                Ok((shard_rows, latency_us)) => {
                    tracing::debug!(
                        node = %node,
                        rows = shard_rows.rows.len(),
                        latency_us,
                        "shard query completed"
                    );
                    results.push(MemoryQueryResult::new(shard_rows.labels, shard_rows.rows)?);
                }
                Err(e) => {
                    tracing::warn!(node = %node, error = %e, "shard query failed, aborting");
                    return Err(e);
                }
            }
        }
        Ok(results)
    }
}
