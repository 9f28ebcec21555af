//! Multi-shard result merging.
//!
//! Each physical shard hands back one forward-only tuple stream conforming to
//! the [`QueryResult`] contract. The merge layer recombines those streams,
//! deduplicating DISTINCT projections and recomposing rewritten aggregate
//! columns, behind the same cursor contract, so a caller iterates a sharded
//! result exactly like a single-database one.
//!
//! The merge layer is single-consumer by contract: dedup state is owned by
//! one merged result and scoped to one logical query execution. Shard
//! streams are drained up front, so any shard failure aborts the merge
//! before the first row is observable (fail-fast, never partial results).

pub mod aggregation_distinct;
pub mod distinct;
pub mod query_result;
pub mod select_item;

pub use aggregation_distinct::AggregationDistinctQueryResult;
pub use distinct::DistinctQueryResult;
pub use query_result::{MemoryQueryResult, QueryResult, QueryResultMetaData, QueryRow};
pub use select_item::{
    avg_derived_count_label, avg_derived_sum_label, AggregationDistinctSelectItem, AggregationKind,
    DerivedAvgLabels,
};
