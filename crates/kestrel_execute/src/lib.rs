//! Shard fan-out execution.
//!
//! The scatter stage runs one worker per routed data node under
//! `std::thread::scope`, drains each shard's tuple stream, and applies a
//! strict failure policy: any shard error fails the whole logical query, so
//! the merge layer never sees partial multi-shard results. All workers
//! complete (or fail) before merging begins; the merge layer itself is
//! single-consumer and unsynchronized by contract.
//!
//! [`ShardingContext`] bundles a rule set with an executor behind an
//! explicit acquire/release lifecycle: constructed once, disposed with
//! `close()`, never a static mutable cache.

pub mod context;
pub mod scatter;

pub use context::ShardingContext;
pub use scatter::{ShardQueryExecutor, ShardRows};
