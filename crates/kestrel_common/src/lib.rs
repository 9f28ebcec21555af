//! Shared foundations for the Kestrel sharding core: the scalar value model,
//! the layered error taxonomy, and the static sharding configuration.

pub mod config;
pub mod datum;
pub mod error;

pub use config::{AlgorithmConfig, ShardingConfig, StrategyConfig, TableConfig};
pub use datum::Datum;
pub use error::{
    ExecutionError, KestrelError, KestrelResult, MergeError, RouteError, RuleError,
};
