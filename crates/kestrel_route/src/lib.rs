//! Sharding rule model and routing engine.
//!
//! The rule side is built once at startup from static configuration and is
//! immutable afterwards: `TableRule` enumerates a logical table's physical
//! `DataNode`s and per-axis strategies, `BindingTableRule` groups tables
//! whose shard selection must agree, and `ShardingRule` aggregates the whole
//! rule set with construction-time validation.
//!
//! The routing side is a pure function of (rule set, condition values): it
//! resolves the minimal set of data nodes one logical statement must visit.
//! Sharding algorithms are injected capabilities; hash sharding uses xxh3
//! over a type-tagged encoding so distribution is uniform for any value type.

pub mod algorithm;
pub mod binding;
pub mod column;
pub mod condition;
pub mod data_node;
pub mod engine;
pub mod sharding_rule;
pub mod table_rule;

pub use algorithm::{
    HashShardingAlgorithm, ModuloShardingAlgorithm, ShardingAlgorithm, ShardingStrategy,
    SuffixModuloAlgorithm,
};
pub use binding::BindingTableRule;
pub use column::Column;
pub use condition::{ConditionExpr, ShardingCondition, ShardingOperator};
pub use data_node::DataNode;
pub use engine::{route, RouteResult};
pub use sharding_rule::ShardingRule;
pub use table_rule::{TableRule, TableRuleBuilder};
