use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Static sharding configuration, loaded once at startup from kestrel.toml
/// and compiled into an immutable rule set. Construction-time validation is
/// the rule layer's job; this layer only deserializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardingConfig {
    /// Names of every physical data source the rule set may reference.
    pub data_sources: Vec<String>,
    /// Per-logical-table sharding rules.
    pub tables: Vec<TableConfig>,
    /// Groups of logical tables whose shard selection must always agree.
    #[serde(default)]
    pub binding_tables: Vec<Vec<String>>,
    /// Tables replicated identically to every data source.
    #[serde(default)]
    pub broadcast_tables: Vec<String>,
    /// Fallback database-axis strategy for tables that declare none.
    #[serde(default)]
    pub default_database_strategy: Option<StrategyConfig>,
    /// Fallback table-axis strategy for tables that declare none.
    #[serde(default)]
    pub default_table_strategy: Option<StrategyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// The table name as written in SQL.
    pub logical_table: String,
    /// Physical table names backing the logical table in each data source.
    pub actual_tables: Vec<String>,
    /// Restrict this table to a subset of the declared data sources.
    /// Absent = the table spans all of them.
    #[serde(default)]
    pub data_sources: Option<Vec<String>>,
    #[serde(default)]
    pub database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub table_strategy: Option<StrategyConfig>,
    /// Column whose values are generated by the key generator, if any.
    #[serde(default)]
    pub generate_key_column: Option<String>,
}

/// One sharding strategy: which column drives it and which algorithm maps
/// the column's values onto targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub column: String,
    pub algorithm: AlgorithmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    /// xxh3 hash of the value, modulo the target count, selected by position.
    Hash,
    /// Integer value modulo the target count, selected by position.
    Modulo,
    /// Integer value modulo the target count, selected by `_<n>` name suffix.
    SuffixModulo,
}

impl ShardingConfig {
    /// Parse a configuration from toml text.
    pub fn from_toml(text: &str) -> Result<Self, RuleError> {
        toml::from_str(text).map_err(|e| RuleError::InvalidConfig(e.to_string()))
    }
}
