use std::sync::Arc;

use kestrel_common::config::{AlgorithmConfig, ShardingConfig, StrategyConfig};
use kestrel_common::error::RuleError;

use crate::algorithm::{
    HashShardingAlgorithm, ModuloShardingAlgorithm, ShardingStrategy, SuffixModuloAlgorithm,
};
use crate::binding::BindingTableRule;
use crate::table_rule::TableRule;

/// The full rule set: table rules, binding groups, broadcast tables, and the
/// declared data-source names. Built once at startup, validated during
/// construction, immutable afterwards. A rule set that fails any invariant
/// is rejected outright rather than partially applied.
#[derive(Debug, Clone)]
pub struct ShardingRule {
    table_rules: Vec<TableRule>,
    binding_table_rules: Vec<BindingTableRule>,
    broadcast_tables: Vec<String>,
    data_source_names: Vec<String>,
    default_database_strategy: Option<ShardingStrategy>,
    default_table_strategy: Option<ShardingStrategy>,
}

impl ShardingRule {
    pub fn builder() -> ShardingRuleBuilder {
        ShardingRuleBuilder::default()
    }

    /// Compile a deserialized configuration into a validated rule set.
    pub fn from_config(config: &ShardingConfig) -> Result<Self, RuleError> {
        let mut builder = Self::builder().data_sources(config.data_sources.clone());
        for table in &config.tables {
            let mut rule = TableRule::builder(table.logical_table.clone())
                .data_sources(
                    table
                        .data_sources
                        .clone()
                        .unwrap_or_else(|| config.data_sources.clone()),
                )
                .actual_tables(table.actual_tables.clone());
            if let Some(strategy) = &table.database_strategy {
                rule = rule.database_strategy(strategy_from_config(strategy));
            }
            if let Some(strategy) = &table.table_strategy {
                rule = rule.table_strategy(strategy_from_config(strategy));
            }
            if let Some(column) = &table.generate_key_column {
                rule = rule.generate_key_column(column.clone());
            }
            builder = builder.table_rule(rule.build()?);
        }
        for group in &config.binding_tables {
            builder = builder.binding_group(group.clone());
        }
        builder = builder.broadcast_tables(config.broadcast_tables.clone());
        if let Some(strategy) = &config.default_database_strategy {
            builder = builder.default_database_strategy(strategy_from_config(strategy));
        }
        if let Some(strategy) = &config.default_table_strategy {
            builder = builder.default_table_strategy(strategy_from_config(strategy));
        }
        builder.build()
    }

    pub fn data_source_names(&self) -> &[String] {
        &self.data_source_names
    }

    pub fn table_rules(&self) -> &[TableRule] {
        &self.table_rules
    }

    pub fn binding_table_rules(&self) -> &[BindingTableRule] {
        &self.binding_table_rules
    }

    /// Look up a logical table's rule. An unknown table is a configuration
    /// error surfaced to the caller, never silently ignored.
    pub fn table_rule(&self, logical_table: &str) -> Result<&TableRule, RuleError> {
        self.table_rules
            .iter()
            .find(|r| r.logical_table().eq_ignore_ascii_case(logical_table))
            .ok_or_else(|| RuleError::UnknownTable(logical_table.to_string()))
    }

    pub fn is_broadcast(&self, logical_table: &str) -> bool {
        self.broadcast_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(logical_table))
    }

    pub fn binding_group(&self, logical_table: &str) -> Option<&BindingTableRule> {
        self.binding_table_rules
            .iter()
            .find(|g| g.contains(logical_table))
    }

    /// Database-axis strategy: the table's own, else the rule-set default.
    pub fn database_strategy_for<'a>(&'a self, rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        rule.database_strategy()
            .or(self.default_database_strategy.as_ref())
    }

    /// Table-axis strategy: the table's own, else the rule-set default.
    pub fn table_strategy_for<'a>(&'a self, rule: &'a TableRule) -> Option<&'a ShardingStrategy> {
        rule.table_strategy()
            .or(self.default_table_strategy.as_ref())
    }
}

/// Builder for [`ShardingRule`]; all invariants are checked in `build()`.
#[derive(Default)]
pub struct ShardingRuleBuilder {
    table_rules: Vec<TableRule>,
    binding_groups: Vec<Vec<String>>,
    broadcast_tables: Vec<String>,
    data_source_names: Vec<String>,
    default_database_strategy: Option<ShardingStrategy>,
    default_table_strategy: Option<ShardingStrategy>,
}

impl ShardingRuleBuilder {
    pub fn data_sources<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_source_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn table_rule(mut self, rule: TableRule) -> Self {
        self.table_rules.push(rule);
        self
    }

    pub fn binding_group<I, S>(mut self, logical_tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binding_groups
            .push(logical_tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn broadcast_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.broadcast_tables = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_database_strategy = Some(strategy);
        self
    }

    pub fn default_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_table_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> Result<ShardingRule, RuleError> {
        if self.data_source_names.is_empty() {
            return Err(RuleError::NoDataSources);
        }

        // Duplicate logical tables would make lookup order-dependent.
        for (i, rule) in self.table_rules.iter().enumerate() {
            if self.table_rules[..i]
                .iter()
                .any(|r| r.logical_table().eq_ignore_ascii_case(rule.logical_table()))
            {
                return Err(RuleError::DuplicateTable(rule.logical_table().to_string()));
            }
        }

        // Every node must point at a declared data source.
        for rule in &self.table_rules {
            for node in rule.actual_data_nodes() {
                if !self
                    .data_source_names
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(node.data_source_name()))
                {
                    return Err(RuleError::UndeclaredDataSource {
                        table: rule.logical_table().to_string(),
                        data_source: node.data_source_name().to_string(),
                    });
                }
            }
        }

        let mut binding_table_rules = Vec::with_capacity(self.binding_groups.len());
        for group in &self.binding_groups {
            let mut members = Vec::with_capacity(group.len());
            for logical in group {
                let rule = self
                    .table_rules
                    .iter()
                    .find(|r| r.logical_table().eq_ignore_ascii_case(logical))
                    .ok_or_else(|| RuleError::UnknownTable(logical.clone()))?;
                members.push(rule.clone());
            }
            binding_table_rules.push(BindingTableRule::new(members)?);
        }

        tracing::info!(
            tables = self.table_rules.len(),
            binding_groups = binding_table_rules.len(),
            broadcast_tables = self.broadcast_tables.len(),
            data_sources = self.data_source_names.len(),
            "sharding rule set built"
        );

        Ok(ShardingRule {
            table_rules: self.table_rules,
            binding_table_rules,
            broadcast_tables: self.broadcast_tables,
            data_source_names: self.data_source_names,
            default_database_strategy: self.default_database_strategy,
            default_table_strategy: self.default_table_strategy,
        })
    }
}

fn strategy_from_config(config: &StrategyConfig) -> ShardingStrategy {
    let algorithm: Arc<dyn crate::algorithm::ShardingAlgorithm> = match config.algorithm {
        AlgorithmConfig::Hash => Arc::new(HashShardingAlgorithm),
        AlgorithmConfig::Modulo => Arc::new(ModuloShardingAlgorithm),
        AlgorithmConfig::SuffixModulo => Arc::new(SuffixModuloAlgorithm),
    };
    ShardingStrategy::new(config.column.clone(), algorithm)
}
