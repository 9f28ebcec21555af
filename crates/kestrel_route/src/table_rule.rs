use kestrel_common::error::RuleError;

use crate::algorithm::ShardingStrategy;
use crate::data_node::DataNode;

/// Sharding rule for one logical table.
///
/// Built once at configuration time by cross-producting the data sources the
/// table spans with its actual-table list; immutable afterwards. The node
/// list is never empty and its order is significant: positional algorithms
/// (modulo, binding replay) depend on it.
#[derive(Debug, Clone)]
pub struct TableRule {
    logical_table: String,
    actual_data_nodes: Vec<DataNode>,
    database_strategy: Option<ShardingStrategy>,
    table_strategy: Option<ShardingStrategy>,
    generate_key_column: Option<String>,
}

impl TableRule {
    pub fn builder(logical_table: impl Into<String>) -> TableRuleBuilder {
        TableRuleBuilder {
            logical_table: logical_table.into(),
            data_sources: Vec::new(),
            actual_tables: Vec::new(),
            database_strategy: None,
            table_strategy: None,
            generate_key_column: None,
        }
    }

    pub fn logical_table(&self) -> &str {
        &self.logical_table
    }

    pub fn actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    pub fn database_strategy(&self) -> Option<&ShardingStrategy> {
        self.database_strategy.as_ref()
    }

    pub fn table_strategy(&self) -> Option<&ShardingStrategy> {
        self.table_strategy.as_ref()
    }

    pub fn generate_key_column(&self) -> Option<&str> {
        self.generate_key_column.as_deref()
    }

    /// Data source names this rule spans, in node order, deduplicated.
    pub fn actual_data_source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for node in &self.actual_data_nodes {
            if !names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(node.data_source_name()))
            {
                names.push(node.data_source_name().to_string());
            }
        }
        names
    }

    /// Actual table names within one data source, in node order.
    pub fn actual_table_names(&self, data_source: &str) -> Vec<String> {
        self.actual_data_nodes
            .iter()
            .filter(|n| n.data_source_name().eq_ignore_ascii_case(data_source))
            .map(|n| n.table_name().to_string())
            .collect()
    }

    /// Position of an actual table within its data source's table list.
    /// This index is the unit of positional replay across binding groups.
    pub fn find_actual_table_index(&self, data_source: &str, table: &str) -> Option<usize> {
        self.actual_data_nodes
            .iter()
            .filter(|n| n.data_source_name().eq_ignore_ascii_case(data_source))
            .position(|n| n.table_name().eq_ignore_ascii_case(table))
    }
}

/// Builder for [`TableRule`]. Validates at `build()`: a rule with no data
/// sources or no actual tables can never route and is rejected outright.
pub struct TableRuleBuilder {
    logical_table: String,
    data_sources: Vec<String>,
    actual_tables: Vec<String>,
    database_strategy: Option<ShardingStrategy>,
    table_strategy: Option<ShardingStrategy>,
    generate_key_column: Option<String>,
}

impl TableRuleBuilder {
    pub fn data_sources<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_sources = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn actual_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actual_tables = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.database_strategy = Some(strategy);
        self
    }

    pub fn table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.table_strategy = Some(strategy);
        self
    }

    pub fn generate_key_column(mut self, column: impl Into<String>) -> Self {
        self.generate_key_column = Some(column.into());
        self
    }

    pub fn build(self) -> Result<TableRule, RuleError> {
        if self.data_sources.is_empty() {
            return Err(RuleError::NoDataSources);
        }
        if self.actual_tables.is_empty() {
            return Err(RuleError::EmptyDataNodes(self.logical_table));
        }
        let mut actual_data_nodes =
            Vec::with_capacity(self.data_sources.len() * self.actual_tables.len());
        for data_source in &self.data_sources {
            for table in &self.actual_tables {
                actual_data_nodes.push(DataNode::new(data_source.clone(), table.clone()));
            }
        }
        Ok(TableRule {
            logical_table: self.logical_table,
            actual_data_nodes,
            database_strategy: self.database_strategy,
            table_strategy: self.table_strategy,
            generate_key_column: self.generate_key_column,
        })
    }
}
