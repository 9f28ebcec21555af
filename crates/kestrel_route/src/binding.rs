use kestrel_common::error::{RouteError, RuleError};

use crate::table_rule::TableRule;

/// An ordered group of table rules whose shard selection must always agree.
///
/// Construction verifies the members are structurally parallel: same node
/// count and the same data-source sequence. Without that, positional replay
/// would map an order row and its line items to different physical suffixes.
#[derive(Debug, Clone)]
pub struct BindingTableRule {
    table_rules: Vec<TableRule>,
}

impl BindingTableRule {
    pub fn new(table_rules: Vec<TableRule>) -> Result<Self, RuleError> {
        if table_rules.len() < 2 {
            return Err(RuleError::BindingGroupTooSmall(table_rules.len()));
        }
        let primary = &table_rules[0];
        let primary_sources = primary.actual_data_source_names();
        for member in &table_rules[1..] {
            if member.actual_data_nodes().len() != primary.actual_data_nodes().len() {
                return Err(RuleError::BindingTableMismatch {
                    table: member.logical_table().to_string(),
                    primary: primary.logical_table().to_string(),
                    expected: primary.actual_data_nodes().len(),
                    actual: member.actual_data_nodes().len(),
                });
            }
            let member_sources = member.actual_data_source_names();
            let parallel = member_sources.len() == primary_sources.len()
                && member_sources
                    .iter()
                    .zip(&primary_sources)
                    .all(|(m, p)| m.eq_ignore_ascii_case(p));
            if !parallel {
                return Err(RuleError::BindingTableMismatch {
                    table: member.logical_table().to_string(),
                    primary: primary.logical_table().to_string(),
                    expected: primary_sources.len(),
                    actual: member_sources.len(),
                });
            }
        }
        Ok(Self { table_rules })
    }

    /// The member whose routing decision the rest of the group replays.
    pub fn primary(&self) -> &TableRule {
        &self.table_rules[0]
    }

    pub fn contains(&self, logical_table: &str) -> bool {
        self.table_rules
            .iter()
            .any(|r| r.logical_table().eq_ignore_ascii_case(logical_table))
    }

    pub fn table_rule(&self, logical_table: &str) -> Option<&TableRule> {
        self.table_rules
            .iter()
            .find(|r| r.logical_table().eq_ignore_ascii_case(logical_table))
    }

    /// Positional replay: given the actual table the primary member routed to
    /// inside `data_source`, return the member table at the same position.
    pub fn binding_actual_table(
        &self,
        data_source: &str,
        target_logical: &str,
        primary_actual: &str,
    ) -> Result<String, RouteError> {
        let index = self
            .primary()
            .find_actual_table_index(data_source, primary_actual)
            .ok_or_else(|| RouteError::ActualTableMissing {
                table: primary_actual.to_string(),
                data_source: data_source.to_string(),
            })?;
        let target = self
            .table_rule(target_logical)
            .ok_or_else(|| RouteError::NotBound {
                table: target_logical.to_string(),
                other: self.primary().logical_table().to_string(),
            })?;
        target
            .actual_table_names(data_source)
            .get(index)
            .cloned()
            .ok_or_else(|| RouteError::ActualTableMissing {
                table: target_logical.to_string(),
                data_source: data_source.to_string(),
            })
    }
}
