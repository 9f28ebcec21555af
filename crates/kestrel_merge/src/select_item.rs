use kestrel_common::error::MergeError;

/// Aggregate function kinds the merge layer recomposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

/// Synthetic label for the COUNT half of a decomposed AVG, `<n>` being the
/// zero-based occurrence index of the AVG item in the select list. The
/// upstream rewriter injects columns under exactly these names and the merge
/// layer locates them by label, so the scheme is a fixed wire contract.
pub fn avg_derived_count_label(occurrence: usize) -> String {
    format!("AVG_DERIVED_COUNT_{occurrence}")
}

/// Synthetic label for the SUM half of a decomposed AVG.
pub fn avg_derived_sum_label(occurrence: usize) -> String {
    format!("AVG_DERIVED_SUM_{occurrence}")
}

/// Labels of the two synthetic columns backing one decomposed AVG item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAvgLabels {
    pub count_label: String,
    pub sum_label: String,
}

/// One DISTINCT-qualified aggregate in the rewritten select list.
///
/// The derived half is static structure, not a runtime label convention:
/// only AVG carries it, and constructors enforce that. Label strings are
/// still the boundary contract for locating the columns in shard metadata.
#[derive(Debug, Clone)]
pub struct AggregationDistinctSelectItem {
    kind: AggregationKind,
    distinct_expression: String,
    column_label: String,
    distinct_column: String,
    derived: Option<DerivedAvgLabels>,
}

impl AggregationDistinctSelectItem {
    /// A simple distinct aggregate (COUNT/SUM/MAX/MIN) with no derived
    /// columns. Rejects AVG, which must go through [`Self::avg`].
    pub fn simple(
        kind: AggregationKind,
        distinct_expression: impl Into<String>,
        column_label: impl Into<String>,
        distinct_column: impl Into<String>,
    ) -> Result<Self, MergeError> {
        if kind == AggregationKind::Avg {
            return Err(MergeError::InvalidSelectItem(
                "AVG items require derived COUNT/SUM columns".to_string(),
            ));
        }
        Ok(Self {
            kind,
            distinct_expression: distinct_expression.into(),
            column_label: column_label.into(),
            distinct_column: distinct_column.into(),
            derived: None,
        })
    }

    /// An AVG distinct aggregate together with its synthetic COUNT/SUM
    /// column labels for the given occurrence index.
    pub fn avg(
        distinct_expression: impl Into<String>,
        column_label: impl Into<String>,
        distinct_column: impl Into<String>,
        occurrence: usize,
    ) -> Self {
        Self {
            kind: AggregationKind::Avg,
            distinct_expression: distinct_expression.into(),
            column_label: column_label.into(),
            distinct_column: distinct_column.into(),
            derived: Some(DerivedAvgLabels {
                count_label: avg_derived_count_label(occurrence),
                sum_label: avg_derived_sum_label(occurrence),
            }),
        }
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn distinct_expression(&self) -> &str {
        &self.distinct_expression
    }

    pub fn column_label(&self) -> &str {
        &self.column_label
    }

    pub fn distinct_column(&self) -> &str {
        &self.distinct_column
    }

    pub fn derived(&self) -> Option<&DerivedAvgLabels> {
        self.derived.as_ref()
    }
}
