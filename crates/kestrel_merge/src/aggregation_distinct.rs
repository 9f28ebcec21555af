use std::sync::Arc;

use kestrel_common::datum::Datum;
use kestrel_common::error::{KestrelError, MergeError};

use crate::distinct::{drain_all, DistinctQueryResult};
use crate::query_result::{QueryResult, QueryResultMetaData};
use crate::select_item::{AggregationDistinctSelectItem, AggregationKind};

/// Merges N per-shard result streams whose select list carries
/// DISTINCT-qualified aggregates, and recomposes the rewritten aggregate
/// columns at the point of read.
///
/// The per-shard streams are positionally aligned to the same rewritten
/// column layout, and metadata reports that raw layout (synthetic derived
/// columns included) while value reads present the logical shape:
///
/// - a COUNT(DISTINCT …) column reads as 1 per surviving distinct value,
/// - an AVG(DISTINCT …) column reads as its deduplicated derived SUM divided
///   by its deduplicated derived COUNT, computed on every read rather than
///   pre-materialized,
/// - the derived columns themselves read as their deduplicated substitutions
///   (COUNT → 1, SUM → the distinct value), so a downstream group-merge that
///   sums them reproduces the exact distinct average,
/// - everything else reads straight from the deduplicated row.
///
/// Rows are jointly deduplicated across every item's distinct column;
/// `divide` re-partitions into per-item views so each aggregate's
/// cardinality stays independent.
pub struct AggregationDistinctQueryResult {
    inner: DistinctQueryResult,
    metadata: Arc<QueryResultMetaData>,
    columns: Vec<DistinctColumnMeta>,
    raw_rows: Vec<Vec<Datum>>,
    last_null: bool,
}

/// One distinct-aggregate column resolved to the shard layout's ordinals.
#[derive(Debug, Clone)]
struct DistinctColumnMeta {
    kind: AggregationKind,
    column_index: usize,
    distinct_column_index: usize,
    derived: Option<DerivedIndexes>,
}

#[derive(Debug, Clone, Copy)]
struct DerivedIndexes {
    count_index: usize,
    sum_index: usize,
}

impl AggregationDistinctQueryResult {
    pub fn new(
        mut query_results: Vec<Box<dyn QueryResult>>,
        items: &[AggregationDistinctSelectItem],
    ) -> Result<Self, KestrelError> {
        let first = query_results.first().ok_or(MergeError::EmptyResults)?;
        let metadata = Arc::new(QueryResultMetaData::from_result(first.as_ref())?);

        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            let derived = match item.derived() {
                Some(labels) => Some(DerivedIndexes {
                    count_index: metadata.column_index(&labels.count_label)?,
                    sum_index: metadata.column_index(&labels.sum_label)?,
                }),
                None => None,
            };
            columns.push(DistinctColumnMeta {
                kind: item.kind(),
                column_index: metadata.column_index(item.column_label())?,
                distinct_column_index: metadata.column_index(item.distinct_column())?,
                derived,
            });
        }

        // Joint dedup key: every item's distinct column, declaration order.
        let mut joint_indexes = Vec::new();
        for column in &columns {
            if !joint_indexes.contains(&column.distinct_column_index) {
                joint_indexes.push(column.distinct_column_index);
            }
        }

        let raw_rows = drain_all(&mut query_results, metadata.column_count())?;
        let inner =
            DistinctQueryResult::from_materialized(metadata.clone(), &raw_rows, joint_indexes);
        tracing::debug!(
            items = columns.len(),
            raw_rows = raw_rows.len(),
            columns = metadata.column_count(),
            "aggregation distinct merge built"
        );
        Ok(Self {
            inner,
            metadata,
            columns,
            raw_rows,
            last_null: true,
        })
    }

    /// Split into one dedup view per distinct-aggregate item, each keyed by
    /// that item's distinct column alone so cardinalities never
    /// cross-contaminate. Views come back in item declaration order and
    /// report the parent's full column shape.
    pub fn divide(&self) -> Vec<DistinctQueryResult> {
        self.columns
            .iter()
            .map(|column| {
                DistinctQueryResult::from_materialized(
                    self.metadata.clone(),
                    &self.raw_rows,
                    vec![column.distinct_column_index],
                )
            })
            .collect()
    }

    fn resolve_value(&self, index: usize) -> Result<Datum, KestrelError> {
        if index == 0 || index > self.metadata.column_count() {
            return Err(MergeError::ColumnIndexOutOfRange {
                index,
                count: self.metadata.column_count(),
            }
            .into());
        }
        let row = self.inner.current_values().ok_or(MergeError::NoCurrentRow)?;

        if let Some(column) = self.columns.iter().find(|c| c.column_index == index) {
            return Ok(match column.kind {
                // Each surviving row is exactly one distinct value.
                AggregationKind::Count => Datum::Int64(1),
                AggregationKind::Avg => {
                    let sum = substituted_derived_sum(column, row);
                    let count = substituted_derived_count();
                    match (sum.as_f64(), count.as_i64()) {
                        (Some(s), Some(c)) if c > 0 => Datum::Float64(s / c as f64),
                        _ => Datum::Null,
                    }
                }
                // The deduplicated row's own value is the contribution.
                AggregationKind::Sum | AggregationKind::Max | AggregationKind::Min => {
                    row[index - 1].clone()
                }
            });
        }
        if self
            .columns
            .iter()
            .any(|c| matches!(c.derived, Some(d) if d.count_index == index))
        {
            return Ok(substituted_derived_count());
        }
        if let Some(parent) = self
            .columns
            .iter()
            .find(|c| matches!(c.derived, Some(d) if d.sum_index == index))
        {
            return Ok(substituted_derived_sum(parent, row));
        }
        Ok(row[index - 1].clone())
    }
}

/// Deduplicated substitution for a derived COUNT column: each surviving row
/// stands for one distinct value.
fn substituted_derived_count() -> Datum {
    Datum::Int64(1)
}

/// Deduplicated substitution for a derived SUM column: the row's
/// contribution to the distinct sum is the distinct value itself.
fn substituted_derived_sum(parent: &DistinctColumnMeta, row: &[Datum]) -> Datum {
    row[parent.distinct_column_index - 1].clone()
}

impl QueryResult for AggregationDistinctQueryResult {
    fn next(&mut self) -> Result<bool, KestrelError> {
        self.inner.next()
    }

    fn column_count(&self) -> usize {
        self.metadata.column_count()
    }

    fn column_label(&self, index: usize) -> Result<String, KestrelError> {
        Ok(self.metadata.column_label(index)?.to_string())
    }

    fn column_index(&self, label: &str) -> Result<usize, KestrelError> {
        Ok(self.metadata.column_index(label)?)
    }

    fn value(&mut self, index: usize) -> Result<Datum, KestrelError> {
        let value = self.resolve_value(index)?;
        self.last_null = value.is_null();
        Ok(value)
    }

    fn was_null(&self) -> bool {
        self.last_null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use crate::query_result::MemoryQueryResult;
    use crate::select_item::AggregationDistinctSelectItem;

    const LABELS: [&str; 5] = ["order_id", "c", "a", "AVG_DERIVED_COUNT_0", "AVG_DERIVED_SUM_0"];

    /// Two shards, each contributing its row stream twice; every column of
    /// shard i's row carries the value 10*i.
    fn query_results() -> Vec<Box<dyn QueryResult>> {
        let mut results: Vec<Box<dyn QueryResult>> = Vec::new();
        for i in 1..=2i64 {
            for _ in 0..2 {
                let row: Vec<Datum> = (0..5).map(|_| Datum::Int64(10 * i)).collect();
                results.push(Box::new(
                    MemoryQueryResult::new(
                        LABELS.iter().map(|l| (*l).to_string()).collect(),
                        vec![row],
                    )
                    .unwrap(),
                ));
            }
        }
        results
    }

    fn items() -> Vec<AggregationDistinctSelectItem> {
        vec![
            AggregationDistinctSelectItem::simple(
                AggregationKind::Count,
                "(DISTINCT order_id)",
                "c",
                "order_id",
            )
            .unwrap(),
            AggregationDistinctSelectItem::avg("(DISTINCT order_id)", "a", "order_id", 0),
        ]
    }

    fn merged() -> AggregationDistinctQueryResult {
        AggregationDistinctQueryResult::new(query_results(), &items()).unwrap()
    }

    #[test]
    fn divide_yields_one_view_per_item_with_full_shape() {
        let merged = merged();
        let divided = merged.divide();
        assert_eq!(divided.len(), 2);
        for view in &divided {
            assert_eq!(view.column_count(), merged.column_count());
        }
    }

    #[test]
    fn value_by_index_recomposes_aggregates() {
        let mut merged = merged();
        assert!(merged.next().unwrap());
        assert_eq!(merged.value(1).unwrap(), Datum::Int64(10));
        assert_eq!(merged.value(2).unwrap(), Datum::Int64(1));
        assert_eq!(merged.value(3).unwrap(), Datum::Float64(10.0));
        assert_eq!(merged.value(4).unwrap(), Datum::Int64(1));
        assert_eq!(merged.value(5).unwrap(), Datum::Int64(10));
    }

    #[test]
    fn value_by_label_resolves_the_same_way() {
        let mut merged = merged();
        merged.next().unwrap();
        assert_eq!(merged.value_by_label("order_id").unwrap(), Datum::Int64(10));
        assert_eq!(merged.value_by_label("a").unwrap(), Datum::Float64(10.0));
    }

    #[test]
    fn repeated_reads_are_idempotent() {
        let mut merged = merged();
        merged.next().unwrap();
        for _ in 0..3 {
            assert_eq!(merged.value(3).unwrap(), Datum::Float64(10.0));
            assert_eq!(merged.value(2).unwrap(), Datum::Int64(1));
        }
    }

    #[test]
    fn duplicate_distinct_values_collapse_across_shards() {
        let mut merged = merged();
        assert!(merged.next().unwrap());
        assert_eq!(merged.value(1).unwrap(), Datum::Int64(10));
        assert!(merged.next().unwrap());
        assert_eq!(merged.value(1).unwrap(), Datum::Int64(20));
        assert_eq!(merged.value(2).unwrap(), Datum::Int64(1));
        assert_eq!(merged.value(3).unwrap(), Datum::Float64(20.0));
        assert!(!merged.next().unwrap());
    }

    #[test]
    fn metadata_reports_the_raw_rewritten_layout() {
        let merged = merged();
        assert_eq!(merged.column_count(), 5);
        assert_eq!(merged.column_label(1).unwrap(), "order_id");
        assert_eq!(merged.column_label(3).unwrap(), "a");
        assert_eq!(merged.column_label(4).unwrap(), "AVG_DERIVED_COUNT_0");
        assert_eq!(merged.column_index("c").unwrap(), 2);
        assert_eq!(merged.column_index("ORDER_ID").unwrap(), 1);
    }

    #[test]
    fn out_of_range_metadata_and_values_fail() {
        let mut merged = merged();
        assert!(matches!(
            merged.column_label(6),
            Err(KestrelError::Merge(MergeError::ColumnIndexOutOfRange {
                index: 6,
                count: 5,
            }))
        ));
        merged.next().unwrap();
        assert!(merged.value(6).is_err());
        assert!(merged.value(0).is_err());
        assert!(matches!(
            merged.column_index("ghost"),
            Err(KestrelError::Merge(MergeError::UnknownColumnLabel(_)))
        ));
    }

    #[test]
    fn was_null_before_any_read_and_after_reads() {
        let mut merged = merged();
        assert!(merged.was_null());
        merged.next().unwrap();
        merged.value(1).unwrap();
        assert!(!merged.was_null());
    }

    #[test]
    fn null_distinct_value_surfaces_through_avg() {
        let row = vec![Datum::Null, Datum::Null, Datum::Null, Datum::Null, Datum::Null];
        let results: Vec<Box<dyn QueryResult>> = vec![Box::new(
            MemoryQueryResult::new(
                LABELS.iter().map(|l| (*l).to_string()).collect(),
                vec![row],
            )
            .unwrap(),
        )];
        let mut merged = AggregationDistinctQueryResult::new(results, &items()).unwrap();
        merged.next().unwrap();
        assert_eq!(merged.value(3).unwrap(), Datum::Null);
        assert!(merged.was_null());
        merged.value(2).unwrap();
        assert!(!merged.was_null(), "COUNT substitution is never null");
    }

    #[test]
    fn calendar_and_byte_stream_convert_the_recomposed_value() {
        let mut merged = merged();
        merged.next().unwrap();
        assert_eq!(merged.calendar_value(1).unwrap(), Datum::Int64(10));
        assert_eq!(
            merged.calendar_value_by_label("order_id").unwrap(),
            Datum::Int64(10)
        );
        let mut buf = Vec::new();
        merged.byte_stream(1).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, 10i64.to_le_bytes().to_vec());
        let mut by_label = Vec::new();
        merged
            .byte_stream_by_label("order_id")
            .unwrap()
            .read_to_end(&mut by_label)
            .unwrap();
        assert_eq!(by_label, buf);
    }

    #[test]
    fn divided_views_keep_independent_cardinalities() {
        // Two items over two different distinct columns. The joint cursor
        // dedups on both keys; each divided view dedups on its own only.
        let labels: Vec<String> = ["k1", "c", "k2", "a", "AVG_DERIVED_COUNT_0", "AVG_DERIVED_SUM_0"]
            .iter()
            .map(|l| (*l).to_string())
            .collect();
        let rows = vec![
            vec![
                Datum::Int64(1),
                Datum::Int64(9),
                Datum::Int64(7),
                Datum::Int64(9),
                Datum::Int64(9),
                Datum::Int64(9),
            ],
            vec![
                Datum::Int64(1),
                Datum::Int64(9),
                Datum::Int64(8),
                Datum::Int64(9),
                Datum::Int64(9),
                Datum::Int64(9),
            ],
        ];
        let results: Vec<Box<dyn QueryResult>> =
            vec![Box::new(MemoryQueryResult::new(labels, rows).unwrap())];
        let two_key_items = vec![
            AggregationDistinctSelectItem::simple(
                AggregationKind::Count,
                "(DISTINCT k1)",
                "c",
                "k1",
            )
            .unwrap(),
            AggregationDistinctSelectItem::avg("(DISTINCT k2)", "a", "k2", 0),
        ];
        let merged = AggregationDistinctQueryResult::new(results, &two_key_items).unwrap();
        let mut divided = merged.divide();
        let count_rows = drain_count(&mut divided[0]);
        let avg_rows = drain_count(&mut divided[1]);
        assert_eq!(count_rows, 1, "k1 repeats, so COUNT's view collapses");
        assert_eq!(avg_rows, 2, "k2 differs, so AVG's view keeps both");
    }

    fn drain_count(result: &mut DistinctQueryResult) -> usize {
        let mut n = 0;
        while result.next().unwrap() {
            n += 1;
        }
        n
    }

    #[test]
    fn zero_results_cannot_merge() {
        assert!(matches!(
            AggregationDistinctQueryResult::new(Vec::new(), &items()),
            Err(KestrelError::Merge(MergeError::EmptyResults))
        ));
    }

    #[test]
    fn missing_derived_column_in_shard_layout_fails_construction() {
        let labels: Vec<String> = ["order_id", "c", "a"].iter().map(|l| (*l).to_string()).collect();
        let results: Vec<Box<dyn QueryResult>> =
            vec![Box::new(MemoryQueryResult::new(labels, vec![]).unwrap())];
        assert!(matches!(
            AggregationDistinctQueryResult::new(results, &items()),
            Err(KestrelError::Merge(MergeError::UnknownColumnLabel(_)))
        ));
    }
}
