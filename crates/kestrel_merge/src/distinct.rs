use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use kestrel_common::datum::Datum;
use kestrel_common::error::{KestrelError, MergeError};

use crate::query_result::{QueryResult, QueryResultMetaData, QueryRow};

/// A deduplicating view over one or more shard result streams.
///
/// Rows are keyed by their projection onto the declared distinct columns
/// (the whole row when none are declared); a row whose key repeats one
/// already emitted within this merge is suppressed. The dedup set lives and
/// dies with the instance; its scope is exactly one logical query
/// execution.
///
/// Construction drains every underlying stream eagerly, shard by shard, so
/// an upstream failure aborts the whole merge before any row is observable.
#[derive(Debug)]
pub struct DistinctQueryResult {
    metadata: Arc<QueryResultMetaData>,
    rows: VecDeque<QueryRow>,
    current: Option<QueryRow>,
    last_null: bool,
}

impl DistinctQueryResult {
    pub fn new<I, S>(
        mut query_results: Vec<Box<dyn QueryResult>>,
        distinct_labels: I,
    ) -> Result<Self, KestrelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let first = query_results.first().ok_or(MergeError::EmptyResults)?;
        let metadata = Arc::new(QueryResultMetaData::from_result(first.as_ref())?);
        let mut distinct_indexes = Vec::new();
        for label in distinct_labels {
            let index = metadata.column_index(label.as_ref())?;
            if !distinct_indexes.contains(&index) {
                distinct_indexes.push(index);
            }
        }
        let raw_rows = drain_all(&mut query_results, metadata.column_count())?;
        Ok(Self::from_materialized(metadata, &raw_rows, distinct_indexes))
    }

    /// Build a dedup view over rows that were already drained elsewhere.
    pub(crate) fn from_materialized(
        metadata: Arc<QueryResultMetaData>,
        raw_rows: &[Vec<Datum>],
        distinct_indexes: Vec<usize>,
    ) -> Self {
        let mut seen: HashSet<QueryRow> = HashSet::with_capacity(raw_rows.len());
        let mut rows = VecDeque::new();
        for raw in raw_rows {
            let row = QueryRow::new(raw.clone(), distinct_indexes.clone());
            if seen.insert(row.clone()) {
                rows.push_back(row);
            }
        }
        Self {
            metadata,
            rows,
            current: None,
            last_null: true,
        }
    }

    pub fn metadata(&self) -> &QueryResultMetaData {
        &self.metadata
    }

    /// The positioned row's values, if the cursor is on a row.
    pub(crate) fn current_values(&self) -> Option<&[Datum]> {
        self.current.as_ref().map(QueryRow::values)
    }

    fn current_row(&self) -> Result<&QueryRow, MergeError> {
        self.current.as_ref().ok_or(MergeError::NoCurrentRow)
    }
}

impl QueryResult for DistinctQueryResult {
    fn next(&mut self) -> Result<bool, KestrelError> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
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
        if index == 0 || index > self.metadata.column_count() {
            return Err(MergeError::ColumnIndexOutOfRange {
                index,
                count: self.metadata.column_count(),
            }
            .into());
        }
        let row = self.current_row()?;
        let value = row
            .value(index)
            .cloned()
            .ok_or(MergeError::ColumnIndexOutOfRange {
                index,
                count: self.metadata.column_count(),
            })?;
        self.last_null = value.is_null();
        Ok(value)
    }

    fn was_null(&self) -> bool {
        self.last_null
    }
}

/// Drain every result stream into materialized rows, preserving per-shard
/// native order, shards in the order given. Any stream whose column count
/// disagrees with the merge metadata is rejected.
pub(crate) fn drain_all(
    query_results: &mut [Box<dyn QueryResult>],
    column_count: usize,
) -> Result<Vec<Vec<Datum>>, KestrelError> {
    let mut rows = Vec::new();
    for result in query_results {
        if result.column_count() != column_count {
            return Err(MergeError::RowWidthMismatch {
                expected: column_count,
                actual: result.column_count(),
            }
            .into());
        }
        while result.next()? {
            let mut row = Vec::with_capacity(column_count);
            for index in 1..=column_count {
                row.push(result.value(index)?);
            }
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::query_result::MemoryQueryResult;

    fn shard(rows: Vec<Vec<Datum>>) -> Box<dyn QueryResult> {
        Box::new(
            MemoryQueryResult::new(vec!["order_id".into(), "status".into()], rows).unwrap(),
        )
    }

    #[test]
    fn suppresses_duplicate_projections_across_shards() {
        let results = vec![
            shard(vec![
                vec![Datum::Int64(10), Datum::Text("OK".into())],
                vec![Datum::Int64(20), Datum::Text("OK".into())],
            ]),
            shard(vec![vec![Datum::Int64(10), Datum::Text("LATE".into())]]),
        ];
        let mut distinct = DistinctQueryResult::new(results, ["order_id"]).unwrap();
        assert!(distinct.next().unwrap());
        assert_eq!(distinct.value(1).unwrap(), Datum::Int64(10));
        // First-seen row wins for a duplicated key.
        assert_eq!(distinct.value(2).unwrap(), Datum::Text("OK".into()));
        assert!(distinct.next().unwrap());
        assert_eq!(distinct.value(1).unwrap(), Datum::Int64(20));
        assert!(!distinct.next().unwrap());
    }

    #[test]
    fn whole_row_is_the_key_without_distinct_columns() {
        let results = vec![
            shard(vec![vec![Datum::Int64(10), Datum::Text("OK".into())]]),
            shard(vec![
                vec![Datum::Int64(10), Datum::Text("OK".into())],
                vec![Datum::Int64(10), Datum::Text("LATE".into())],
            ]),
        ];
        let mut distinct =
            DistinctQueryResult::new(results, std::iter::empty::<&str>()).unwrap();
        let mut count = 0;
        while distinct.next().unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn unknown_distinct_label_fails_construction() {
        let results = vec![shard(vec![])];
        assert!(matches!(
            DistinctQueryResult::new(results, ["ghost"]),
            Err(KestrelError::Merge(MergeError::UnknownColumnLabel(_)))
        ));
    }

    #[test]
    fn zero_results_cannot_merge() {
        assert!(matches!(
            DistinctQueryResult::new(Vec::new(), ["order_id"]),
            Err(KestrelError::Merge(MergeError::EmptyResults))
        ));
    }

    #[test]
    fn mismatched_shard_shapes_are_rejected() {
        let narrow =
            Box::new(MemoryQueryResult::new(vec!["order_id".into()], vec![]).unwrap())
                as Box<dyn QueryResult>;
        let results = vec![shard(vec![]), narrow];
        assert!(matches!(
            DistinctQueryResult::new(results, ["order_id"]),
            Err(KestrelError::Merge(MergeError::RowWidthMismatch { .. }))
        ));
    }

    #[test]
    fn dedup_scope_is_one_instance() {
        let build = || {
            DistinctQueryResult::new(
                vec![shard(vec![vec![Datum::Int64(10), Datum::Text("OK".into())]])],
                ["order_id"],
            )
            .unwrap()
        };
        // A fresh merge sees the value again: nothing leaks across executions.
        for _ in 0..2 {
            let mut distinct = build();
            assert!(distinct.next().unwrap());
            assert!(!distinct.next().unwrap());
        }
    }

    #[test]
    fn metadata_reports_the_shard_layout() {
        let distinct = DistinctQueryResult::new(vec![shard(vec![])], ["order_id"]).unwrap();
        assert_eq!(distinct.column_count(), 2);
        assert_eq!(distinct.column_label(2).unwrap(), "status");
        assert!(distinct.column_label(3).is_err());
    }
}
