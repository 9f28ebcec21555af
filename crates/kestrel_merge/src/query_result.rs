use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

use kestrel_common::datum::Datum;
use kestrel_common::error::{KestrelError, MergeError};

/// Forward-only cursor over one result stream.
///
/// Column indexes are 1-based, matching the column's declared ordinal; label
/// lookup is case-insensitive. Reading a value before the first successful
/// `next()` (or after it returned false) is a `NoCurrentRow` error, and an
/// out-of-range index or unknown label always fails rather than defaulting.
/// Instances are consumed exactly once and are not reusable after
/// exhaustion.
pub trait QueryResult {
    /// Advance the cursor. Returns false at end-of-stream.
    fn next(&mut self) -> Result<bool, KestrelError>;

    fn column_count(&self) -> usize;

    /// Label of the 1-based column ordinal.
    fn column_label(&self, index: usize) -> Result<String, KestrelError>;

    /// 1-based ordinal of a label, compared case-insensitively.
    fn column_index(&self, label: &str) -> Result<usize, KestrelError>;

    /// Value of the 1-based column in the current row.
    fn value(&mut self, index: usize) -> Result<Datum, KestrelError>;

    /// Whether the most recently resolved value was SQL NULL. Before any
    /// value has been resolved this reports true: nothing non-null has been
    /// observed yet.
    fn was_null(&self) -> bool;

    fn value_by_label(&mut self, label: &str) -> Result<Datum, KestrelError> {
        let index = self.column_index(label)?;
        self.value(index)
    }

    /// The resolved value normalized to a calendar representation. A thin
    /// view over [`QueryResult::value`]: merged-value resolution happens
    /// first, conversion second.
    fn calendar_value(&mut self, index: usize) -> Result<Datum, KestrelError> {
        Ok(self.value(index)?.into_calendar())
    }

    fn calendar_value_by_label(&mut self, label: &str) -> Result<Datum, KestrelError> {
        let index = self.column_index(label)?;
        self.calendar_value(index)
    }

    /// The resolved value materialized as a readable byte stream. Like
    /// `calendar_value`, a representation conversion over the already
    /// resolved scalar, not an independent data path.
    fn byte_stream(&mut self, index: usize) -> Result<Cursor<Vec<u8>>, KestrelError> {
        Ok(Cursor::new(self.value(index)?.canonical_bytes()))
    }

    fn byte_stream_by_label(&mut self, label: &str) -> Result<Cursor<Vec<u8>>, KestrelError> {
        let index = self.column_index(label)?;
        self.byte_stream(index)
    }
}

/// Column metadata shared by every result participating in one merge.
#[derive(Debug, Clone)]
pub struct QueryResultMetaData {
    labels: Vec<String>,
}

impl QueryResultMetaData {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Snapshot the metadata of an existing result.
    pub fn from_result(result: &dyn QueryResult) -> Result<Self, KestrelError> {
        let labels = (1..=result.column_count())
            .map(|i| result.column_label(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { labels })
    }

    pub fn column_count(&self) -> usize {
        self.labels.len()
    }

    pub fn column_label(&self, index: usize) -> Result<&str, MergeError> {
        if index == 0 || index > self.labels.len() {
            return Err(MergeError::ColumnIndexOutOfRange {
                index,
                count: self.labels.len(),
            });
        }
        Ok(&self.labels[index - 1])
    }

    /// First column whose label matches, case-insensitively.
    pub fn column_index(&self, label: &str) -> Result<usize, MergeError> {
        self.labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
            .map(|p| p + 1)
            .ok_or_else(|| MergeError::UnknownColumnLabel(label.to_string()))
    }
}

/// One materialized row together with the projection that identifies it for
/// dedup purposes. Equality and hashing consider only the projected columns;
/// an empty projection means the whole row is the key.
#[derive(Debug, Clone)]
pub struct QueryRow {
    values: Vec<Datum>,
    distinct_indexes: Vec<usize>,
}

impl QueryRow {
    /// `distinct_indexes` are 1-based column ordinals.
    pub fn new(values: Vec<Datum>, distinct_indexes: Vec<usize>) -> Self {
        Self {
            values,
            distinct_indexes,
        }
    }

    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Value at the 1-based ordinal.
    pub fn value(&self, index: usize) -> Option<&Datum> {
        if index == 0 {
            return None;
        }
        self.values.get(index - 1)
    }

    fn projection(&self) -> Vec<&Datum> {
        if self.distinct_indexes.is_empty() {
            self.values.iter().collect()
        } else {
            self.distinct_indexes
                .iter()
                .filter_map(|&i| self.value(i))
                .collect()
        }
    }
}

impl PartialEq for QueryRow {
    fn eq(&self, other: &Self) -> bool {
        self.projection() == other.projection()
    }
}

impl Eq for QueryRow {}

impl Hash for QueryRow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in self.projection() {
            value.hash(state);
        }
    }
}

/// In-memory [`QueryResult`] over materialized rows: the execution layer's
/// representation of one shard's drained tuple stream, and the natural test
/// double for the merge layer.
#[derive(Debug)]
pub struct MemoryQueryResult {
    metadata: QueryResultMetaData,
    rows: VecDeque<Vec<Datum>>,
    current: Option<Vec<Datum>>,
    last_null: bool,
}

impl MemoryQueryResult {
    pub fn new(labels: Vec<String>, rows: Vec<Vec<Datum>>) -> Result<Self, MergeError> {
        let expected = labels.len();
        for row in &rows {
            if row.len() != expected {
                return Err(MergeError::RowWidthMismatch {
                    expected,
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            metadata: QueryResultMetaData::new(labels),
            rows: rows.into(),
            current: None,
            last_null: true,
        })
    }

    pub fn metadata(&self) -> &QueryResultMetaData {
        &self.metadata
    }
}

impl QueryResult for MemoryQueryResult {
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
        let row = self.current.as_ref().ok_or(MergeError::NoCurrentRow)?;
        if index == 0 || index > row.len() {
            return Err(MergeError::ColumnIndexOutOfRange {
                index,
                count: row.len(),
            }
            .into());
        }
        let value = row[index - 1].clone();
        self.last_null = value.is_null();
        Ok(value)
    }

    fn was_null(&self) -> bool {
        self.last_null
    }
}
