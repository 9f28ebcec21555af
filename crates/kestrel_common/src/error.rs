use thiserror::Error;

/// Convenience alias for `Result<T, KestrelError>`.
pub type KestrelResult<T> = Result<T, KestrelError>;

/// Top-level error type that all layer-specific errors convert into.
#[derive(Error, Debug)]
pub enum KestrelError {
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-time rule errors. All of these are fatal to startup:
/// a rule set that fails to build is never partially used.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Unknown logical table: {0}")]
    UnknownTable(String),

    #[error("Table {table} references undeclared data source: {data_source}")]
    UndeclaredDataSource { table: String, data_source: String },

    #[error("Table {0} has no actual data nodes")]
    EmptyDataNodes(String),

    #[error("Duplicate rule for logical table: {0}")]
    DuplicateTable(String),

    #[error("No data sources declared")]
    NoDataSources,

    #[error("Binding group member {table} has {actual} data nodes, expected {expected} to match {primary}")]
    BindingTableMismatch {
        table: String,
        primary: String,
        expected: usize,
        actual: usize,
    },

    #[error("Binding group needs at least two tables, got {0}")]
    BindingGroupTooSmall(usize),

    #[error("Malformed data node {0}: expected <data-source>.<table>")]
    MalformedDataNode(String),

    #[error("Invalid sharding configuration: {0}")]
    InvalidConfig(String),
}

/// Runtime routing errors.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("No route for table {table}: sharding produced no data nodes")]
    NoRoute { table: String },

    #[error("Table {table} is not bound in the same group as {other}")]
    NotBound { table: String, other: String },

    #[error("Actual table {table} not found in data source {data_source}")]
    ActualTableMissing { table: String, data_source: String },

    #[error("Parameter slot {0} out of range for supplied parameters")]
    MissingParameter(usize),
}

/// Result-access errors raised by the merge layer. Never defaulted to
/// null/zero: a bad index or label is a caller mistake surfaced immediately.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Column index {index} out of range 1..={count}")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    #[error("Unknown column label: {0}")]
    UnknownColumnLabel(String),

    #[error("No current row: call next() before reading values")]
    NoCurrentRow,

    #[error("Cannot merge zero query results")]
    EmptyResults,

    #[error("Row width {actual} does not match {expected} declared columns")]
    RowWidthMismatch { expected: usize, actual: usize },

    #[error("Invalid aggregation select item: {0}")]
    InvalidSelectItem(String),
}

/// Shard-execution errors. A failure on any shard aborts the whole logical
/// query; partial multi-shard results are never surfaced.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Shard query failed on {data_node}: {reason}")]
    ShardFailure { data_node: String, reason: String },

    #[error("Shard worker panicked on {data_node}")]
    WorkerPanic { data_node: String },

    #[error("Sharding context is closed")]
    ContextClosed,
}
