//! Pluggable sharding algorithms.
//!
//! An algorithm maps one sharding-column value onto a subset of the available
//! targets (data source names or actual table names). The routing engine
//! unions the per-value selections, so `IN (…)` conditions compose from the
//! same single-value mapping as `=`.
//!
//! Hash sharding encodes the value with a type tag before hashing so that
//! distinct types never collide on identical byte patterns, and hashes with
//! xxh3-64 for uniform distribution across any value type.

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use kestrel_common::datum::Datum;

/// Maps one condition value onto the targets it shards to.
///
/// `available` is the ordered candidate list for the axis being routed
/// (data source names for the database axis, actual table names for the
/// table axis). Implementations must be deterministic and side-effect-free;
/// returning targets outside `available` is treated as selecting nothing.
pub trait ShardingAlgorithm: Send + Sync {
    fn shard(&self, available: &[String], value: &Datum) -> Vec<String>;
}

/// A sharding strategy: the column that drives the decision plus the
/// algorithm that maps its values to targets.
#[derive(Clone)]
pub struct ShardingStrategy {
    column: String,
    algorithm: Arc<dyn ShardingAlgorithm>,
}

impl ShardingStrategy {
    pub fn new(column: impl Into<String>, algorithm: Arc<dyn ShardingAlgorithm>) -> Self {
        Self {
            column: column.into(),
            algorithm,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Apply the algorithm to every condition value and union the selections,
    /// preserving `available` order and dropping anything the algorithm
    /// returned that is not actually available.
    pub fn do_sharding(&self, available: &[String], values: &[Datum]) -> Vec<String> {
        let mut selected: Vec<String> = Vec::new();
        for value in values {
            for target in self.algorithm.shard(available, value) {
                if available.iter().any(|a| a.eq_ignore_ascii_case(&target))
                    && !selected.iter().any(|s| s.eq_ignore_ascii_case(&target))
                {
                    selected.push(target);
                }
            }
        }
        // Re-order to match the available list so routing output is stable.
        let mut ordered: Vec<String> = Vec::with_capacity(selected.len());
        for candidate in available {
            if selected.iter().any(|s| s.eq_ignore_ascii_case(candidate)) {
                ordered.push(candidate.clone());
            }
        }
        ordered
    }
}

impl std::fmt::Debug for ShardingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardingStrategy")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// xxh3 hash of the type-tagged value encoding, modulo the target count,
/// selected positionally.
#[derive(Debug, Default)]
pub struct HashShardingAlgorithm;

impl ShardingAlgorithm for HashShardingAlgorithm {
    fn shard(&self, available: &[String], value: &Datum) -> Vec<String> {
        if available.is_empty() {
            return Vec::new();
        }
        let mut buf = Vec::with_capacity(16);
        encode_datum_for_hash(&mut buf, value);
        let idx = (xxh3_64(&buf) % available.len() as u64) as usize;
        vec![available[idx].clone()]
    }
}

/// Integer value modulo the target count, selected positionally. Non-integer
/// values select nothing, which the routing engine reports as no-route.
#[derive(Debug, Default)]
pub struct ModuloShardingAlgorithm;

impl ShardingAlgorithm for ModuloShardingAlgorithm {
    fn shard(&self, available: &[String], value: &Datum) -> Vec<String> {
        if available.is_empty() {
            return Vec::new();
        }
        match value.as_i64() {
            Some(v) => {
                let idx = v.rem_euclid(available.len() as i64) as usize;
                vec![available[idx].clone()]
            }
            None => Vec::new(),
        }
    }
}

/// Integer value modulo the target count, selected by `_<n>` name suffix
/// (`t_order_0`, `t_order_1`, …). Useful when the target list's position does
/// not encode the shard number.
#[derive(Debug, Default)]
pub struct SuffixModuloAlgorithm;

impl ShardingAlgorithm for SuffixModuloAlgorithm {
    fn shard(&self, available: &[String], value: &Datum) -> Vec<String> {
        if available.is_empty() {
            return Vec::new();
        }
        match value.as_i64() {
            Some(v) => {
                let suffix = format!("_{}", v.rem_euclid(available.len() as i64));
                available
                    .iter()
                    .filter(|t| t.ends_with(&suffix))
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        }
    }
}

/// Encode a datum into a byte buffer for hashing. Type tag + value encoding
/// avoids collisions across types; text gets a terminator to avoid prefix
/// collisions.
fn encode_datum_for_hash(buf: &mut Vec<u8>, datum: &Datum) {
    match datum {
        Datum::Null => buf.push(0x00),
        Datum::Boolean(b) => {
            buf.push(0x01);
            buf.push(u8::from(*b));
        }
        Datum::Int32(v) => {
            buf.push(0x02);
            buf.extend_from_slice(&i64::from(*v).to_le_bytes());
        }
        Datum::Int64(v) => {
            buf.push(0x02);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Datum::Float64(v) => {
            buf.push(0x03);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Datum::Text(s) => {
            buf.push(0x04);
            buf.extend_from_slice(s.as_bytes());
            buf.push(0x00);
        }
        Datum::Timestamp(v) => {
            buf.push(0x05);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Datum::Date(v) => {
            buf.push(0x06);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Datum::Bytes(b) => {
            buf.push(0x07);
            buf.extend_from_slice(b);
        }
    }
}
