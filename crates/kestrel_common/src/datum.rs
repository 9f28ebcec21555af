use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single scalar value flowing through routing conditions and shard result
/// rows. Small enum, no heap alloc for fixed-size types.
///
/// Equality folds Int32/Int64 numerically and treats `Null == Null` as true:
/// the merge layer keys dedup sets on rows of datums, which requires
/// reflexive equality. SQL three-valued NULL semantics belong to predicate
/// evaluation, which is outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Text(String),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the Unix epoch (1970-01-01).
    Date(i32),
    Bytes(Vec<u8>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int32(v) => Some(i64::from(*v)),
            Datum::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int32(v) => Some(f64::from(*v)),
            Datum::Int64(v) => Some(*v as f64),
            Datum::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to add two datums (for SUM-style accumulation).
    pub fn add(&self, other: &Datum) -> Option<Datum> {
        match (self, other) {
            (Datum::Int32(a), Datum::Int32(b)) => Some(Datum::Int64(i64::from(*a) + i64::from(*b))),
            (Datum::Int64(a), Datum::Int64(b)) => Some(Datum::Int64(a + b)),
            (Datum::Int64(a), Datum::Int32(b)) => Some(Datum::Int64(a + i64::from(*b))),
            (Datum::Int32(a), Datum::Int64(b)) => Some(Datum::Int64(i64::from(*a) + b)),
            (Datum::Float64(a), Datum::Float64(b)) => Some(Datum::Float64(a + b)),
            (Datum::Float64(a), Datum::Int64(b)) => Some(Datum::Float64(a + *b as f64)),
            (Datum::Float64(a), Datum::Int32(b)) => Some(Datum::Float64(a + f64::from(*b))),
            (Datum::Int64(a), Datum::Float64(b)) => Some(Datum::Float64(*a as f64 + b)),
            (Datum::Int32(a), Datum::Float64(b)) => Some(Datum::Float64(f64::from(*a) + b)),
            _ => None,
        }
    }

    /// Normalize to a calendar representation: temporal variants pass
    /// through, parseable date/datetime text is promoted to `Date` /
    /// `Timestamp`, everything else is returned as-is.
    pub fn into_calendar(self) -> Datum {
        match self {
            Datum::Text(s) => {
                if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S") {
                    return Datum::Timestamp(dt.and_utc().timestamp_micros());
                }
                if let Ok(d) = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
                    return Datum::Date((d - epoch).num_days() as i32);
                }
                Datum::Text(s)
            }
            other => other,
        }
    }

    /// Canonical byte rendering of the scalar, used for byte-stream access.
    /// Text and bytes are raw; numerics are little-endian; NULL is empty.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Datum::Null => Vec::new(),
            Datum::Boolean(b) => vec![u8::from(*b)],
            Datum::Int32(v) => v.to_le_bytes().to_vec(),
            Datum::Int64(v) => v.to_le_bytes().to_vec(),
            Datum::Float64(v) => v.to_le_bytes().to_vec(),
            Datum::Text(s) => s.as_bytes().to_vec(),
            Datum::Timestamp(v) => v.to_le_bytes().to_vec(),
            Datum::Date(v) => v.to_le_bytes().to_vec(),
            Datum::Bytes(b) => b.clone(),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Boolean(b) => write!(f, "{b}"),
            Datum::Int32(v) => write!(f, "{v}"),
            Datum::Int64(v) => write!(f, "{v}"),
            Datum::Float64(v) => write!(f, "{v}"),
            Datum::Text(s) => write!(f, "{s}"),
            Datum::Timestamp(us) => write!(f, "{us}"),
            Datum::Date(days) => {
                let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
                match epoch.checked_add_signed(chrono::Duration::days(i64::from(*days))) {
                    Some(d) => write!(f, "{}", d.format("%Y-%m-%d")),
                    None => write!(f, "{days}"),
                }
            }
            Datum::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Boolean(a), Datum::Boolean(b)) => a == b,
            (Datum::Int32(a), Datum::Int32(b)) => a == b,
            (Datum::Int64(a), Datum::Int64(b)) => a == b,
            (Datum::Int32(a), Datum::Int64(b)) => i64::from(*a) == *b,
            (Datum::Int64(a), Datum::Int32(b)) => *a == i64::from(*b),
            (Datum::Float64(a), Datum::Float64(b)) => a.to_bits() == b.to_bits(),
            (Datum::Text(a), Datum::Text(b)) => a == b,
            (Datum::Timestamp(a), Datum::Timestamp(b)) => a == b,
            (Datum::Date(a), Datum::Date(b)) => a == b,
            (Datum::Bytes(a), Datum::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Explicit type tags, not mem::discriminant: Int32(x) and Int64(x)
        // compare equal so they must hash identically.
        match self {
            Datum::Null => 0u8.hash(state),
            Datum::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Datum::Int32(v) => {
                2u8.hash(state);
                i64::from(*v).hash(state);
            }
            Datum::Int64(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Datum::Float64(v) => {
                3u8.hash(state);
                v.to_bits().hash(state);
            }
            Datum::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Datum::Timestamp(us) => {
                5u8.hash(state);
                us.hash(state);
            }
            Datum::Date(days) => {
                6u8.hash(state);
                days.hash(state);
            }
            Datum::Bytes(b) => {
                7u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Datum::Null, _) | (_, Datum::Null) => None,
            (Datum::Boolean(a), Datum::Boolean(b)) => a.partial_cmp(b),
            (Datum::Int32(a), Datum::Int32(b)) => a.partial_cmp(b),
            (Datum::Int64(a), Datum::Int64(b)) => a.partial_cmp(b),
            (Datum::Int32(a), Datum::Int64(b)) => i64::from(*a).partial_cmp(b),
            (Datum::Int64(a), Datum::Int32(b)) => a.partial_cmp(&i64::from(*b)),
            (Datum::Float64(a), Datum::Float64(b)) => a.partial_cmp(b),
            (Datum::Float64(a), Datum::Int32(b)) => a.partial_cmp(&f64::from(*b)),
            (Datum::Float64(a), Datum::Int64(b)) => a.partial_cmp(&(*b as f64)),
            (Datum::Int32(a), Datum::Float64(b)) => f64::from(*a).partial_cmp(b),
            (Datum::Int64(a), Datum::Float64(b)) => (*a as f64).partial_cmp(b),
            (Datum::Text(a), Datum::Text(b)) => a.partial_cmp(b),
            (Datum::Timestamp(a), Datum::Timestamp(b)) => a.partial_cmp(b),
            (Datum::Date(a), Datum::Date(b)) => a.partial_cmp(b),
            (Datum::Bytes(a), Datum::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}
