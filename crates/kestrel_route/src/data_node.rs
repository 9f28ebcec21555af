use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use kestrel_common::error::RuleError;

/// An immutable (data source, physical table) pair: the atomic unit of
/// physical location. Equality is structural; ordering follows declaration
/// order of the fields so node lists sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    data_source_name: String,
    table_name: String,
}

impl DataNode {
    pub fn new(data_source_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            data_source_name: data_source_name.into(),
            table_name: table_name.into(),
        }
    }

    pub fn data_source_name(&self) -> &str {
        &self.data_source_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source_name, self.table_name)
    }
}

impl FromStr for DataNode {
    type Err = RuleError;

    /// Parse the `<data-source>.<table>` form used in configuration files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() => {
                Ok(Self::new(ds, table))
            }
            _ => Err(RuleError::MalformedDataNode(s.to_string())),
        }
    }
}
