use std::fmt;
use std::hash::{Hash, Hasher};

/// A column reference in a sharding condition: name plus owning table.
///
/// SQL identifiers are case-insensitive, so equality and hashing fold both
/// parts through ASCII lowercase. The fold is pinned to ASCII rather than
/// locale-default case mapping so behavior is identical on every host.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    table_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Case-insensitive name match against a bare column name.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.table_name.eq_ignore_ascii_case(&other.table_name)
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
        self.table_name.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_name, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_case() {
        assert_eq!(Column::new("ORDER_ID", "T_ORDER"), Column::new("order_id", "t_order"));
        assert_ne!(Column::new("order_id", "t_order"), Column::new("order_id", "t_order_item"));
    }

    #[test]
    fn hash_agrees_with_equality() {
        let mut set = HashSet::new();
        set.insert(Column::new("User_Id", "T_Order"));
        assert!(set.contains(&Column::new("user_id", "t_order")));
    }
}
