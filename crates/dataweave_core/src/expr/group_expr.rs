use std::fmt;

use super::Expression;
use crate::values::DataType;

/// Field holding the group key in group-by output records.
pub const GROUP_KEY_FIELD: &str = "key";
/// Field holding the aggregate result in group-by output records.
pub const GROUP_VALUE_FIELD: &str = "value";

/// Partition a sequence by a key and aggregate each partition.
///
/// Groups are emitted in order of first occurrence of their key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByExpr {
    pub source: Box<Expression>,
    /// Evaluated with the context bound to each element.
    pub key: Box<Expression>,
    /// Evaluated with the context bound to the list of elements in a group.
    pub aggregate: Box<Expression>,
    pub datatype: DataType,
}

impl fmt::Display for GroupByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.group_by({}, {})",
            self.source, self.key, self.aggregate
        )
    }
}
