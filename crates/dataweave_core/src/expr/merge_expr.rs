use std::fmt;

use super::Expression;
use crate::values::DataType;

/// Combine two mappings into a record. Fields from the right side replace
/// fields with the same name on the left.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeExpr {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub datatype: DataType,
}

impl fmt::Display for MergeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge({}, {})", self.left, self.right)
    }
}
