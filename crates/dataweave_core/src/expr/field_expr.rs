use std::fmt;

use super::Expression;
use crate::values::DataType;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub base: Box<Expression>,
    pub name: String,
    pub datatype: DataType,
}

impl fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.base, self.name)
    }
}
