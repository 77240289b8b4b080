use std::fmt;

use super::Expression;
use crate::values::DataType;

/// Build a record from named expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordExpr {
    pub fields: Vec<(String, Expression)>,
    pub datatype: DataType,
}

impl fmt::Display for RecordExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, expr)) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {expr}")?;
        }
        write!(f, "}}")
    }
}
