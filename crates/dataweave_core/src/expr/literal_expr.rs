use std::fmt;

use crate::values::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub literal: Value,
}

impl fmt::Display for LiteralExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            // Quote strings so they're distinguishable from field names when
            // printing an expression.
            Value::Text(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}
