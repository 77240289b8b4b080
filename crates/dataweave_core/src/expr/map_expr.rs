use std::fmt;

use super::Expression;
use crate::values::DataType;

#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr {
    pub source: Box<Expression>,
    /// Evaluated with the context bound to each element.
    pub projection: Box<Expression>,
    pub datatype: DataType,
}

impl fmt::Display for MapExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.map({})", self.source, self.projection)
    }
}
