use std::fmt;

use super::Expression;

/// Keep the elements of a sequence for which the predicate is true.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub source: Box<Expression>,
    /// Evaluated with the context bound to each element.
    pub predicate: Box<Expression>,
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.filter({})", self.source, self.predicate)
    }
}
