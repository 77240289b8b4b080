use std::fmt;

use crate::values::DataType;

/// Reference to the value bound at some scope.
///
/// Scope 0 is the innermost binding (the element under consideration in a
/// filter predicate, map projection, ...), scope `n` is the `n`-th enclosing
/// binding. A reference past every binding in the tree refers to the input
/// of the evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextExpr {
    pub scope: usize,
    /// Type of the bound value when the binding isn't introduced by the
    /// tree itself.
    pub datatype: DataType,
}

impl fmt::Display for ContextExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            0 => write!(f, "c"),
            n => write!(f, "c(-{n})"),
        }
    }
}
