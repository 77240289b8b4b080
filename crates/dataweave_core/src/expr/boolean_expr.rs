use std::fmt;

use super::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    And,
    Or,
}

impl fmt::Display for BooleanOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "&"),
            Self::Or => write!(f, "|"),
        }
    }
}

/// A conjunction or disjunction of one or more boolean operands.
///
/// Operands are evaluated left to right, stopping as soon as the result is
/// known.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanExpr {
    pub op: BooleanOperator,
    pub operands: Vec<Expression>,
}

impl fmt::Display for BooleanExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, operand) in self.operands.iter().enumerate() {
            if idx > 0 {
                write!(f, " {} ", self.op)?;
            }
            write!(f, "{operand}")?;
        }
        write!(f, ")")
    }
}
