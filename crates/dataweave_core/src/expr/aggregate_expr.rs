use std::fmt;

use super::Expression;
use crate::values::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOperator {
    Sum,
    Min,
    Max,
    Avg,
    /// Number of elements, or of non-null projections if there's an
    /// expression.
    Count,
    /// Number of elements.
    Len,
}

impl AggregateOperator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Len => "len",
        }
    }
}

impl fmt::Display for AggregateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub op: AggregateOperator,
    pub source: Box<Expression>,
    /// Projection applied to each element before aggregating.
    pub expr: Option<Box<Expression>>,
    pub datatype: DataType,
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Some(expr) => write!(f, "{}.{}({expr})", self.source, self.op),
            None => write!(f, "{}.{}()", self.source, self.op),
        }
    }
}
