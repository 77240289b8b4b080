use std::fmt;

use dataweave_error::Result;

use super::Expression;
use crate::values::{DataType, Value, compute};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOperator {
    pub fn apply(&self, left: &Value, right: &Value) -> Result<Value> {
        match self {
            Self::Add => compute::add(left, right),
            Self::Sub => compute::sub(left, right),
            Self::Mul => compute::mul(left, right),
            Self::Div => compute::div(left, right),
            Self::Rem => compute::rem(left, right),
        }
    }
}

impl fmt::Display for ArithOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
            Self::Rem => write!(f, "%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithExpr {
    pub op: ArithOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub datatype: DataType,
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}
