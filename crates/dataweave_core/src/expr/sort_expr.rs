use std::fmt;

use super::Expression;

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expression,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(expr: impl Into<Expression>) -> Self {
        SortKey {
            expr: expr.into(),
            ascending: true,
        }
    }

    pub fn desc(expr: impl Into<Expression>) -> Self {
        SortKey {
            expr: expr.into(),
            ascending: false,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.ascending { "ASC" } else { "DESC" };
        write!(f, "{} {dir}", self.expr)
    }
}

/// Stable multi-key sort.
#[derive(Debug, Clone, PartialEq)]
pub struct SortExpr {
    pub source: Box<Expression>,
    pub keys: Vec<SortKey>,
}

impl fmt::Display for SortExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.sort(", self.source)?;
        for (idx, key) in self.keys.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, ")")
    }
}
