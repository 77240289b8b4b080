//! Sequence operators that don't introduce a scope.

use std::fmt;

use super::Expression;
use crate::values::DataType;

/// Remove duplicate elements, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct DistinctExpr {
    pub source: Box<Expression>,
}

impl fmt::Display for DistinctExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.distinct()", self.source)
    }
}

/// Elements from `start` up to (excluding) `stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceExpr {
    pub source: Box<Expression>,
    pub start: usize,
    pub stop: Option<usize>,
}

impl fmt::Display for SliceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop {
            Some(stop) => write!(f, "{}.slice({}, {stop})", self.source, self.start),
            None => write!(f, "{}.slice({}, ..)", self.source, self.start),
        }
    }
}

/// The single element of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct OneExpr {
    pub source: Box<Expression>,
    /// Produced if the sequence is empty.
    pub default: Option<Box<Expression>>,
    pub datatype: DataType,
}

impl fmt::Display for OneExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) => write!(f, "{}.one({default})", self.source),
            None => write!(f, "{}.one()", self.source),
        }
    }
}
