use std::fmt;

use dataweave_error::{DbError, ErrorKind, Result};
use regex::Regex;

use super::Expression;
use crate::values::{DataType, Value};

/// A compiled regular expression.
///
/// Compared by pattern text.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn try_new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            DbError::with_kind(ErrorKind::InvalidExpression, "Invalid regular expression")
                .with_field("pattern", pattern)
                .with_field("error", e)
        })?;
        Ok(Pattern { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarFunction {
    Upper,
    Lower,
    /// Number of characters in a string or elements in a list.
    Length,
    Matches(Pattern),
}

impl ScalarFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Length => "length",
            Self::Matches(_) => "matches",
        }
    }

    pub fn return_type(&self) -> DataType {
        match self {
            Self::Upper | Self::Lower => DataType::Text,
            Self::Length => DataType::Int,
            Self::Matches(_) => DataType::Boolean,
        }
    }

    /// Check the type of the argument.
    pub fn check_input(&self, input: &DataType) -> Result<()> {
        let ok = match (self, input) {
            (_, DataType::Any | DataType::Null) => true,
            (Self::Upper | Self::Lower | Self::Matches(_), DataType::Text) => true,
            (Self::Length, DataType::Text | DataType::List(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(DbError::with_kind(
                ErrorKind::InvalidExpression,
                format!("Function '{}' cannot be applied to {input}", self.name()),
            ))
        }
    }

    /// Apply the function. Null input produces null.
    pub fn apply(&self, input: &Value) -> Result<Value> {
        Ok(match (self, input) {
            (_, Value::Null) => Value::Null,
            (Self::Upper, Value::Text(s)) => Value::Text(s.to_uppercase()),
            (Self::Lower, Value::Text(s)) => Value::Text(s.to_lowercase()),
            (Self::Length, Value::Text(s)) => Value::Int(s.chars().count() as i64),
            (Self::Length, Value::List(values)) => Value::Int(values.len() as i64),
            (Self::Matches(pattern), Value::Text(s)) => Value::Boolean(pattern.is_match(s)),
            (func, other) => {
                return Err(DbError::with_kind(
                    ErrorKind::TypeMismatch,
                    format!(
                        "Function '{}' cannot be applied to a {} value",
                        func.name(),
                        other.type_name()
                    ),
                ));
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub function: ScalarFunction,
    pub input: Box<Expression>,
}

impl fmt::Display for FunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            ScalarFunction::Matches(pattern) => {
                write!(f, "matches({}, '{}')", self.input, pattern.as_str())
            }
            func => write!(f, "{}({})", func.name(), self.input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern() {
        let err = Pattern::try_new("(unclosed").unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn apply_functions() {
        assert_eq!(
            Value::from("FOO"),
            ScalarFunction::Upper.apply(&"foo".into()).unwrap()
        );
        assert_eq!(
            Value::Int(3),
            ScalarFunction::Length.apply(&"héé".into()).unwrap()
        );
        let matches = ScalarFunction::Matches(Pattern::try_new("^b.z$").unwrap());
        assert_eq!(Value::Boolean(true), matches.apply(&"baz".into()).unwrap());
        assert_eq!(Value::Null, matches.apply(&Value::Null).unwrap());
    }

    #[test]
    fn wrong_input_type() {
        ScalarFunction::Upper.check_input(&DataType::Int).unwrap_err();
        let err = ScalarFunction::Lower.apply(&Value::Int(4)).unwrap_err();
        assert!(err.is_kind(ErrorKind::TypeMismatch));
    }
}
