//! The contract between data sources and the executor.
pub mod memory;

mod source_ref;

use std::fmt::Debug;

use dataweave_error::Result;
pub use source_ref::SourceRef;

use crate::eval::ValueStream;
use crate::expr::Expression;
use crate::item::{Item, Loader, Row};
use crate::schema::SchemaRef;
use crate::values::Value;

pub type RowStream = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// Output of natively executing a subtree.
pub enum NativeOutput {
    /// Stored records, turned into items of the source.
    Rows(RowStream),
    Values(ValueStream),
    Scalar(Value),
}

/// Response of a data source to an offered subtree.
pub enum Execution {
    /// The whole subtree was executed.
    Accepted(NativeOutput),
    /// Part of the subtree was executed. `remainder` must be evaluated with
    /// the output bound as its input to get the result of the subtree.
    Partial {
        output: NativeOutput,
        remainder: Expression,
    },
    /// Nothing was executed, the subtree should be evaluated some other way.
    Declined,
}

impl Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted(_) => write!(f, "Accepted"),
            Self::Partial { remainder, .. } => write!(f, "Partial({remainder})"),
            Self::Declined => write!(f, "Declined"),
        }
    }
}

/// A backend holding records of a single schema.
pub trait DataSource: Debug + Sync + Send + 'static {
    fn name(&self) -> &str;

    /// Schema of every record in this source. Must not change.
    fn properties(&self) -> &SchemaRef;

    /// Read every stored record.
    fn scan(&self) -> Result<RowStream>;

    /// Try to execute a subtree natively.
    ///
    /// The input of the subtree is the full set of records in this source.
    /// Results must be identical to evaluating the subtree with the naive
    /// evaluator over `scan`, in the same order.
    fn try_execute(&self, _expr: &Expression) -> Result<Execution> {
        Ok(Execution::Declined)
    }

    /// Persist an item, inserting or replacing by identity.
    fn save(&self, item: &Item) -> Result<()>;

    fn delete(&self, item: &Item) -> Result<()>;

    /// Loaders for properties that aren't stored and are computed on access
    /// instead.
    fn deferred_properties(&self) -> Vec<(String, Loader)> {
        Vec::new()
    }
}
