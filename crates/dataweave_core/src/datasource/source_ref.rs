use std::fmt;
use std::sync::Arc;

use dataweave_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::{DataSource, Execution, NativeOutput};
use crate::config::execution::ExecutionConfig;
use crate::eval::{NaiveEvaluator, Output, ValueStream};
use crate::expr::{self, Expression};
use crate::item::{Item, Loader, Row};
use crate::optimizer::OptimizingExecutor;
use crate::schema::SchemaRef;
use crate::values::{DataType, Value};

/// Shared handle to a data source.
///
/// Items hold on to the source they belong to through this handle. Two
/// handles are equal if they point to the same source.
#[derive(Clone)]
pub struct SourceRef {
    source: Arc<dyn DataSource>,
    loaders: Arc<Vec<(String, Loader)>>,
}

impl SourceRef {
    pub fn new(source: impl DataSource) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<dyn DataSource>) -> Self {
        let loaders = Arc::new(source.deferred_properties());
        SourceRef { source, loaders }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn properties(&self) -> &SchemaRef {
        self.source.properties()
    }

    pub fn inner(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Create a new item belonging to this source without persisting it.
    ///
    /// Values are checked against the schema.
    pub fn create<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> Result<Item>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let row: Row = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.create_with_loaders(row, [])
    }

    /// Create a new item with some fields computed on first access.
    ///
    /// Deferred properties of the source apply to fields given neither a
    /// value nor a loader.
    pub fn create_with_loaders(
        &self,
        row: Row,
        loaders: impl IntoIterator<Item = (String, Loader)>,
    ) -> Result<Item> {
        let schema = self.properties();
        for (name, value) in &row {
            if let Some(prop) = schema.property(name) {
                prop.validate(value)?;
            }
        }
        // Later loaders replace earlier ones for the same field.
        let loaders: Vec<_> = self.deferred_for(&row).chain(loaders).collect();
        Item::try_new(self.clone(), row, loaders)
    }

    /// Wrap a stored row into an item, attaching loaders for deferred
    /// properties the row doesn't carry.
    pub fn wrap_row(&self, row: Row) -> Result<Item> {
        let loaders: Vec<_> = self.deferred_for(&row).collect();
        Item::try_new(self.clone(), row, loaders)
    }

    fn deferred_for<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = (String, Loader)> + 'a {
        self.loaders
            .iter()
            .filter(|(name, _)| !row.contains_key(name))
            .cloned()
    }

    /// Every item in this source.
    pub fn enumerate_all(&self) -> Result<ValueStream> {
        debug!(source = %self.name(), "full scan");
        let rows = self.source.scan()?;
        let this = self.clone();
        Ok(Box::new(
            rows.map(move |row| Ok(Value::Item(this.wrap_row(row?)?))),
        ))
    }

    pub fn try_execute(&self, expr: &Expression) -> Result<Execution> {
        self.source.try_execute(expr)
    }

    /// Convert the output of native execution into evaluator output.
    pub fn native_output(&self, output: NativeOutput) -> Output {
        match output {
            NativeOutput::Rows(rows) => {
                let this = self.clone();
                Output::Sequence(Box::new(
                    rows.map(move |row| Ok(Value::Item(this.wrap_row(row?)?))),
                ))
            }
            NativeOutput::Values(values) => Output::Sequence(values),
            NativeOutput::Scalar(value) => Output::Value(value),
        }
    }

    pub fn save(&self, item: &Item) -> Result<()> {
        self.check_owned(item)?;
        self.source.save(item)
    }

    pub fn delete(&self, item: &Item) -> Result<()> {
        self.check_owned(item)?;
        self.source.delete(item)
    }

    fn check_owned(&self, item: &Item) -> Result<()> {
        if item.source() != self {
            return Err(DbError::with_kind(
                ErrorKind::DataSource,
                "Item belongs to a different source",
            )
            .with_field("source", self.name())
            .with_field("item_source", item.source().name()));
        }
        Ok(())
    }

    /// Expression standing for every item in this source.
    pub fn all(&self) -> Expression {
        expr::typed_context(DataType::list(DataType::Item(self.properties().clone())))
    }

    /// Execute an expression against this source, using native execution
    /// where the source supports it.
    pub fn execute(&self, expr: &Expression) -> Result<Output> {
        self.execute_with(expr, &ExecutionConfig::default())
    }

    pub fn execute_with(&self, expr: &Expression, config: &ExecutionConfig) -> Result<Output> {
        OptimizingExecutor::new(config.clone()).run(expr, self)
    }

    /// Execute an expression with the naive evaluator over a full scan.
    pub fn execute_naive(&self, expr: &Expression) -> Result<Output> {
        let this = self.clone();
        NaiveEvaluator::new().run_lazy(expr, move || this.enumerate_all())
    }
}

impl PartialEq for SourceRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceRef").field(&self.source).finish()
    }
}
