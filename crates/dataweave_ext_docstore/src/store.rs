use std::sync::atomic::{AtomicUsize, Ordering};

use dataweave_core::datasource::{DataSource, Execution, NativeOutput, RowStream};
use dataweave_core::expr::Expression;
use dataweave_core::item::Item;
use dataweave_core::schema::SchemaRef;
use dataweave_core::values::Value;
use dataweave_error::{DbError, ErrorKind, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::convert::{Document, document_from_row, from_json, row_from_document, to_json};
use crate::translate::{Plan, PlanOutput, Translation, Translator, VALUE_FIELD};

/// Data source storing items as JSON documents.
///
/// Subtrees offered for native execution are translated into pipelines
/// where possible. Documents are keyed by their identity fields, or by all
/// fields if the schema has none.
#[derive(Debug)]
pub struct DocStore {
    name: String,
    schema: SchemaRef,
    docs: Mutex<IndexMap<String, Document>>,
    allow_scan: bool,
    scans: AtomicUsize,
    native_executions: AtomicUsize,
}

impl DocStore {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        DocStore {
            name: name.into(),
            schema,
            docs: Mutex::new(IndexMap::new()),
            allow_scan: true,
            scans: AtomicUsize::new(0),
            native_executions: AtomicUsize::new(0),
        }
    }

    /// Refuse full scans. Queries that can't be executed natively will
    /// fail.
    pub fn without_scans(mut self) -> Self {
        self.allow_scan = false;
        self
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of subtrees executed (fully or partially) by the store.
    pub fn native_execution_count(&self) -> usize {
        self.native_executions.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    fn key(&self, item: &Item) -> Result<String> {
        let values = match item.identity()? {
            Some(identity) => {
                if let Some((name, _)) = identity.iter().find(|(_, value)| value.is_null()) {
                    return Err(DbError::with_kind(
                        ErrorKind::DataSource,
                        "Cannot persist an item with a missing identity",
                    )
                    .with_field("field", name)
                    .with_field("source", &self.name));
                }
                identity
            }
            None => item.values()?,
        };
        let key = values
            .iter()
            .map(|(_, value)| to_json(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Json::Array(key).to_string())
    }

    fn snapshot(&self) -> Vec<Document> {
        self.docs.lock().values().cloned().collect()
    }

    fn run_plan(&self, plan: &Plan) -> Result<Option<NativeOutput>> {
        let docs = plan.pipeline.execute(self.snapshot())?;
        Ok(Some(match &plan.output {
            PlanOutput::Rows => {
                let rows = docs
                    .iter()
                    .map(|doc| row_from_document(doc, &self.schema))
                    .collect::<Result<Vec<_>>>()?;
                NativeOutput::Rows(Box::new(rows.into_iter().map(Ok)))
            }
            PlanOutput::Values => {
                let values: Vec<_> = docs.iter().map(from_json).collect();
                NativeOutput::Values(Box::new(values.into_iter().map(Ok)))
            }
            PlanOutput::Scalar { if_empty } => match docs.first() {
                Some(doc) => NativeOutput::Scalar(
                    doc.get(VALUE_FIELD).map(from_json).unwrap_or(Value::Null),
                ),
                None => match if_empty {
                    Some(value) => NativeOutput::Scalar(value.clone()),
                    None => return Ok(None),
                },
            },
        }))
    }

    /// Run a plan, declining instead of failing. The naive evaluator decides
    /// if (and when) an error actually surfaces.
    fn try_run_plan(&self, plan: &Plan) -> Option<NativeOutput> {
        match self.run_plan(plan) {
            Ok(output) => output,
            Err(error) => {
                warn!(%error, source = %self.name, "pipeline failed, declining");
                None
            }
        }
    }
}

impl DataSource for DocStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> &SchemaRef {
        &self.schema
    }

    fn scan(&self) -> Result<RowStream> {
        if !self.allow_scan {
            return Err(DbError::with_kind(
                ErrorKind::DataSource,
                "Full scans are disabled for this store",
            )
            .with_field("source", &self.name));
        }
        self.scans.fetch_add(1, Ordering::Relaxed);

        let rows = self
            .snapshot()
            .iter()
            .map(|doc| row_from_document(doc, &self.schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn try_execute(&self, expr: &Expression) -> Result<Execution> {
        let translation = Translator::new(&self.schema).translate(expr)?;
        let execution = match translation {
            Translation::Full(plan) => {
                debug!(pipeline = %pipeline_json(&plan), source = %self.name, "executing pipeline");
                match self.try_run_plan(&plan) {
                    Some(output) => Execution::Accepted(output),
                    None => Execution::Declined,
                }
            }
            Translation::Partial { plan, remainder } => {
                debug!(
                    pipeline = %pipeline_json(&plan),
                    %remainder,
                    source = %self.name,
                    "executing partial pipeline"
                );
                match self.try_run_plan(&plan) {
                    Some(output) => Execution::Partial { output, remainder },
                    None => Execution::Declined,
                }
            }
            Translation::Untranslatable => Execution::Declined,
        };

        if !matches!(execution, Execution::Declined) {
            self.native_executions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(execution)
    }

    fn save(&self, item: &Item) -> Result<()> {
        let key = self.key(item)?;
        let doc = document_from_row(&item.to_row()?, &self.schema)?;
        self.docs.lock().insert(key, doc);
        Ok(())
    }

    fn delete(&self, item: &Item) -> Result<()> {
        let key = self.key(item)?;
        match self.docs.lock().shift_remove(&key) {
            Some(_) => Ok(()),
            None => Err(DbError::with_kind(
                ErrorKind::DataSource,
                "Cannot delete a document that isn't stored",
            )
            .with_field("source", &self.name)),
        }
    }
}

fn pipeline_json(plan: &Plan) -> String {
    serde_json::to_string(&plan.pipeline).unwrap_or_else(|e| format!("<{e}>"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dataweave_core::datasource::SourceRef;
    use dataweave_core::schema::Schema;
    use dataweave_core::values::DataType;

    use super::*;

    fn store() -> (SourceRef, Arc<DocStore>) {
        let schema = Schema::builder("people")
            .with_identity("id", DataType::Int)
            .with_field("name", DataType::Text)
            .with_field("score", DataType::Float)
            .build()
            .unwrap();
        let store = Arc::new(DocStore::new("people", schema));
        (SourceRef::from_arc(store.clone()), store)
    }

    #[test]
    fn save_replaces_by_identity() {
        let (source, store) = store();
        source
            .create([("id", Value::from(1)), ("name", Value::from("foo"))])
            .unwrap()
            .save()
            .unwrap();
        source
            .create([("id", Value::from(1)), ("name", Value::from("bar"))])
            .unwrap()
            .save()
            .unwrap();
        assert_eq!(1, store.len());

        let items: Vec<_> = source.enumerate_all().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(Value::from("bar"), items[0].try_get_field("name").unwrap());
    }

    #[test]
    fn missing_identity_rejected() {
        let (source, _) = store();
        let err = source.create([("name", "foo")]).unwrap().save().unwrap_err();
        assert!(err.is_kind(ErrorKind::DataSource));
    }

    #[test]
    fn saved_values_type_checked() {
        let (source, store) = store();
        let item = source.create([("id", Value::from(1))]).unwrap();
        item.set("score", "high").unwrap();
        let err = item.save().unwrap_err();
        assert!(err.is_kind(ErrorKind::TypeMismatch));
        assert!(store.is_empty());
    }

    #[test]
    fn ints_stored_as_floats() {
        let (source, _) = store();
        source.create([("id", Value::from(1)), ("score", Value::from(4))]).unwrap().save().unwrap();
        let item = source.enumerate_all().unwrap().next().unwrap().unwrap();
        assert!(matches!(item.try_get_field("score").unwrap(), Value::Float(f) if f == 4.0));
    }

    #[test]
    fn delete() {
        let (source, store) = store();
        let item = source.create([("id", Value::from(1))]).unwrap();
        item.save().unwrap();
        item.delete().unwrap();
        assert!(store.is_empty());
        item.delete().unwrap_err();
    }

    #[test]
    fn scans_disabled() {
        let schema = Schema::builder("people")
            .with_identity("id", DataType::Int)
            .build()
            .unwrap();
        let source = SourceRef::new(DocStore::new("people", schema).without_scans());
        let err = source.enumerate_all().err().unwrap();
        assert!(err.is_kind(ErrorKind::DataSource));
    }

    #[test]
    fn failing_pipeline_declines() {
        let (source, store) = store();
        source.create([("id", Value::from(i64::MAX))]).unwrap().save().unwrap();

        let id = dataweave_core::expr::context().field("id").unwrap();
        let expr = dataweave_core::expr::context()
            .map(dataweave_core::expr::add(id, 1).unwrap())
            .unwrap();
        assert!(matches!(store.try_execute(&expr).unwrap(), Execution::Declined));
        assert_eq!(0, store.native_execution_count());
    }
}
