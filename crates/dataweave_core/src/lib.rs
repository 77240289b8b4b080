//! Core of dataweave: a uniform record abstraction over heterogeneous data
//! sources, and a small query algebra to go with it.
//!
//! # Records
//!
//! Every data source declares a [`schema::Schema`]. Records coming out of a
//! source are [`item::Item`]s, bound to that schema: an item always exposes
//! exactly the schema's fields, fields may be loaded lazily, and persistence
//! is delegated back to the source the item came from.
//!
//! # Expressions
//!
//! Queries are [`expr::Expression`] trees built through the functions in
//! [`expr`]. Trees are immutable values and are type checked as they're
//! built. The root [`expr::context`] of a tree stands for the input sequence,
//! nested operators (filter predicates, map projections, sort keys, ...)
//! rebind the context to the element under consideration.
//!
//! # Execution
//!
//! The [`eval::NaiveEvaluator`] executes any tree over an in-memory stream of
//! values. The [`optimizer::OptimizingExecutor`] offers subtrees to a data
//! source for native execution and evaluates whatever remains with the naive
//! evaluator. Both produce the same results, the optimizer only changes where
//! the work happens.
pub mod config;
pub mod datasource;
pub mod eval;
pub mod expr;
pub mod item;
pub mod optimizer;
pub mod schema;
pub mod values;
