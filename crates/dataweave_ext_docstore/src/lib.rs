//! A document store data source.
//!
//! Documents are kept in memory as JSON objects. The store executes
//! expression subtrees natively by translating them into aggregation
//! pipelines, see [`translate`] for what gets translated.
pub mod convert;
pub mod pipeline;
pub mod store;
pub mod translate;

pub use store::DocStore;
