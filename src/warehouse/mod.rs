//! Declarative bulk pipeline: plan generation (`sql`) and the SQL store
//! that executes the plans (`store`).
//!
//! This is the training-at-scale twin of `session`/`enrich`/`features`:
//! the same sessionization, enrichment, aggregation, and labeling
//! expressed as one set-oriented execution plan per stage. For any row
//! present in both representations the results must match to
//! floating-point tolerance; the integration tests hold both substrates to
//! that contract.

pub mod sql;
pub mod store;

pub use sql::{features_table_sql, sessionize_table_sql};
pub use store::Warehouse;
