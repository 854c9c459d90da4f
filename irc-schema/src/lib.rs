//! # IRC Schema
//!
//! Compiles one JSON Schema document per metadata standard at startup and
//! offers a pure validation predicate afterwards.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod schema;

pub use schema::{SchemaError, SchemaValidator, SchemaViolation, Violation};
