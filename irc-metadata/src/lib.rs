//! # IRC Metadata Validator
//!
//! Resolves metadata keys to classified, cached outcomes.
//!
//! A [`MetadataValidator`] owns one compiled schema and one LRU cache. On a
//! miss it asks its [`MetadataFetcher`](irc_core::MetadataFetcher) for the
//! raw bytes, parses them as JSON and validates them against the schema.
//! Not-found and invalid results are cached alongside valid ones; transient
//! failures are not.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod validator;

pub use validator::{KeyParser, MetadataValidator};
