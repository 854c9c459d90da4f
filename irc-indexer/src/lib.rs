//! # IRC Indexer
//!
//! Fetches the immutable metadata feature of NFT and foundry outputs from a
//! node's indexer and core REST APIs, classifying every failure as not-found,
//! invalid or transient at the point where it happens.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod indexer;

pub use indexer::{IndexerClient, IndexerConfig};
