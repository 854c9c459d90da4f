//! # IRC Metadata Core
//!
//! Core types, errors, and traits shared by the IRC metadata service crates.
//!
//! - **Types**: fixed-width identifiers, cached outcomes, request contexts
//! - **Errors**: the fetch/parameter/transient error taxonomy
//! - **Constants**: schema locations, routes and defaults
//! - **Traits**: the [`MetadataFetcher`] seam used to inject upstream sources
//!
//! ## Example
//!
//! ```rust
//! use irc_core::{CachedOutcome, NftId};
//!
//! let id: NftId = "0x0000000000000000000000000000000000000000000000000000000000000001"
//!     .parse()
//!     .unwrap();
//! assert_eq!(id.as_bytes()[31], 1);
//! assert!(CachedOutcome::NotFound.payload().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{FetchError, IrcError, ParameterError, Result, TransientError};
pub use traits::MetadataFetcher;
pub use types::*;
