//! Domain types for the IRC metadata service.

mod context;
mod ids;
mod outcome;

pub use context::{CancelHandle, RequestContext};
pub use ids::{FoundryId, IdParseError, NftId};
pub use outcome::CachedOutcome;
