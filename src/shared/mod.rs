//! Request-scoped shared data
//!
//! Lets independent middleware stages in one request's handler chain hand
//! values to each other, e.g. a borrowed database handle.

pub mod scope;
pub mod store;

pub use scope::{with_shared_data, MissingSharedScope, SharedScope};
pub use store::{RequestId, ScopeGuard, SharedDataStore, SharedValue};
