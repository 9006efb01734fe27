//! Session consistency state
//!
//! - **[`token`]**: vector session token format and merge
//! - **[`store`]**: per-range token store shared by all requests

pub mod store;
pub mod token;

pub use store::SessionTokenStore;
pub use token::{CompoundSessionToken, SessionTokenError, VectorSessionToken};
