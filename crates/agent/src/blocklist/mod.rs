#![forbid(unsafe_code)]

mod enforcer;
mod store;

pub use enforcer::BlocklistEnforcer;
pub use store::{BlocklistStore, JsonBlocklistStore};
