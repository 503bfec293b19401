//! Row store adapters.
//!
//! Both adapters implement every repository port plus `ResolutionStore`, so the
//! composition root can hand the same `Arc` out under each trait.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
