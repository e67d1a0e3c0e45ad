//! History store for sitelens
//!
//! SQLite storage with:
//! - Schema migrations
//! - Repository for appending and listing analysis records

pub mod repo;
pub mod schema;

pub use repo::Database;
