//! Persistent state: licenses, connections, redirections, transformations,
//! whitelist/blacklist filters and session metadata.
//!
//! PostgreSQL is the production backend; SQLite works for local runs and tests.
//! Both go through an SQLx `Any` pool.
//!
//! Rows are never physically removed here: deactivation flips `active` to
//! false and every `active_*` query filters on it.

mod backend;
mod config;
mod models;
mod queries;

#[cfg(test)]
mod tests;

pub use backend::{DatabaseType, StateStore};
pub use config::StoreConfig;
pub use models::{Connection, Filter, FilterList, License, Redirection, SessionRecord, Transformation};
