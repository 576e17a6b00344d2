//! sb-db: SQLite persistence for the shutterbox catalogue.
//!
//! Connection pooling, embedded migrations, typed models and the query
//! functions the sync pipeline calls. Every query is a free function over a
//! borrowed `rusqlite::Connection`.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
