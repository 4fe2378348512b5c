//! Database module: the session table, its stores and the connection they share.
//!
//! Layout:
//! - `schema.rs`: SQL rendered for the configured table name
//! - `models.rs`: row structs decoded by sqlx
//! - `connection.rs`: lazily opened, memoized MySQL handle
//! - `retry.rs`: fixed-delay retry around every query
//! - `store.rs`: the `SessionStore` seam
//! - `mysql.rs` / `memory.rs`: MySQL and in-process implementations

pub mod connection;
pub mod memory;
pub mod models;
pub mod mysql;
pub mod retry;
pub mod schema;
pub mod store;

pub use connection::Connector;
pub use memory::MemoryStore;
pub use mysql::{MySqlSessionStore, QueryValue};
pub use retry::QueryRetrier;
pub use schema::Statements;
pub use store::SessionStore;
