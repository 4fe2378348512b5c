use crate::error::SessionError;
use async_trait::async_trait;
use serde_json::Value;

/// Row-level operations over the session table, scoped by account.
///
/// Values are written as JSON text and read back as parsed JSON, the way a
/// JSON column round-trips them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `None` when no row exists for (account, key).
    async fn read(&self, account: &str, key: &str) -> Result<Option<Value>, SessionError>;

    /// Insert, or overwrite the value of an existing row.
    async fn write(&self, account: &str, key: &str, json: &str) -> Result<(), SessionError>;

    async fn remove(&self, account: &str, key: &str) -> Result<(), SessionError>;

    /// Delete every row of `account` except the credentials row.
    async fn clear(&self, account: &str) -> Result<(), SessionError>;

    /// Delete every row of `account`, credentials included.
    async fn remove_all(&self, account: &str) -> Result<(), SessionError>;

    /// Stored keys of `account`, sorted.
    async fn keys(&self, account: &str) -> Result<Vec<String>, SessionError>;
}
