use crate::db::store::SessionStore;
use crate::error::SessionError;
use crate::types::CREDS_KEY;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process [`SessionStore`] with the same upsert and scoping rules as the
/// MySQL table. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<BTreeMap<(String, String), Option<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all accounts.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn read(&self, account: &str, key: &str) -> Result<Option<Value>, SessionError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(account.to_string(), key.to_string()))
            .cloned()
            .flatten())
    }

    async fn write(&self, account: &str, key: &str, json: &str) -> Result<(), SessionError> {
        // Parse on the way in, like a JSON column does.
        let value: Value = serde_json::from_str(json)?;
        let value = (!value.is_null()).then_some(value);
        self.rows
            .write()
            .await
            .insert((account.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, account: &str, key: &str) -> Result<(), SessionError> {
        self.rows
            .write()
            .await
            .remove(&(account.to_string(), key.to_string()));
        Ok(())
    }

    async fn clear(&self, account: &str) -> Result<(), SessionError> {
        self.rows
            .write()
            .await
            .retain(|(acc, key), _| acc != account || key == CREDS_KEY);
        Ok(())
    }

    async fn remove_all(&self, account: &str) -> Result<(), SessionError> {
        self.rows.write().await.retain(|(acc, _), _| acc != account);
        Ok(())
    }

    async fn keys(&self, account: &str) -> Result<Vec<String>, SessionError> {
        let rows = self.rows.read().await;
        Ok(rows
            .keys()
            .filter(|(acc, _)| acc == account)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_keeps_one_row_with_latest_value() {
        let store = MemoryStore::new();
        store.write("a", "k", r#"{"v":1}"#).await.unwrap();
        store.write("a", "k", r#"{"v":2}"#).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.read("a", "k").await.unwrap(), Some(json!({ "v": 2 })));
    }

    #[tokio::test]
    async fn null_values_read_as_absent() {
        let store = MemoryStore::new();
        store.write("a", "k", "null").await.unwrap();
        assert_eq!(store.read("a", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_and_remove_all_are_scoped() {
        let store = MemoryStore::new();
        for account in ["a", "b"] {
            store.write(account, CREDS_KEY, "{}").await.unwrap();
            store.write(account, "session-1", "1").await.unwrap();
        }

        store.clear("a").await.unwrap();
        assert_eq!(store.keys("a").await.unwrap(), vec![CREDS_KEY.to_string()]);
        assert_eq!(store.keys("b").await.unwrap().len(), 2);

        store.remove_all("a").await.unwrap();
        assert!(store.keys("a").await.unwrap().is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn rejects_invalid_json_text() {
        let store = MemoryStore::new();
        assert!(store.write("a", "k", "{oops").await.is_err());
        assert!(store.is_empty().await);
    }
}
