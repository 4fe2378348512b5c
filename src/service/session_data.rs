use crate::codec::{self, StoredJson};
use crate::config::{MAX_ACCOUNT_LEN, MAX_KEY_LEN};
use crate::db::store::SessionStore;
use crate::error::SessionError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Row operations for a single account.
#[derive(Debug, Clone)]
pub struct SessionData<S> {
    store: S,
    account: String,
}

impl<S: SessionStore> SessionData<S> {
    pub fn new(store: S, account: impl Into<String>) -> Result<Self, SessionError> {
        let account = account.into();
        if account.is_empty() || account.chars().count() > MAX_ACCOUNT_LEN {
            return Err(SessionError::InvalidConfig(format!(
                "account must be 1-{MAX_ACCOUNT_LEN} characters, got {account:?}"
            )));
        }
        Ok(Self { store, account })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored JSON for `key`, one level of double encoding removed.
    pub async fn read_raw(&self, key: &str) -> Result<Option<Value>, SessionError> {
        check_key(key)?;
        let Some(value) = self.store.read(&self.account, key).await? else {
            return Ok(None);
        };
        let value = codec::normalize(StoredJson::Parsed(value)).map_err(|source| {
            SessionError::MalformedValue {
                key: key.to_string(),
                source,
            }
        })?;
        Ok(Some(value))
    }

    pub async fn read_data<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, SessionError> {
        let Some(value) = self.read_raw(key).await? else {
            debug!(account = %self.account, key, "no stored value");
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| SessionError::MalformedValue {
                key: key.to_string(),
                source,
            })
    }

    pub async fn write_data<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), SessionError> {
        check_key(key)?;
        let json = codec::serialize(value)?;
        self.store.write(&self.account, key, &json).await
    }

    pub async fn remove_data(&self, key: &str) -> Result<(), SessionError> {
        check_key(key)?;
        self.store.remove(&self.account, key).await
    }

    /// Delete everything but the credentials row.
    pub async fn clear_all(&self) -> Result<(), SessionError> {
        self.store.clear(&self.account).await
    }

    /// Delete every row of this account, credentials included.
    pub async fn remove_all(&self) -> Result<(), SessionError> {
        self.store.remove_all(&self.account).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, SessionError> {
        self.store.keys(&self.account).await
    }
}

pub(crate) fn check_key(key: &str) -> Result<(), SessionError> {
    if key.is_empty() || key.chars().count() > MAX_KEY_LEN {
        return Err(SessionError::InvalidKey {
            key: key.to_string(),
            reason: format!("must be 1-{MAX_KEY_LEN} characters"),
        });
    }
    Ok(())
}
