use crate::config::MySqlAuthConfig;
use crate::db::mysql::{MySqlSessionStore, QueryValue};
use crate::db::store::SessionStore;
use crate::error::SessionError;
use crate::service::session_data::{SessionData, check_key};
use crate::types::{CREDS_KEY, KeyCategory, SignalDataSet, SignalValue};
use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::mysql::MySqlRow;
use std::collections::HashMap;
use tracing::{debug, info};

/// Long-lived identity material of a session, owned by the protocol client.
pub trait AuthCreds: Serialize + DeserializeOwned + Send + Sync {
    /// Fresh credentials for a session that has never been stored.
    fn init() -> Self;
}

/// Signal key store handed to the protocol client.
#[derive(Debug, Clone)]
pub struct SignalKeyStore<S> {
    data: SessionData<S>,
}

impl<S: SessionStore> SignalKeyStore<S> {
    /// Values for `ids`; ids without a row map to `None`.
    pub async fn get<I>(
        &self,
        category: KeyCategory,
        ids: I,
    ) -> Result<HashMap<String, Option<SignalValue>>, SessionError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let reads = ids.into_iter().map(|id| {
            let id = id.as_ref().to_string();
            async move {
                let key = category.row_key(&id);
                let value = match self.data.read_raw(&key).await? {
                    Some(raw) => Some(
                        category
                            .decode(raw)
                            .map_err(|source| SessionError::MalformedValue { key, source })?,
                    ),
                    None => None,
                };
                Ok::<_, SessionError>((id, value))
            }
        });
        let entries = try_join_all(reads).await?;
        Ok(entries.into_iter().collect())
    }

    /// Apply a change-set: `Some` upserts, `None` deletes. Every entry is
    /// checked before the first write, so a rejected set writes nothing.
    pub async fn set(&self, changes: SignalDataSet) -> Result<(), SessionError> {
        let mut writes = Vec::new();
        for (category, entries) in changes {
            for (id, value) in entries {
                if let Some(v) = value.as_ref().filter(|v| v.category() != category) {
                    return Err(SessionError::CategoryMismatch {
                        id,
                        expected: category.as_str(),
                        actual: v.category().as_str(),
                    });
                }
                let key = category.row_key(&id);
                check_key(&key)?;
                writes.push((key, value));
            }
        }

        debug!(account = %self.data.account(), count = writes.len(), "applying key changes");
        try_join_all(writes.iter().map(|(key, value)| async move {
            match value {
                Some(v) => self.data.write_data(key, v).await,
                None => self.data.remove_data(key).await,
            }
        }))
        .await?;
        Ok(())
    }
}

/// Auth state of one account: cached credentials plus the signal key store.
///
/// Credentials are read once at load time. Mutate `creds` in place and call
/// [`AuthState::save_creds`] to persist; nothing is written implicitly.
#[derive(Debug, Clone)]
pub struct AuthState<C, S> {
    pub creds: C,
    pub keys: SignalKeyStore<S>,
    data: SessionData<S>,
}

pub type MySqlAuthState<C> = AuthState<C, MySqlSessionStore>;

impl<C: AuthCreds, S: SessionStore + Clone> AuthState<C, S> {
    /// Load the credentials of `account`, initializing them if absent.
    pub async fn load(store: S, account: impl Into<String>) -> Result<Self, SessionError> {
        let data = SessionData::new(store, account)?;
        let creds = match data.read_data::<C>(CREDS_KEY).await? {
            Some(creds) => {
                debug!(account = %data.account(), "loaded stored credentials");
                creds
            }
            None => {
                info!(account = %data.account(), "no stored credentials; initializing");
                C::init()
            }
        };
        Ok(Self {
            creds,
            keys: SignalKeyStore { data: data.clone() },
            data,
        })
    }
}

impl<C: AuthCreds, S: SessionStore> AuthState<C, S> {
    pub fn account(&self) -> &str {
        self.data.account()
    }

    pub fn data(&self) -> &SessionData<S> {
        &self.data
    }

    pub async fn save_creds(&self) -> Result<(), SessionError> {
        self.data.write_data(CREDS_KEY, &self.creds).await?;
        debug!(account = %self.data.account(), "credentials saved");
        Ok(())
    }

    /// Drop all key material, keep the credentials row.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.data.clear_all().await
    }

    /// Drop everything stored for this account, credentials included.
    pub async fn remove_creds(&self) -> Result<(), SessionError> {
        self.data.remove_all().await
    }
}

impl<C: AuthCreds> AuthState<C, MySqlSessionStore> {
    /// Raw SQL passthrough with the store's retry policy.
    pub async fn query(
        &self,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<Vec<MySqlRow>, SessionError> {
        self.data.store().query(sql, values).await
    }
}

/// Connect with `config` and load the auth state of `config.session`.
pub async fn use_mysql_auth_state<C: AuthCreds>(
    config: MySqlAuthConfig,
) -> Result<MySqlAuthState<C>, SessionError> {
    let account = config.session.clone();
    let store = MySqlSessionStore::connect(config)?;
    AuthState::load(store, account).await
}
