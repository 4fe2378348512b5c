use crate::config::MySqlAuthConfig;
use crate::db::connection::Connector;
use crate::db::models::{DbKey, DbValue};
use crate::db::retry::QueryRetrier;
use crate::db::store::SessionStore;
use crate::error::SessionError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::types::Json;
use std::sync::Arc;
use tracing::debug;

/// Parameter for [`MySqlSessionStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Text(s)
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        QueryValue::Int(n)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &QueryValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value.clone() {
        QueryValue::Null => query.bind(None::<String>),
        QueryValue::Bool(b) => query.bind(b),
        QueryValue::Int(n) => query.bind(n),
        QueryValue::Float(f) => query.bind(f),
        QueryValue::Text(s) => query.bind(s),
        QueryValue::Bytes(b) => query.bind(b),
        QueryValue::Json(v) => query.bind(Json(v)),
    }
}

/// [`SessionStore`] backed by the MySQL session table.
///
/// Every statement runs through the connector's retry policy and asks the
/// connector for the handle on each attempt, so a dropped connection is
/// replaced between attempts.
#[derive(Clone)]
pub struct MySqlSessionStore {
    connector: Arc<Connector>,
    retrier: QueryRetrier,
}

impl MySqlSessionStore {
    pub fn new(connector: Arc<Connector>) -> Self {
        let retrier = QueryRetrier::from_config(connector.config());
        Self { connector, retrier }
    }

    /// Build a connector from `config` and wrap it.
    pub fn connect(config: MySqlAuthConfig) -> Result<Self, SessionError> {
        Ok(Self::new(Arc::new(Connector::new(config)?)))
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    /// Run arbitrary SQL with the same retry policy as the built-in
    /// statements.
    pub async fn query(
        &self,
        sql: &str,
        values: &[QueryValue],
    ) -> Result<Vec<MySqlRow>, SessionError> {
        self.retrier
            .run(|| async {
                let pool = self.connector.connection(false).await?;
                let query = values
                    .iter()
                    .fold(sqlx::query(sql), |q, v| bind_value(q, v));
                Ok(query.fetch_all(&pool).await?)
            })
            .await
    }

    async fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, SessionError> {
        self.retrier
            .run(|| async {
                let pool = self.connector.connection(false).await?;
                let query = params.iter().fold(sqlx::query(sql), |q, p| q.bind(*p));
                Ok(query.execute(&pool).await?.rows_affected())
            })
            .await
    }

    fn statements(&self) -> &crate::db::schema::Statements {
        self.connector.statements()
    }
}

#[async_trait]
impl SessionStore for MySqlSessionStore {
    async fn read(&self, account: &str, key: &str) -> Result<Option<Value>, SessionError> {
        let sql = &self.statements().select_value;
        let row: Option<DbValue> = self
            .retrier
            .run(|| async {
                let pool = self.connector.connection(false).await?;
                Ok(sqlx::query_as::<_, DbValue>(sql)
                    .bind(account)
                    .bind(key)
                    .fetch_optional(&pool)
                    .await?)
            })
            .await?;
        Ok(row
            .and_then(DbValue::into_value)
            .filter(|v| !v.is_null()))
    }

    async fn write(&self, account: &str, key: &str, json: &str) -> Result<(), SessionError> {
        let affected = self
            .execute(&self.statements().upsert, &[account, key, json, json])
            .await?;
        debug!(account, key, affected, "session row written");
        Ok(())
    }

    async fn remove(&self, account: &str, key: &str) -> Result<(), SessionError> {
        self.execute(&self.statements().delete_one, &[account, key])
            .await?;
        Ok(())
    }

    async fn clear(&self, account: &str) -> Result<(), SessionError> {
        let affected = self
            .execute(&self.statements().delete_all_but_creds, &[account])
            .await?;
        debug!(account, affected, "session keys cleared");
        Ok(())
    }

    async fn remove_all(&self, account: &str) -> Result<(), SessionError> {
        let affected = self
            .execute(&self.statements().delete_all, &[account])
            .await?;
        debug!(account, affected, "session removed");
        Ok(())
    }

    async fn keys(&self, account: &str) -> Result<Vec<String>, SessionError> {
        let sql = &self.statements().list_keys;
        let rows: Vec<DbKey> = self
            .retrier
            .run(|| async {
                let pool = self.connector.connection(false).await?;
                Ok(sqlx::query_as::<_, DbKey>(sql)
                    .bind(account)
                    .fetch_all(&pool)
                    .await?)
            })
            .await?;
        Ok(rows.into_iter().map(|r| r.ws_key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_comes_from_config() {
        let mut cfg = MySqlAuthConfig::new("main");
        cfg.max_retries = 2;
        cfg.retry_request_delay_ms = 5;
        let store = MySqlSessionStore::connect(cfg).unwrap();
        assert_eq!(store.retrier.max_attempts(), 2);
        assert_eq!(store.retrier.delay().as_millis(), 5);
    }

    #[test]
    fn query_values_convert_from_primitives() {
        assert_eq!(QueryValue::from("a"), QueryValue::Text("a".to_string()));
        assert_eq!(QueryValue::from(3i64), QueryValue::Int(3));
        assert_eq!(QueryValue::from(true), QueryValue::Bool(true));
    }

    #[tokio::test]
    async fn unreachable_server_exhausts_retries() {
        let mut cfg = MySqlAuthConfig::new("main");
        // Port 1 on loopback refuses connections immediately.
        cfg.host = "127.0.0.1".to_string();
        cfg.port = 1;
        cfg.max_retries = 2;
        cfg.retry_request_delay_ms = 1;
        cfg.connect_timeout_ms = 200;
        let store = MySqlSessionStore::connect(cfg).unwrap();

        let err = store.read("main", "creds").await.unwrap_err();
        match err {
            SessionError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
