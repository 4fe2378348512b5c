use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

/// Value column of a session row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbValue {
    pub ws_value: Option<Json<Value>>,
}

impl DbValue {
    pub fn into_value(self) -> Option<Value> {
        self.ws_value.map(|Json(v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbKey {
    pub ws_key: String,
}
