use crate::codec::Buffer;
use serde::de::{self, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppStateSyncKeyFingerprint {
    pub raw_id: u32,
    pub current_index: u32,
    pub device_indexes: Vec<u32>,
}

/// Key material used to decrypt app-state patches.
///
/// Stored rows are written by several generations of clients, so reads go
/// through [`AppStateSyncKeyData::from_object`] instead of plain serde.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateSyncKeyData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<Buffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<AppStateSyncKeyFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl AppStateSyncKeyData {
    /// Rebuild the typed form from whatever object shape was stored.
    ///
    /// `keyData` may be a tagged buffer, a base64 string or a byte array.
    /// `timestamp` may be a number, a numeric string, or a split 64-bit
    /// `{low, high, unsigned}` object. Unknown fields are ignored.
    pub fn from_object(value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(obj) = value else {
            return Err(serde_json::Error::custom(
                "app-state-sync-key value must be an object",
            ));
        };

        let key_data = non_null(&obj, "keyData")
            .map(Buffer::from_loose)
            .transpose()?;
        let fingerprint = non_null(&obj, "fingerprint")
            .map(fingerprint_from_object)
            .transpose()?;
        let timestamp = non_null(&obj, "timestamp").map(long_from_value).transpose()?;

        Ok(Self {
            key_data,
            fingerprint,
            timestamp,
        })
    }
}

fn non_null<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn fingerprint_from_object(value: &Value) -> Result<AppStateSyncKeyFingerprint, serde_json::Error> {
    let Value::Object(obj) = value else {
        return Err(serde_json::Error::custom("fingerprint must be an object"));
    };
    let field = |name: &str| -> Result<u32, serde_json::Error> {
        non_null(obj, name).map_or(Ok(0), uint32_from_value)
    };
    let device_indexes = match non_null(obj, "deviceIndexes") {
        Some(Value::Array(items)) => items
            .iter()
            .map(uint32_from_value)
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(serde_json::Error::custom(format!(
                "deviceIndexes must be an array, found {other}"
            )));
        }
        None => Vec::new(),
    };
    Ok(AppStateSyncKeyFingerprint {
        raw_id: field("rawId")?,
        current_index: field("currentIndex")?,
        device_indexes,
    })
}

fn uint32_from_value(value: &Value) -> Result<u32, serde_json::Error> {
    let n = long_from_value(value)?;
    u32::try_from(n)
        .map_err(|_| serde_json::Error::custom(format!("{n} is out of range for uint32")))
}

fn long_from_value(value: &Value) -> Result<i64, serde_json::Error> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| serde_json::Error::custom(format!("{n} is not an integer"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| serde_json::Error::custom(format!("invalid integer {s:?}: {e}"))),
        Value::Object(obj) => {
            let part = |name: &str| -> Result<u32, serde_json::Error> {
                match obj.get(name) {
                    Some(Value::Number(n)) => n
                        .as_i64()
                        .map(|v| v as u32)
                        .ok_or_else(|| serde_json::Error::custom("long parts must be integers")),
                    _ => Err(serde_json::Error::custom(format!("long is missing {name:?}"))),
                }
            };
            let low = part("low")?;
            let high = part("high")?;
            Ok((((high as u64) << 32) | low as u64) as i64)
        }
        other => Err(de::Error::custom(format!("expected an integer, found {other}"))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMac {
    pub value_mac: Buffer,
}

/// Rolling hash state of one app-state collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtHashState {
    pub version: u64,
    pub hash: Buffer,
    #[serde(default)]
    pub index_value_map: HashMap<String, ValueMac>,
}
