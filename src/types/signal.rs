use super::app_state::{AppStateSyncKeyData, LtHashState};
use crate::codec::Buffer;
use crate::error::SessionError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Row key of the credentials entry.
pub const CREDS_KEY: &str = "creds";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: Buffer,
    pub private: Buffer,
}

/// Families of signal-protocol key material stored next to the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCategory {
    PreKey = 0,
    Session = 1,
    SenderKey = 2,
    SenderKeyMemory = 3,
    AppStateSyncKey = 4,
    AppStateSyncVersion = 5,
}

/// A decoded value for one [`KeyCategory`].
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    PreKey(KeyPair),
    Session(Buffer),
    SenderKey(Buffer),
    SenderKeyMemory(HashMap<String, bool>),
    AppStateSyncKey(AppStateSyncKeyData),
    AppStateSyncVersion(LtHashState),
}

type Decoder = fn(Value) -> Result<SignalValue, serde_json::Error>;

/// Indexed by the category discriminant.
const DECODERS: [(KeyCategory, Decoder); 6] = [
    (KeyCategory::PreKey, decode_pre_key),
    (KeyCategory::Session, decode_session),
    (KeyCategory::SenderKey, decode_sender_key),
    (KeyCategory::SenderKeyMemory, decode_sender_key_memory),
    (KeyCategory::AppStateSyncKey, decode_app_state_sync_key),
    (KeyCategory::AppStateSyncVersion, decode_app_state_sync_version),
];

fn decode_pre_key(v: Value) -> Result<SignalValue, serde_json::Error> {
    serde_json::from_value(v).map(SignalValue::PreKey)
}

fn decode_session(v: Value) -> Result<SignalValue, serde_json::Error> {
    serde_json::from_value(v).map(SignalValue::Session)
}

fn decode_sender_key(v: Value) -> Result<SignalValue, serde_json::Error> {
    serde_json::from_value(v).map(SignalValue::SenderKey)
}

fn decode_sender_key_memory(v: Value) -> Result<SignalValue, serde_json::Error> {
    serde_json::from_value(v).map(SignalValue::SenderKeyMemory)
}

fn decode_app_state_sync_key(v: Value) -> Result<SignalValue, serde_json::Error> {
    AppStateSyncKeyData::from_object(v).map(SignalValue::AppStateSyncKey)
}

fn decode_app_state_sync_version(v: Value) -> Result<SignalValue, serde_json::Error> {
    serde_json::from_value(v).map(SignalValue::AppStateSyncVersion)
}

impl KeyCategory {
    pub const ALL: [KeyCategory; 6] = [
        KeyCategory::PreKey,
        KeyCategory::Session,
        KeyCategory::SenderKey,
        KeyCategory::SenderKeyMemory,
        KeyCategory::AppStateSyncKey,
        KeyCategory::AppStateSyncVersion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KeyCategory::PreKey => "pre-key",
            KeyCategory::Session => "session",
            KeyCategory::SenderKey => "sender-key",
            KeyCategory::SenderKeyMemory => "sender-key-memory",
            KeyCategory::AppStateSyncKey => "app-state-sync-key",
            KeyCategory::AppStateSyncVersion => "app-state-sync-version",
        }
    }

    /// Row key for `id` within this category.
    pub fn row_key(self, id: &str) -> String {
        format!("{}-{}", self.as_str(), id)
    }

    /// Turn a stored JSON value into this category's typed value.
    pub fn decode(self, value: Value) -> Result<SignalValue, serde_json::Error> {
        let (_, decoder) = DECODERS[self as usize];
        decoder(value)
    }
}

impl fmt::Display for KeyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyCategory {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SessionError::UnknownCategory(s.to_string()))
    }
}

impl Serialize for KeyCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl SignalValue {
    pub fn category(&self) -> KeyCategory {
        match self {
            SignalValue::PreKey(_) => KeyCategory::PreKey,
            SignalValue::Session(_) => KeyCategory::Session,
            SignalValue::SenderKey(_) => KeyCategory::SenderKey,
            SignalValue::SenderKeyMemory(_) => KeyCategory::SenderKeyMemory,
            SignalValue::AppStateSyncKey(_) => KeyCategory::AppStateSyncKey,
            SignalValue::AppStateSyncVersion(_) => KeyCategory::AppStateSyncVersion,
        }
    }
}

// Stored untagged: the row key already names the category.
impl Serialize for SignalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SignalValue::PreKey(v) => v.serialize(serializer),
            SignalValue::Session(v) | SignalValue::SenderKey(v) => v.serialize(serializer),
            SignalValue::SenderKeyMemory(v) => v.serialize(serializer),
            SignalValue::AppStateSyncKey(v) => v.serialize(serializer),
            SignalValue::AppStateSyncVersion(v) => v.serialize(serializer),
        }
    }
}

/// Nested change-set for [`crate::service::auth_state::SignalKeyStore::set`]:
/// category → id → value, where `None` deletes the entry.
pub type SignalDataSet = HashMap<KeyCategory, HashMap<String, Option<SignalValue>>>;
