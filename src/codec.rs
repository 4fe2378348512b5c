//! JSON text encoding for stored values.
//!
//! Plain JSON has no binary type, so byte payloads travel as [`Buffer`], which
//! serializes to `{"type":"Buffer","data":"<base64>"}`. Reads accept either a
//! value the driver already parsed out of the JSON column or raw text, and
//! unwrap one level of double encoding.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const BUFFER_TAG: &str = "Buffer";

/// Owned byte payload with a tagged JSON representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Buffer(pub Vec<u8>);

impl Buffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// Accepts the tagged form, a bare base64 string, or an array of bytes.
    pub fn from_loose(value: &Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::String(s) => decode_base64(s).map_err(de::Error::custom),
            Value::Array(_) => Vec::<u8>::deserialize(value).map(Buffer),
            Value::Object(_) => Buffer::deserialize(value),
            other => Err(de::Error::custom(format!(
                "expected binary data, found {other}"
            ))),
        }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Buffer(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Buffer(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Buffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", BUFFER_TAG)?;
        map.serialize_entry("data", &STANDARD.encode(&self.0))?;
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaggedData {
    Base64(String),
    Bytes(Vec<u8>),
}

#[derive(Deserialize)]
struct TaggedBuffer {
    #[serde(rename = "type")]
    kind: String,
    data: TaggedData,
}

impl<'de> Deserialize<'de> for Buffer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tagged = TaggedBuffer::deserialize(deserializer)?;
        if tagged.kind != BUFFER_TAG {
            return Err(de::Error::custom(format!(
                "expected type {BUFFER_TAG:?}, found {:?}",
                tagged.kind
            )));
        }
        match tagged.data {
            TaggedData::Base64(s) => decode_base64(&s).map_err(de::Error::custom),
            TaggedData::Bytes(bytes) => Ok(Buffer(bytes)),
        }
    }
}

fn decode_base64(s: &str) -> Result<Buffer, base64::DecodeError> {
    STANDARD.decode(s).map(Buffer)
}

/// A value as it comes back from storage.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredJson {
    /// Already parsed by the driver (JSON column).
    Parsed(Value),
    /// Raw JSON text.
    Text(String),
}

impl From<Value> for StoredJson {
    fn from(value: Value) -> Self {
        StoredJson::Parsed(value)
    }
}

impl From<String> for StoredJson {
    fn from(text: String) -> Self {
        StoredJson::Text(text)
    }
}

pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Bring a stored value back to a single level of JSON.
pub fn normalize(stored: StoredJson) -> Result<Value, serde_json::Error> {
    match stored {
        StoredJson::Text(text) => serde_json::from_str(&text),
        // A string column value holding JSON text was encoded twice.
        StoredJson::Parsed(Value::String(s)) => {
            Ok(serde_json::from_str(&s).unwrap_or(Value::String(s)))
        }
        StoredJson::Parsed(value) => Ok(value),
    }
}

pub fn deserialize<T: DeserializeOwned>(stored: StoredJson) -> Result<T, serde_json::Error> {
    serde_json::from_value(normalize(stored)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Identity {
        public: Buffer,
        private: Buffer,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Envelope {
        name: String,
        identity: Identity,
        history: Vec<Buffer>,
        extra: Option<HashMap<String, Buffer>>,
        missing: Option<u32>,
    }

    fn sample() -> Envelope {
        Envelope {
            name: "main".to_string(),
            identity: Identity {
                public: Buffer(vec![5, 0, 255, 17]),
                private: Buffer((0u8..=31).collect()),
            },
            history: vec![Buffer(Vec::new()), Buffer(vec![0; 3])],
            extra: Some(HashMap::from([("k".to_string(), Buffer(vec![9, 9]))])),
            missing: None,
        }
    }

    #[test]
    fn buffer_serializes_as_tagged_base64() {
        let text = serialize(&Buffer(vec![1, 2, 3])).unwrap();
        assert_eq!(text, r#"{"type":"Buffer","data":"AQID"}"#);
    }

    #[test]
    fn nested_buffers_round_trip_from_text_and_parsed() {
        let text = serialize(&sample()).unwrap();

        let from_text: Envelope = deserialize(StoredJson::Text(text.clone())).unwrap();
        assert_eq!(from_text, sample());

        let parsed: Value = serde_json::from_str(&text).unwrap();
        let from_parsed: Envelope = deserialize(StoredJson::Parsed(parsed)).unwrap();
        assert_eq!(from_parsed, sample());
    }

    #[test]
    fn null_round_trips() {
        let text = serialize(&Option::<Buffer>::None).unwrap();
        assert_eq!(text, "null");
        let back: Option<Buffer> = deserialize(StoredJson::Text(text)).unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn accepts_node_style_byte_arrays() {
        let value = json!({ "type": "Buffer", "data": [104, 105] });
        let buf: Buffer = deserialize(value.into()).unwrap();
        assert_eq!(buf.as_bytes(), b"hi");
    }

    #[test]
    fn unwraps_double_encoded_values() {
        let inner = serialize(&sample()).unwrap();
        let stored = StoredJson::Parsed(Value::String(inner));
        let back: Envelope = deserialize(stored).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn plain_strings_survive_normalization() {
        let stored = StoredJson::Parsed(Value::String("not json".to_string()));
        let back: String = deserialize(stored).unwrap();
        assert_eq!(back, "not json");
    }

    #[test]
    fn rejects_other_tags_and_bad_base64() {
        let wrong_tag = json!({ "type": "Blob", "data": "AQID" });
        assert!(deserialize::<Buffer>(wrong_tag.into()).is_err());

        let bad = json!({ "type": "Buffer", "data": "***" });
        assert!(deserialize::<Buffer>(bad.into()).is_err());
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(deserialize::<Envelope>(StoredJson::Text("{not json".to_string())).is_err());
    }

    #[test]
    fn loose_buffer_forms() {
        assert_eq!(Buffer::from_loose(&json!("AQID")).unwrap().0, vec![1, 2, 3]);
        assert_eq!(Buffer::from_loose(&json!([1, 2])).unwrap().0, vec![1, 2]);
        assert_eq!(
            Buffer::from_loose(&json!({ "type": "Buffer", "data": "AQ==" }))
                .unwrap()
                .0,
            vec![1]
        );
        assert!(Buffer::from_loose(&json!(42)).is_err());
    }
}
