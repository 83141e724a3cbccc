//! Byte arrays as JSON number arrays
//!
//! `Vec<u8>` already serializes as `[1,2,3]`. Decoding additionally accepts
//! the Node `Buffer#toJSON()` shape `{"type":"Buffer","data":[1,2,3]}`, which
//! browser clients of this protocol have historically sent.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Plain(Vec<u8>),
    Buffer {
        #[serde(rename = "type")]
        kind: String,
        data: Vec<u8>,
    },
}

impl Repr {
    fn into_bytes<E: serde::de::Error>(self) -> Result<Vec<u8>, E> {
        match self {
            Repr::Plain(bytes) => Ok(bytes),
            Repr::Buffer { kind, data } if kind == "Buffer" => Ok(data),
            Repr::Buffer { kind, .. } => Err(E::custom(format!(
                "unsupported byte container type {kind:?}"
            ))),
        }
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Repr::deserialize(deserializer)?.into_bytes()
}

/// Like [`deserialize`] but tolerates an absent or `null` field.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Repr>::deserialize(deserializer)?
        .map(Repr::into_bytes)
        .transpose()
}
