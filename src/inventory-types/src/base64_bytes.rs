//! serde helpers for byte fields carried as base64 strings in API objects

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serializer;

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded.trim()).map_err(D::Error::custom)
}

/// same as the parent module for `Option<Vec<u8>>`
pub mod option {
    use super::*;

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) if !encoded.is_empty() => STANDARD
                .decode(encoded.trim())
                .map(Some)
                .map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {

    use serde::Deserialize;
    use serde::Serialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Holder {
        #[serde(default, with = "super::option", skip_serializing_if = "Option::is_none")]
        ca: Option<Vec<u8>>,
    }

    #[test]
    fn test_optional_bytes() {
        let holder: Holder = serde_json::from_str(r#"{"ca":"Y2EtYnl0ZXM="}"#).expect("decode");
        assert_eq!(holder.ca.as_deref(), Some(&b"ca-bytes"[..]));

        let empty: Holder = serde_json::from_str("{}").expect("decode");
        assert_eq!(empty.ca, None);
        assert_eq!(serde_json::to_string(&empty).expect("encode"), "{}");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(serde_json::from_str::<Holder>(r#"{"ca":"***"}"#).is_err());
    }
}
