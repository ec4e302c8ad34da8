use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::Header;
use crate::Spec;
use crate::Status;

//
// Secret Object
const SECRET_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "Secret",
        plural: "secrets",
        singular: "secret",
    },
};

impl Spec for SecretSpec {
    type Status = SecretStatus;
    type Header = SecretHeader;

    fn metadata() -> &'static Crd {
        &SECRET_API
    }
}

#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SecretSpec {}

#[derive(Deserialize, Serialize, Default, Eq, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SecretStatus {}

impl Status for SecretStatus {}

/// secret payload lives at the top level of the object, next to metadata
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretHeader {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(rename = "type", default)]
    pub ty: String,
}

impl Header for SecretHeader {}

impl SecretHeader {
    /// decoded value of `key`; `None` when the key is absent
    pub fn decoded(&self, key: &str) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.data.get(key).map(|value| STANDARD.decode(value.trim()))
    }

    pub fn insert_encoded<K: Into<String>>(&mut self, key: K, value: &[u8]) {
        self.data.insert(key.into(), STANDARD.encode(value));
    }
}
