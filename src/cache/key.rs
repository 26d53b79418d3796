//! Request fingerprinting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The semantically relevant parameters of a guarded request.
///
/// Only `content`, `model`, `temperature`, `prompt_version` and `locale`
/// participate in the fingerprint. `metadata` is for incidental data
/// (request ids, timestamps) and never changes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub content: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub prompt_version: Option<String>,
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = Some(version.into());
        self
    }
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Stable key shared by the response cache and the in-flight registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// First 12 chars, for log lines.
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(12)
            .map_or(self.0.as_str(), |(i, _)| &self.0[..i])
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Derives [`Fingerprint`]s from [`RequestDescriptor`]s.
///
/// The descriptor's semantic fields are written into a sorted map, serialized
/// canonically and hashed with SHA-256, so field order and metadata never
/// influence the result.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    salt: Option<String>,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace keys, e.g. per deployment or per cache schema version.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn fingerprint(&self, request: &RequestDescriptor) -> Fingerprint {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("content", request.content.clone());
        if let Some(ref m) = request.model {
            parts.insert("model", m.clone());
        }
        if let Some(t) = request.temperature {
            // f64 Display is the shortest exact round-trip form
            parts.insert("temperature", t.to_string());
        }
        if let Some(ref v) = request.prompt_version {
            parts.insert("prompt_version", v.clone());
        }
        if let Some(ref l) = request.locale {
            parts.insert("locale", l.clone());
        }
        if let Some(ref s) = self.salt {
            parts.insert("salt", s.clone());
        }
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Fingerprint::new(hash)
    }
}
