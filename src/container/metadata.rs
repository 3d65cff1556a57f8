//! Typed container metadata.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Metadata key for the executor-reported runtime, in seconds.
pub const RUNTIME_SECONDS: &str = "runtime_seconds";

/// A value in the extension map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Well-known keys are typed fields; task-specific extras live in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Runtime reported by the executor (`runtime_seconds`).
    #[serde(
        rename = "runtime_seconds",
        default,
        skip_serializing_if = "Option::is_none",
        with = "runtime_secs"
    )]
    pub runtime: Option<Duration>,
    /// Task-type-specific values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetadataValue>,
}

impl ContainerMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Insert an extension value. `runtime_seconds` is routed to the typed field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let key = key.into();
        let value = value.into();
        if key == RUNTIME_SECONDS {
            if let Some(runtime) = as_runtime(&value) {
                self.runtime = Some(runtime);
            }
            return;
        }
        self.extra.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.extra.get(key)
    }

    pub fn runtime_seconds(&self) -> Option<f64> {
        self.runtime.map(|d| d.as_secs_f64())
    }
}

/// Negative, non-finite and out-of-range values yield `None`.
fn as_runtime(value: &MetadataValue) -> Option<Duration> {
    let secs: f64 = match value {
        MetadataValue::Integer(i) => *i as f64,
        MetadataValue::Float(f) => *f,
        MetadataValue::Text(s) => s.trim().parse().ok()?,
        MetadataValue::Flag(_) => return None,
    };
    Duration::try_from_secs_f64(secs).ok()
}

mod runtime_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let Some(secs) = Option::<f64>::deserialize(d)? else {
            return Ok(None);
        };
        Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
            serde::de::Error::custom(format!("invalid runtime_seconds {secs}: {e}"))
        })
    }
}
