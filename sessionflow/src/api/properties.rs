use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::num::ParseIntError;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::api::backend::KeyedStateBackend;
use crate::api::config::{LateDataPolicy, WatermarkScope};

pub const WINDOW_GAP_MS: &str = "window.gap.ms";
pub const WINDOW_ALLOWED_LATENESS_MS: &str = "window.allowed_lateness.ms";
pub const WINDOW_LATE_DATA_POLICY: &str = "window.late_data_policy";
pub const WINDOW_CORRECTION_RETENTION_MS: &str = "window.correction_retention.ms";
pub const WATERMARK_SCOPE: &str = "watermark.scope";
pub const KEYED_STATE_BACKEND: &str = "state.keyed_backend";
pub const RUNTIME_PARTITIONS: &str = "runtime.partitions";
pub const RUNTIME_CHANNEL_CAPACITY: &str = "runtime.channel_capacity";
pub const RUNTIME_MAX_PARTITION_RESTARTS: &str = "runtime.max_partition_restarts";

/// Typed access to the windowing and runtime settings stored in `Properties`.
pub trait WindowProperties {
    fn set_gap(&mut self, gap: Duration);
    fn get_gap(&self) -> Result<Duration, PropertiesError>;

    fn set_allowed_lateness(&mut self, lateness: Duration);
    fn get_allowed_lateness(&self) -> Result<Duration, PropertiesError>;

    fn set_late_data_policy(&mut self, policy: LateDataPolicy);
    fn get_late_data_policy(&self) -> Result<LateDataPolicy, PropertiesError>;

    fn set_correction_retention(&mut self, retention: Duration);
    fn get_correction_retention(&self) -> Result<Duration, PropertiesError>;

    fn set_watermark_scope(&mut self, scope: WatermarkScope);
    fn get_watermark_scope(&self) -> Result<WatermarkScope, PropertiesError>;

    fn set_keyed_state_backend(&mut self, backend: KeyedStateBackend);
    fn get_keyed_state_backend(&self) -> Result<KeyedStateBackend, PropertiesError>;

    fn set_partitions(&mut self, partitions: u16);
    fn get_partitions(&self) -> Result<u16, PropertiesError>;

    fn set_channel_capacity(&mut self, capacity: usize);
    fn get_channel_capacity(&self) -> Result<usize, PropertiesError>;

    fn set_max_partition_restarts(&mut self, restarts: u32);
    fn get_max_partition_restarts(&self) -> Result<u32, PropertiesError>;
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Properties {
    properties: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Properties {
            properties: HashMap::new(),
        }
    }

    /// Collects `key=value` arguments, ignoring anything else.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut properties = Properties::new();
        for arg in args {
            if let Some((key, value)) = arg.as_ref().split_once('=') {
                let key = key.trim_start_matches('-');
                if !key.is_empty() {
                    properties.set_str(key, value);
                }
            }
        }
        properties
    }

    /// Parses a flat YAML mapping. Scalar values of any type are kept as strings.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PropertiesError> {
        let map: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml)?;

        let mut properties = Properties::new();
        for (key, value) in map {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(PropertiesError::InvalidValue {
                        key,
                        value: format!("{:?}", other),
                    })
                }
            };
            properties.set_string(key, value);
        }
        Ok(properties)
    }

    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self, PropertiesError> {
        let mut file = File::open(path)?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        Properties::from_yaml_str(buffer.as_str())
    }

    /// Later values win.
    pub fn extend(&mut self, other: Properties) {
        self.properties.extend(other.properties);
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn to_json(&self) -> Result<String, PropertiesError> {
        serde_json::to_string(self).map_err(PropertiesError::from)
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    pub fn set_string(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    pub fn get_string(&self, key: &str) -> Result<String, PropertiesError> {
        match self.properties.get(key) {
            Some(v) => Ok(v.clone()),
            None => Err(PropertiesError::None(key.to_string())),
        }
    }

    pub fn set_u32(&mut self, key: &str, value: u32) {
        self.set_string(key.to_string(), value.to_string());
    }

    pub fn get_u32(&self, key: &str) -> Result<u32, PropertiesError> {
        let v = self.get_string(key)?;
        u32::from_str(v.as_str()).map_err(PropertiesError::from)
    }

    pub fn set_u64(&mut self, key: &str, value: u64) {
        self.set_string(key.to_string(), value.to_string());
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, PropertiesError> {
        let v = self.get_string(key)?;
        u64::from_str(v.as_str()).map_err(PropertiesError::from)
    }

    pub fn set_duration(&mut self, key: &str, value: Duration) {
        self.set_u64(key, value.as_millis() as u64);
    }

    pub fn get_duration(&self, key: &str) -> Result<Duration, PropertiesError> {
        self.get_u64(key).map(Duration::from_millis)
    }

    fn get_parsed<T>(&self, key: &str) -> Result<T, PropertiesError>
    where
        T: FromStr<Err = anyhow::Error>,
    {
        let value = self.get_string(key)?;
        T::from_str(value.as_str()).map_err(|_e| PropertiesError::InvalidValue {
            key: key.to_string(),
            value,
        })
    }
}

impl WindowProperties for Properties {
    fn set_gap(&mut self, gap: Duration) {
        self.set_duration(WINDOW_GAP_MS, gap)
    }

    fn get_gap(&self) -> Result<Duration, PropertiesError> {
        self.get_duration(WINDOW_GAP_MS)
    }

    fn set_allowed_lateness(&mut self, lateness: Duration) {
        self.set_duration(WINDOW_ALLOWED_LATENESS_MS, lateness)
    }

    fn get_allowed_lateness(&self) -> Result<Duration, PropertiesError> {
        self.get_duration(WINDOW_ALLOWED_LATENESS_MS)
    }

    fn set_late_data_policy(&mut self, policy: LateDataPolicy) {
        self.set_string(WINDOW_LATE_DATA_POLICY.to_string(), policy.to_string())
    }

    fn get_late_data_policy(&self) -> Result<LateDataPolicy, PropertiesError> {
        self.get_parsed(WINDOW_LATE_DATA_POLICY)
    }

    fn set_correction_retention(&mut self, retention: Duration) {
        self.set_duration(WINDOW_CORRECTION_RETENTION_MS, retention)
    }

    fn get_correction_retention(&self) -> Result<Duration, PropertiesError> {
        self.get_duration(WINDOW_CORRECTION_RETENTION_MS)
    }

    fn set_watermark_scope(&mut self, scope: WatermarkScope) {
        self.set_string(WATERMARK_SCOPE.to_string(), scope.to_string())
    }

    fn get_watermark_scope(&self) -> Result<WatermarkScope, PropertiesError> {
        self.get_parsed(WATERMARK_SCOPE)
    }

    fn set_keyed_state_backend(&mut self, backend: KeyedStateBackend) {
        self.set_string(KEYED_STATE_BACKEND.to_string(), backend.to_string())
    }

    fn get_keyed_state_backend(&self) -> Result<KeyedStateBackend, PropertiesError> {
        self.get_parsed(KEYED_STATE_BACKEND)
    }

    fn set_partitions(&mut self, partitions: u16) {
        self.set_u32(RUNTIME_PARTITIONS, partitions as u32)
    }

    fn get_partitions(&self) -> Result<u16, PropertiesError> {
        let v = self.get_string(RUNTIME_PARTITIONS)?;
        u16::from_str(v.as_str()).map_err(PropertiesError::from)
    }

    fn set_channel_capacity(&mut self, capacity: usize) {
        self.set_u64(RUNTIME_CHANNEL_CAPACITY, capacity as u64)
    }

    fn get_channel_capacity(&self) -> Result<usize, PropertiesError> {
        self.get_u64(RUNTIME_CHANNEL_CAPACITY).map(|v| v as usize)
    }

    fn set_max_partition_restarts(&mut self, restarts: u32) {
        self.set_u32(RUNTIME_MAX_PARTITION_RESTARTS, restarts)
    }

    fn get_max_partition_restarts(&self) -> Result<u32, PropertiesError> {
        self.get_u32(RUNTIME_MAX_PARTITION_RESTARTS)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PropertiesError {
    #[error("property `{0}` not found")]
    None(String),
    #[error("invalid value `{value}` for property `{key}`")]
    InvalidValue { key: String, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ParseIntError error: {0}")]
    ParseIntError(#[from] ParseIntError),
    #[error("JsonParseError error: {0}")]
    JsonParseError(#[from] serde_json::Error),
    #[error("YamlParseError error: {0}")]
    YamlParseError(#[from] serde_yaml::Error),
}

impl PropertiesError {
    pub fn is_none(&self) -> bool {
        matches!(self, PropertiesError::None(_))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::api::config::LateDataPolicy;
    use crate::api::properties::{Properties, PropertiesError, WindowProperties, WINDOW_GAP_MS};

    #[test]
    pub fn window_properties_test() {
        let mut properties = Properties::new();
        properties.set_gap(Duration::from_secs(120));
        properties.set_late_data_policy(LateDataPolicy::Discard);

        assert_eq!(properties.get_gap().unwrap(), Duration::from_secs(120));
        assert_eq!(
            properties.get_string(WINDOW_GAP_MS).unwrap(),
            "120000".to_string()
        );
        assert_eq!(
            properties.get_late_data_policy().unwrap(),
            LateDataPolicy::Discard
        );
        assert!(properties.get_allowed_lateness().unwrap_err().is_none());
    }

    #[test]
    pub fn from_args_test() {
        let properties = Properties::from_args(vec![
            "example-session",
            "window.gap.ms=120000",
            "--window.late_data_policy=emit-correction",
            "noise",
        ]);
        assert_eq!(properties.as_map().len(), 2);
        assert_eq!(properties.get_gap().unwrap(), Duration::from_secs(120));
        assert_eq!(
            properties.get_late_data_policy().unwrap(),
            LateDataPolicy::EmitCorrection
        );
    }

    #[test]
    pub fn from_yaml_test() {
        let yaml = "window.gap.ms: 120000\nwindow.late_data_policy: discard\nruntime.partitions: 4\n";
        let properties = Properties::from_yaml_str(yaml).unwrap();
        assert_eq!(properties.get_gap().unwrap(), Duration::from_secs(120));
        assert_eq!(properties.get_partitions().unwrap(), 4);

        let err = Properties::from_yaml_str("window.gap.ms: [1, 2]").unwrap_err();
        assert!(matches!(err, PropertiesError::InvalidValue { .. }));
    }

    #[test]
    pub fn invalid_policy_test() {
        let properties = Properties::from_args(vec!["window.late_data_policy=keep"]);
        let err = properties.get_late_data_policy().unwrap_err();
        assert!(matches!(err, PropertiesError::InvalidValue { .. }));
    }
}
