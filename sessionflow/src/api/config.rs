use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use crate::api::backend::KeyedStateBackend;
use crate::api::properties::{Properties, PropertiesError, WindowProperties};
use crate::api::Error;

/// What happens to an element whose merged window already lies behind the watermark.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LateDataPolicy {
    /// Drop it and count it in `dropped_late`.
    Discard,
    /// Accept it, reopen or extend the window and emit it again flagged as late.
    EmitCorrection,
}

impl Default for LateDataPolicy {
    fn default() -> Self {
        LateDataPolicy::EmitCorrection
    }
}

impl Display for LateDataPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LateDataPolicy::Discard => write!(f, "discard"),
            LateDataPolicy::EmitCorrection => write!(f, "emit-correction"),
        }
    }
}

impl FromStr for LateDataPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discard" => Ok(LateDataPolicy::Discard),
            "emit-correction" | "emit_correction" => Ok(LateDataPolicy::EmitCorrection),
            _ => Err(anyhow!("Unsupported late data policy {}", s)),
        }
    }
}

/// Whether partitions share one watermark or each track their own.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkScope {
    Partition,
    Global,
}

impl Default for WatermarkScope {
    fn default() -> Self {
        WatermarkScope::Partition
    }
}

impl Display for WatermarkScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WatermarkScope::Partition => write!(f, "partition"),
            WatermarkScope::Global => write!(f, "global"),
        }
    }
}

impl FromStr for WatermarkScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "partition" => Ok(WatermarkScope::Partition),
            "global" => Ok(WatermarkScope::Global),
            _ => Err(anyhow!("Unsupported watermark scope {}", s)),
        }
    }
}

/// Windowing configuration, fixed at engine construction.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct WindowingConfig {
    gap: Duration,
    allowed_lateness: Duration,
    late_data_policy: LateDataPolicy,
    /// How long past its end a closed window stays correctable. Defaults to the gap.
    correction_retention: Duration,
    watermark_scope: WatermarkScope,
    keyed_state_backend: KeyedStateBackend,
}

impl WindowingConfig {
    pub fn new(gap: Duration) -> Self {
        WindowingConfig {
            gap,
            allowed_lateness: Duration::ZERO,
            late_data_policy: LateDataPolicy::default(),
            correction_retention: gap,
            watermark_scope: WatermarkScope::default(),
            keyed_state_backend: KeyedStateBackend::default(),
        }
    }

    pub fn with_allowed_lateness(mut self, allowed_lateness: Duration) -> Self {
        self.allowed_lateness = allowed_lateness;
        self
    }

    pub fn with_late_data_policy(mut self, late_data_policy: LateDataPolicy) -> Self {
        self.late_data_policy = late_data_policy;
        self
    }

    pub fn with_correction_retention(mut self, correction_retention: Duration) -> Self {
        self.correction_retention = correction_retention;
        self
    }

    pub fn with_watermark_scope(mut self, watermark_scope: WatermarkScope) -> Self {
        self.watermark_scope = watermark_scope;
        self
    }

    pub fn with_keyed_state_backend(mut self, keyed_state_backend: KeyedStateBackend) -> Self {
        self.keyed_state_backend = keyed_state_backend;
        self
    }

    pub fn validate(self) -> Result<Self, Error> {
        if self.gap_millis() == 0 {
            return Err(Error::config("session gap must be at least one millisecond"));
        }
        Ok(self)
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    pub fn gap_millis(&self) -> u64 {
        self.gap.as_millis() as u64
    }

    pub fn allowed_lateness(&self) -> Duration {
        self.allowed_lateness
    }

    pub fn allowed_lateness_millis(&self) -> u64 {
        self.allowed_lateness.as_millis() as u64
    }

    pub fn late_data_policy(&self) -> LateDataPolicy {
        self.late_data_policy
    }

    pub fn correction_retention_millis(&self) -> u64 {
        self.correction_retention.as_millis() as u64
    }

    pub fn watermark_scope(&self) -> WatermarkScope {
        self.watermark_scope
    }

    pub fn keyed_state_backend(&self) -> KeyedStateBackend {
        self.keyed_state_backend
    }
}

impl<'a> TryFrom<&'a Properties> for WindowingConfig {
    type Error = Error;

    fn try_from(properties: &'a Properties) -> Result<Self, Self::Error> {
        let gap = properties
            .get_gap()
            .map_err(|e| Error::config(format!("session gap is required. {}", e)))?;

        let mut config = WindowingConfig::new(gap);
        if let Some(lateness) = optional(properties.get_allowed_lateness())? {
            config = config.with_allowed_lateness(lateness);
        }
        if let Some(policy) = optional(properties.get_late_data_policy())? {
            config = config.with_late_data_policy(policy);
        }
        if let Some(retention) = optional(properties.get_correction_retention())? {
            config = config.with_correction_retention(retention);
        }
        if let Some(scope) = optional(properties.get_watermark_scope())? {
            config = config.with_watermark_scope(scope);
        }
        if let Some(backend) = optional(properties.get_keyed_state_backend())? {
            config = config.with_keyed_state_backend(backend);
        }

        config.validate()
    }
}

/// Settings of the partitioned runtime.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub partitions: u16,
    pub channel_capacity: usize,
    pub max_partition_restarts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            partitions: num_cpus::get().clamp(1, u16::MAX as usize) as u16,
            channel_capacity: 1024,
            max_partition_restarts: 3,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(self) -> Result<Self, Error> {
        if self.partitions == 0 {
            return Err(Error::config("at least one partition is required"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::config("channel capacity must be positive"));
        }
        Ok(self)
    }
}

impl<'a> TryFrom<&'a Properties> for RuntimeConfig {
    type Error = Error;

    fn try_from(properties: &'a Properties) -> Result<Self, Self::Error> {
        let mut config = RuntimeConfig::default();
        if let Some(partitions) = optional(properties.get_partitions())? {
            config.partitions = partitions;
        }
        if let Some(capacity) = optional(properties.get_channel_capacity())? {
            config.channel_capacity = capacity;
        }
        if let Some(restarts) = optional(properties.get_max_partition_restarts())? {
            config.max_partition_restarts = restarts;
        }
        config.validate()
    }
}

/// A missing property falls back to the default, a malformed one is an error.
fn optional<T>(value: Result<T, PropertiesError>) -> Result<Option<T>, Error> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_none() => Ok(None),
        Err(e) => Err(Error::from(e)),
    }
}
