use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", content = "param")]
pub enum KeyedStateBackend {
    Memory,
}

impl Default for KeyedStateBackend {
    fn default() -> Self {
        KeyedStateBackend::Memory
    }
}

impl Display for KeyedStateBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyedStateBackend::Memory => write!(f, "Memory"),
        }
    }
}

impl FromStr for KeyedStateBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(KeyedStateBackend::Memory),
            _ => Err(anyhow!("Unsupported keyed state backend {}", s)),
        }
    }
}
