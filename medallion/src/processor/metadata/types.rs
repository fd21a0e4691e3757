use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance record for one write of one layer within a batch.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchMetadata {
    pub batch_id: String,
    pub source: String,
    pub ingestion_time: DateTime<Utc>,
    pub record_count: u64,
    /// Never populated; kept so stored records keep their shape.
    pub checksum: Option<String>,
    pub layer: Layer,
}

impl BatchMetadata {
    pub fn new(batch_id: &str, source: &str, layer: Layer, record_count: u64) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            source: source.to_string(),
            ingestion_time: Utc::now(),
            record_count,
            checksum: None,
            layer,
        }
    }
}
