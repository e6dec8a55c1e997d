/// A single message delivered by the broker, captured at the moment the
/// publish packet arrives. Consumed exactly once by the ingest service.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestEvent {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

/// Canonical raw-record shape for the data collection
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub device_id: String,
    pub payload: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Open field set parsed from a KPI payload, plus the injected identity.
/// The injected `device_id`/`timestamp` win over identically-named payload
/// fields when the document is serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiDocument {
    pub device_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Status payload parsed as a JSON object. The injected `timestamp`
/// overwrites any payload-supplied `timestamp` key when serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDocument {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Topic prefixes used for classification and broker subscription
#[derive(Debug, Clone, PartialEq)]
pub struct TopicPrefixes {
    pub data: String,
    pub kpi: String,
    pub status: String,
}

impl Default for TopicPrefixes {
    fn default() -> Self {
        Self {
            data: "mesh/data/".to_string(),
            kpi: "mesh/kpi/".to_string(),
            status: "mesh/status/".to_string(),
        }
    }
}
