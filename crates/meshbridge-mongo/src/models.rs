use anyhow::{Context, Result};
use meshbridge_domain::{KpiDocument, SensorRecord, StatusDocument};
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};

/// Database row for a raw sensor record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecordRow {
    pub device_id: String,
    pub payload: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&SensorRecord> for SensorRecordRow {
    fn from(record: &SensorRecord) -> Self {
        Self {
            device_id: record.device_id.clone(),
            payload: record.payload.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Build the BSON document for a KPI insert.
///
/// Payload fields go in first; the injected `device_id` and `timestamp`
/// are written last so they win over identically-named payload fields.
pub fn kpi_bson(document: &KpiDocument) -> Result<Document> {
    let mut doc = fields_to_document(&document.fields)?;
    doc.insert("device_id", document.device_id.clone());
    doc.insert("timestamp", bson::DateTime::from_chrono(document.timestamp));
    Ok(doc)
}

/// Build the BSON document for a status insert.
///
/// The injected `timestamp` overwrites any payload-supplied key.
pub fn status_bson(document: &StatusDocument) -> Result<Document> {
    let mut doc = fields_to_document(&document.fields)?;
    doc.insert("timestamp", bson::DateTime::from_chrono(document.timestamp));
    Ok(doc)
}

fn fields_to_document(fields: &serde_json::Map<String, serde_json::Value>) -> Result<Document> {
    bson::to_document(&serde_json::Value::Object(fields.clone()))
        .context("Failed to convert field map to BSON")
}
