use crate::cipher::CipherGateway;
use crate::error::{DomainError, DomainResult};
use crate::fields::coerce_fields;
use crate::repository::RecordRepository;
use crate::topic::{classify_topic, device_id_from_topic, TopicClass};
use crate::types::{IngestEvent, KpiDocument, SensorRecord, StatusDocument, TopicPrefixes};
use std::sync::Arc;
use tracing::{debug, info};

/// Domain service that classifies and persists incoming broker events
///
/// Flow:
/// 1. Decode payload text and extract the device id from the topic
/// 2. Classify the topic by literal prefix (KPI → status → raw)
/// 3. KPI: coerce the delimited payload into a field map
///    Status: parse the payload as a JSON object
///    Raw: optionally run the payload through the cipher gateway
/// 4. Insert the resulting record via the repository trait
///
/// Every error is terminal for that event only: the caller logs it and the
/// event is dropped. There are no retries anywhere in the pipeline.
pub struct IngestService {
    prefixes: TopicPrefixes,
    repository: Arc<dyn RecordRepository>,
    cipher: Option<Arc<dyn CipherGateway>>,
}

impl IngestService {
    /// Create a new IngestService with dependencies. `cipher` is `None`
    /// when the confidentiality transform is disabled.
    pub fn new(
        prefixes: TopicPrefixes,
        repository: Arc<dyn RecordRepository>,
        cipher: Option<Arc<dyn CipherGateway>>,
    ) -> Self {
        Self {
            prefixes,
            repository,
            cipher,
        }
    }

    /// Handle one delivered event: classify, transform, persist
    pub async fn handle_event(&self, event: IngestEvent) -> DomainResult<()> {
        let payload = String::from_utf8_lossy(&event.payload).into_owned();

        info!(
            topic = %event.topic,
            payload = %payload,
            "received message"
        );

        // Always extracted, even on the status path where it is unused
        let device_id = device_id_from_topic(&event.topic).to_string();

        match classify_topic(&self.prefixes, &event.topic) {
            TopicClass::Kpi => {
                self.handle_kpi(device_id, payload, event.received_at).await
            }
            TopicClass::Status => self.handle_status(payload, event.received_at).await,
            TopicClass::Raw => {
                let record = SensorRecord {
                    device_id,
                    payload,
                    timestamp: event.received_at,
                };
                self.handle_raw(record).await
            }
        }
    }

    async fn handle_kpi(
        &self,
        device_id: String,
        payload: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<()> {
        let fields = coerce_fields(&payload);

        debug!(
            device_id = %device_id,
            field_count = fields.len(),
            "coerced KPI payload"
        );

        let document = KpiDocument {
            device_id,
            timestamp,
            fields,
        };
        self.repository.insert_kpi_document(document).await?;

        info!("stored KPI document");
        Ok(())
    }

    async fn handle_status(
        &self,
        payload: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<()> {
        let value: serde_json::Value = serde_json::from_str(&payload)
            .map_err(|e| DomainError::InvalidStatusPayload(e.to_string()))?;

        let fields = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(DomainError::InvalidStatusPayload(format!(
                    "expected a JSON object, got {}",
                    other
                )));
            }
        };

        let document = StatusDocument { timestamp, fields };
        self.repository.insert_status_document(document).await?;

        info!("stored status document");
        Ok(())
    }

    async fn handle_raw(&self, mut record: SensorRecord) -> DomainResult<()> {
        // Fail closed: any cipher error drops the event before persistence
        if let Some(cipher) = &self.cipher {
            record.payload = cipher.encrypt(&record.payload).await?;
            debug!(device_id = %record.device_id, "payload encrypted");
        }

        self.repository.insert_sensor_record(record).await?;

        info!("stored sensor record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::MockCipherGateway;
    use crate::repository::MockRecordRepository;
    use serde_json::Value;

    fn event(topic: &str, payload: &str) -> IngestEvent {
        IngestEvent {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
            received_at: chrono::Utc::now(),
        }
    }

    fn service(
        repository: MockRecordRepository,
        cipher: Option<MockCipherGateway>,
    ) -> IngestService {
        IngestService::new(
            TopicPrefixes::default(),
            Arc::new(repository),
            cipher.map(|c| Arc::new(c) as Arc<dyn CipherGateway>),
        )
    }

    #[tokio::test]
    async fn test_kpi_event_coerces_fields_and_injects_identity() {
        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_kpi_document()
            .withf(|doc: &KpiDocument| {
                doc.device_id == "sensor42"
                    && doc.fields["temp"] == Value::from(21)
                    && doc.fields["humidity"] == Value::from(58)
                    && !doc.fields.contains_key("broken")
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, None);
        let result = service
            .handle_event(event("mesh/kpi/sensor42", "temp=21;humidity=58;broken"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_kpi_payload_cannot_override_injected_identity() {
        let sent = event("mesh/kpi/sensor42", "device_id=spoofed;timestamp=0");
        let expected_timestamp = sent.received_at;

        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_kpi_document()
            .withf(move |doc: &KpiDocument| {
                doc.device_id == "sensor42" && doc.timestamp == expected_timestamp
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, None);
        assert!(service.handle_event(sent).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_event_parses_json_object() {
        let sent = event("mesh/status/sensor42", r#"{"x":1}"#);
        let expected_timestamp = sent.received_at;

        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_status_document()
            .withf(move |doc: &StatusDocument| {
                doc.fields["x"] == Value::from(1) && doc.timestamp == expected_timestamp
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, None);
        assert!(service.handle_event(sent).await.is_ok());
    }

    #[tokio::test]
    async fn test_status_event_with_invalid_json_is_dropped() {
        let mut repository = MockRecordRepository::new();
        repository.expect_insert_status_document().times(0);

        let service = service(repository, None);
        let result = service
            .handle_event(event("mesh/status/sensor42", "not json"))
            .await;

        assert!(matches!(result, Err(DomainError::InvalidStatusPayload(_))));
    }

    #[tokio::test]
    async fn test_status_event_with_non_object_json_is_dropped() {
        let mut repository = MockRecordRepository::new();
        repository.expect_insert_status_document().times(0);

        let service = service(repository, None);
        let result = service
            .handle_event(event("mesh/status/sensor42", "[1,2]"))
            .await;

        assert!(matches!(result, Err(DomainError::InvalidStatusPayload(_))));
    }

    #[tokio::test]
    async fn test_raw_event_without_cipher_persists_payload_unchanged() {
        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_sensor_record()
            .withf(|record: &SensorRecord| {
                record.device_id == "sensor42" && record.payload == "raw reading"
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, None);
        let result = service
            .handle_event(event("mesh/data/sensor42", "raw reading"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_raw_event_with_cipher_substitutes_payload() {
        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_sensor_record()
            .withf(|record: &SensorRecord| record.payload == "ciphertext")
            .times(1)
            .returning(|_| Ok(()));

        let mut cipher = MockCipherGateway::new();
        cipher
            .expect_encrypt()
            .withf(|text: &str| text == "raw reading")
            .times(1)
            .returning(|_| Ok("ciphertext".to_string()));

        let service = service(repository, Some(cipher));
        let result = service
            .handle_event(event("mesh/data/sensor42", "raw reading"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_raw_event_with_failing_cipher_is_dropped() {
        let mut repository = MockRecordRepository::new();
        repository.expect_insert_sensor_record().times(0);

        let mut cipher = MockCipherGateway::new();
        cipher
            .expect_encrypt()
            .times(1)
            .returning(|_| Err(DomainError::CipherTransformFailed("down".to_string())));

        let service = service(repository, Some(cipher));
        let result = service
            .handle_event(event("mesh/data/sensor42", "raw reading"))
            .await;

        assert!(matches!(result, Err(DomainError::CipherTransformFailed(_))));
    }

    #[tokio::test]
    async fn test_cipher_is_never_invoked_for_kpi_events() {
        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_kpi_document()
            .times(1)
            .returning(|_| Ok(()));

        let mut cipher = MockCipherGateway::new();
        cipher.expect_encrypt().times(0);

        let service = service(repository, Some(cipher));
        assert!(service
            .handle_event(event("mesh/kpi/sensor42", "temp=21"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_repository_failure_surfaces_as_error() {
        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_sensor_record()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("timed out"))));

        let service = service(repository, None);
        let result = service
            .handle_event(event("mesh/data/sensor42", "raw reading"))
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_topic_without_separator_uses_whole_topic_as_device_id() {
        let mut repository = MockRecordRepository::new();
        repository
            .expect_insert_sensor_record()
            .withf(|record: &SensorRecord| record.device_id == "standalone")
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, None);
        assert!(service
            .handle_event(event("standalone", "reading"))
            .await
            .is_ok());
    }
}
