use crate::error::DomainResult;
use crate::types::{KpiDocument, SensorRecord, StatusDocument};
use async_trait::async_trait;

/// Repository trait for the three record collections.
/// Infrastructure layer (meshbridge-mongo) implements this trait.
///
/// Each insert is independent: there is no transactional grouping across
/// collections and no idempotency key, so re-delivery of the same broker
/// message produces a duplicate document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Insert a raw sensor record into the data collection
    async fn insert_sensor_record(&self, record: SensorRecord) -> DomainResult<()>;

    /// Insert a coerced KPI document into the kpis collection
    async fn insert_kpi_document(&self, document: KpiDocument) -> DomainResult<()>;

    /// Insert a parsed status document into the status collection
    async fn insert_status_document(&self, document: StatusDocument) -> DomainResult<()>;
}
