use crate::client::MongoClient;
use crate::config::MongoConfig;
use crate::models::{kpi_bson, status_bson, SensorRecordRow};
use anyhow::anyhow;
use async_trait::async_trait;
use meshbridge_domain::{
    DomainError, DomainResult, KpiDocument, RecordRepository, SensorRecord, StatusDocument,
};
use mongodb::bson::Document;
use mongodb::Collection;
use std::time::Duration;
use tracing::{debug, error};

const KPI_COLLECTION: &str = "kpis";
const STATUS_COLLECTION: &str = "status";

/// MongoDB implementation of RecordRepository.
///
/// Each insert runs under its own timeout, measured from the call. A
/// timeout or driver error fails only that insert; the caller drops the
/// inciting event without retrying.
#[derive(Clone)]
pub struct MongoRecordRepository {
    data: Collection<SensorRecordRow>,
    kpis: Collection<Document>,
    status: Collection<Document>,
    insert_timeout: Duration,
}

impl MongoRecordRepository {
    pub fn new(client: &MongoClient, config: &MongoConfig) -> Self {
        let database = client.database();
        Self {
            data: database.collection(&config.data_collection),
            kpis: database.collection(KPI_COLLECTION),
            status: database.collection(STATUS_COLLECTION),
            insert_timeout: Duration::from_secs(config.insert_timeout_secs),
        }
    }

    async fn insert<T>(&self, collection: &Collection<T>, document: T) -> DomainResult<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        let name = collection.name().to_string();

        match tokio::time::timeout(self.insert_timeout, collection.insert_one(document, None))
            .await
        {
            Ok(Ok(_)) => {
                debug!(collection = %name, "document stored");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(collection = %name, error = %e, "insert failed");
                Err(DomainError::RepositoryError(e.into()))
            }
            Err(_) => {
                error!(
                    collection = %name,
                    timeout_ms = self.insert_timeout.as_millis(),
                    "insert timed out"
                );
                Err(DomainError::RepositoryError(anyhow!(
                    "insert into '{}' timed out after {:?}",
                    name,
                    self.insert_timeout
                )))
            }
        }
    }
}

#[async_trait]
impl RecordRepository for MongoRecordRepository {
    async fn insert_sensor_record(&self, record: SensorRecord) -> DomainResult<()> {
        let row = SensorRecordRow::from(&record);
        self.insert(&self.data, row).await
    }

    async fn insert_kpi_document(&self, document: KpiDocument) -> DomainResult<()> {
        let doc = kpi_bson(&document).map_err(DomainError::RepositoryError)?;
        self.insert(&self.kpis, doc).await
    }

    async fn insert_status_document(&self, document: StatusDocument) -> DomainResult<()> {
        let doc = status_bson(&document).map_err(DomainError::RepositoryError)?;
        self.insert(&self.status, doc).await
    }
}
