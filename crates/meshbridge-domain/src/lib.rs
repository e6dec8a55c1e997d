pub mod cipher;
pub mod error;
pub mod fields;
pub mod ingest_service;
pub mod repository;
pub mod topic;
pub mod types;

pub use cipher::CipherGateway;
pub use error::{DomainError, DomainResult};
pub use fields::coerce_fields;
pub use ingest_service::IngestService;
pub use repository::RecordRepository;
pub use topic::{classify_topic, device_id_from_topic, TopicClass};
pub use types::*;
