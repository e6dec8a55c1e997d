pub mod client;
pub mod config;
pub mod models;
pub mod record_repository;

pub use client::MongoClient;
pub use config::MongoConfig;
pub use record_repository::MongoRecordRepository;
