use crate::config::MongoConfig;
use anyhow::{Context, Result};
use mongodb::bson::doc;
use mongodb::options::{Acknowledgment, ClientOptions, WriteConcern};
use mongodb::Database;
use std::time::Duration;
use tracing::info;

/// Wrapper around the MongoDB driver holding the connected database handle.
///
/// Connecting applies a majority write concern, so an insert is only
/// acknowledged once a quorum of replicas has it, and a bounded
/// server-selection timeout. A `ping` command forces a round trip at
/// bootstrap; callers treat any failure here as fatal.
#[derive(Clone)]
pub struct MongoClient {
    database: Database,
}

impl MongoClient {
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            timeout_ms = timeout.as_millis(),
            "Connecting to MongoDB"
        );

        let mut options = ClientOptions::parse(config.uri())
            .await
            .context("Failed to parse MongoDB connection options")?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.write_concern = Some(WriteConcern::builder().w(Acknowledgment::Majority).build());

        let client = mongodb::Client::with_options(options)
            .context("Failed to create MongoDB client")?;
        let database = client.database(&config.database);

        Ok(Self { database })
    }

    /// Round trip to the server; fails when it is unreachable within the
    /// configured server-selection timeout
    pub async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context("Failed to ping MongoDB")?;
        Ok(())
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}
