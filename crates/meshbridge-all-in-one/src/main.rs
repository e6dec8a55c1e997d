mod config;

use crate::config::ServiceConfig;
use meshbridge_cipher::HttpCipherGateway;
use meshbridge_domain::{CipherGateway, IngestService};
use meshbridge_mongo::{MongoClient, MongoRecordRepository};
use meshbridge_mqtt::run_mqtt_subscriber;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting meshbridge service");
    debug!("Configuration: {:?}", config);

    // Store connection is established once at bootstrap; failure is fatal
    let mongo_client = match MongoClient::connect(&config.mongo_config()).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to MongoDB: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = mongo_client.ping().await {
        error!("MongoDB is unreachable: {:#}", e);
        std::process::exit(1);
    }
    info!(
        database = %config.mongo_database,
        "Connected to MongoDB with majority write concern"
    );

    let repository = Arc::new(MongoRecordRepository::new(
        &mongo_client,
        &config.mongo_config(),
    ));

    let cipher_config = config.cipher_config();
    let cipher: Option<Arc<dyn CipherGateway>> = if cipher_config.enabled {
        match HttpCipherGateway::new(&cipher_config) {
            Ok(gateway) => {
                info!(
                    endpoint_configured = cipher_config.endpoint.is_some(),
                    "Confidentiality transform enabled"
                );
                Some(Arc::new(gateway))
            }
            Err(e) => {
                error!("Failed to build cipher gateway: {:#}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let service = Arc::new(IngestService::new(
        config.topic_prefixes(),
        repository,
        cipher,
    ));

    let shutdown_token = CancellationToken::new();
    let mut subscriber = tokio::spawn(run_mqtt_subscriber(
        config.mqtt_config(),
        config.topic_prefixes(),
        shutdown_token.clone(),
        service,
    ));

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            shutdown_token.cancel();
        }
        result = &mut subscriber => {
            match result {
                Ok(Ok(())) => error!("MQTT subscriber stopped unexpectedly"),
                Ok(Err(e)) => error!("MQTT subscriber failed: {:#}", e),
                Err(e) => error!("MQTT subscriber panicked: {}", e),
            }
            std::process::exit(1);
        }
    }

    // Bounded wait for the subscriber to disconnect; in-flight message
    // tasks are abandoned
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, subscriber).await {
        Ok(_) => info!("Application exiting normally"),
        Err(_) => error!("Shutdown timed out after {:?}", SHUTDOWN_TIMEOUT),
    }
    std::process::exit(0);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Error setting up signal handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => error!("Error setting up SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
