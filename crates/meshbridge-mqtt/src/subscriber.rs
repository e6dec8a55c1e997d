use crate::config::MqttConfig;
use anyhow::{anyhow, Result};
use meshbridge_domain::{IngestEvent, IngestService, TopicPrefixes};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeFilter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Run the MQTT subscriber until shutdown.
///
/// Subscribes to `{prefix}#` for the data, KPI and status prefixes and
/// spawns one task per delivered message. Connection errors are retried
/// with a fixed delay up to the configured attempt count; exhausting the
/// attempts is an error the caller treats as fatal.
pub async fn run_mqtt_subscriber(
    config: MqttConfig,
    prefixes: TopicPrefixes,
    shutdown_token: CancellationToken,
    service: Arc<IngestService>,
) -> Result<()> {
    info!(
        broker_host = %config.broker_host,
        broker_port = config.broker_port,
        client_id = %config.client_id,
        "starting MQTT subscriber"
    );

    let mut retry_count = 0;

    loop {
        if shutdown_token.is_cancelled() {
            debug!("MQTT subscriber cancelled before connection");
            break;
        }

        match run_mqtt_connection(&config, &prefixes, &shutdown_token, Arc::clone(&service)).await
        {
            Ok(()) => {
                debug!("MQTT subscriber stopped cleanly");
                break;
            }
            Err(e) => {
                error!(error = %e, "MQTT connection error");

                retry_count += 1;
                if retry_count >= config.max_retry_attempts {
                    error!(
                        max_retries = config.max_retry_attempts,
                        "max retry attempts reached, stopping MQTT subscriber"
                    );
                    return Err(anyhow!(
                        "MQTT connection failed after {} attempts: {}",
                        retry_count,
                        e
                    ));
                }

                warn!(
                    attempt = retry_count,
                    max_attempts = config.max_retry_attempts,
                    "retrying MQTT connection"
                );

                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    _ = tokio::time::sleep(config.retry_delay()) => {}
                }
            }
        }
    }

    info!("MQTT subscriber stopped");
    Ok(())
}

/// Run a single MQTT connection session
async fn run_mqtt_connection(
    config: &MqttConfig,
    prefixes: &TopicPrefixes,
    shutdown_token: &CancellationToken,
    service: Arc<IngestService>,
) -> Result<()> {
    let mut mqtt_options = MqttOptions::new(
        &config.client_id,
        &config.broker_host,
        config.broker_port,
    );
    mqtt_options.set_keep_alive(config.keep_alive());
    mqtt_options.set_clean_session(true);
    if let Some(username) = &config.username {
        mqtt_options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    let filters: Vec<SubscribeFilter> = [&prefixes.data, &prefixes.kpi, &prefixes.status]
        .iter()
        .map(|prefix| SubscribeFilter::new(format!("{}#", prefix), QoS::AtMostOnce))
        .collect();

    client
        .subscribe_many(filters)
        .await
        .map_err(|e| anyhow!("failed to subscribe: {}", e))?;

    info!(
        data_prefix = %prefixes.data,
        kpi_prefix = %prefixes.kpi,
        status_prefix = %prefixes.status,
        "subscribed to MQTT topic filters"
    );

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            handle_publish(&service, &publish.topic, &publish.payload).await;
                        });
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        debug!("subscription acknowledged");
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(_) => {
                        // Other events (outgoing, pings, etc.)
                    }
                    Err(e) => {
                        return Err(anyhow!("MQTT event loop error: {}", e));
                    }
                }
            }
        }
    }
}

/// Handle one incoming publish packet.
///
/// Creates a new independent trace for each message. `received_at` is
/// stamped here, at the moment of delivery. Errors are terminal for this
/// event only: they are logged and the event is dropped, with nothing
/// propagated back to the broker.
pub(crate) async fn handle_publish(service: &IngestService, topic: &str, payload: &[u8]) {
    let span = info_span!(
        parent: Span::none(),
        "mqtt_message",
        topic = %topic,
        payload_size = payload.len(),
    );

    async {
        let event = IngestEvent {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            received_at: chrono::Utc::now(),
        };

        if let Err(e) = service.handle_event(event).await {
            error!(error = %e, "failed to process message, event dropped");
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meshbridge_domain::{
        DomainResult, KpiDocument, RecordRepository, SensorRecord, StatusDocument,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRepository {
        sensor_records: AtomicUsize,
        kpi_documents: AtomicUsize,
        status_documents: AtomicUsize,
    }

    impl CountingRepository {
        fn total(&self) -> usize {
            self.sensor_records.load(Ordering::SeqCst)
                + self.kpi_documents.load(Ordering::SeqCst)
                + self.status_documents.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordRepository for CountingRepository {
        async fn insert_sensor_record(&self, _record: SensorRecord) -> DomainResult<()> {
            self.sensor_records.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn insert_kpi_document(&self, _document: KpiDocument) -> DomainResult<()> {
            self.kpi_documents.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn insert_status_document(&self, _document: StatusDocument) -> DomainResult<()> {
            self.status_documents.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service(repository: Arc<CountingRepository>) -> Arc<IngestService> {
        Arc::new(IngestService::new(TopicPrefixes::default(), repository, None))
    }

    #[tokio::test]
    async fn test_handle_publish_routes_by_topic_prefix() {
        let repository = Arc::new(CountingRepository::default());
        let service = service(Arc::clone(&repository));

        handle_publish(&service, "mesh/data/sensor1", b"reading").await;
        handle_publish(&service, "mesh/kpi/sensor1", b"temp=21").await;
        handle_publish(&service, "mesh/status/sensor1", br#"{"online":true}"#).await;

        assert_eq!(repository.sensor_records.load(Ordering::SeqCst), 1);
        assert_eq!(repository.kpi_documents.load(Ordering::SeqCst), 1);
        assert_eq!(repository.status_documents.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_publish_drops_failed_event_without_panicking() {
        let repository = Arc::new(CountingRepository::default());
        let service = service(Arc::clone(&repository));

        handle_publish(&service, "mesh/status/sensor1", b"not json").await;

        assert_eq!(repository.total(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_events_produce_one_insert_each() {
        let repository = Arc::new(CountingRepository::default());
        let service = service(Arc::clone(&repository));

        let mut handles = Vec::new();
        for i in 0..32 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let topic = format!("mesh/data/sensor{}", i);
                handle_publish(&service, &topic, b"reading").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repository.total(), 32);
    }
}
