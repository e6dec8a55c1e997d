use crate::config::CipherConfig;
use async_trait::async_trait;
use meshbridge_domain::{CipherGateway, DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

#[derive(Serialize)]
struct EncryptRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EncryptResponse {
    result: String,
}

/// HTTP implementation of CipherGateway.
///
/// Issues `POST {endpoint}/encrypt` with a JSON body `{"text": ...}` under
/// the configured client timeout and requires a 200 response carrying a
/// `result` string. Every failure mode, a missing endpoint included, maps
/// to an error so the caller drops the event instead of persisting
/// plaintext.
pub struct HttpCipherGateway {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpCipherGateway {
    pub fn new(config: &CipherConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl CipherGateway for HttpCipherGateway {
    async fn encrypt(&self, text: &str) -> DomainResult<String> {
        let endpoint = match self.endpoint.as_deref() {
            Some(endpoint) => endpoint,
            None => {
                error!("cipher transform enabled but no endpoint configured");
                return Err(DomainError::CipherEndpointMissing);
            }
        };

        let url = format!("{}/encrypt", endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&EncryptRequest { text })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "cipher request failed");
                DomainError::CipherTransformFailed(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            error!(status = %status, "cipher service returned non-200 response");
            return Err(DomainError::CipherTransformFailed(format!(
                "unexpected status: {}",
                status
            )));
        }

        let body: EncryptResponse = response.json().await.map_err(|e| {
            error!(error = %e, "cipher response decode failed");
            DomainError::CipherTransformFailed(format!("response decode failed: {}", e))
        })?;

        Ok(body.result)
    }
}
