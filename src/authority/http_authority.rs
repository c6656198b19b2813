use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use log::{debug, trace, warn};
use serde::Serialize;
use serde_json::Value;

use crate::{
    authority::{RawSignature, SignatureObject, SigningAuthority},
    config::Settings,
    digest::Imprint,
};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Signing authority reached over HTTP with basic authentication.
///
/// Each call posts the imprint as JSON and expects a base64 `signature`
/// field in the response. Transport failures and 5xx responses are retried
/// up to `max_retries` times; other failures are returned immediately.
#[derive(Clone, Debug)]
pub struct HttpAuthority {
    endpoint: String,
    username: String,
    password: String,
    max_retries: u32,
    client: reqwest::Client,
}

#[derive(Serialize, Clone, Debug)]
struct SignRequest {
    hash_algorithm: String,
    hash: String,
}

struct AttemptError {
    retryable: bool,
    error: anyhow::Error,
}

impl AttemptError {
    fn retryable(error: anyhow::Error) -> Self {
        Self {
            retryable: true,
            error,
        }
    }

    fn fatal(error: anyhow::Error) -> Self {
        Self {
            retryable: false,
            error,
        }
    }
}

impl HttpAuthority {
    /// Creates an authority client.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - URL that accepts signing requests.
    /// * `username` - Basic auth user name.
    /// * `password` - Basic auth password.
    /// * `timeout` - Per-request timeout.
    /// * `max_retries` - Retries after the first failed attempt.
    ///
    /// Fails unless `endpoint` is an `http://` or `https://` URL.
    pub fn new(
        endpoint: String,
        username: String,
        password: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!("HTTP signing authority needs an http(s) endpoint, got '{endpoint}'");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            username,
            password,
            max_retries,
            client,
        })
    }

    /// Creates an authority client from loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        log::info!("Using signing authority at {}", settings.endpoint);
        Self::new(
            settings.endpoint.clone(),
            settings.username.clone(),
            settings.password.clone(),
            settings.timeout(),
            settings.max_retries,
        )
    }

    async fn request_signature(&self, request: &SignRequest) -> Result<Vec<u8>, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::retryable(anyhow!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AttemptError::retryable(anyhow!("Failed to read response: {e}")))?;

        trace!("Response status: {status}, body: {text}");

        if !status.is_success() {
            let error = anyhow!("Request failed with status {status}: {text}");
            return Err(if status.is_server_error() {
                AttemptError::retryable(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        if text.is_empty() {
            return Err(AttemptError::fatal(anyhow!("Server returned empty response")));
        }

        let response: Value = serde_json::from_str(&text).map_err(|e| {
            AttemptError::fatal(anyhow!(
                "Failed to parse JSON response: {e}. Response body: {text}"
            ))
        })?;

        let sig_base64 = response
            .get("signature")
            .ok_or_else(|| AttemptError::fatal(anyhow!("API response is missing 'signature' field")))?
            .as_str()
            .ok_or_else(|| {
                AttemptError::fatal(anyhow!("API response 'signature' field is not a string"))
            })?;

        BASE64
            .decode(sig_base64)
            .map_err(|e| AttemptError::fatal(anyhow!("Signature is not valid base64: {e}")))
    }
}

#[async_trait]
impl SigningAuthority for HttpAuthority {
    async fn sign(&self, imprint: &Imprint) -> Result<Box<dyn SignatureObject>> {
        let request = SignRequest {
            hash_algorithm: imprint.algorithm().to_string(),
            hash: imprint.to_hex(),
        };

        let mut attempt = 0;
        loop {
            debug!(
                "Sign request for {imprint} to {} (attempt {})",
                self.endpoint,
                attempt + 1
            );

            match self.request_signature(&request).await {
                Ok(bytes) => return Ok(Box::new(RawSignature(bytes))),
                Err(AttemptError { retryable, error }) => {
                    if !retryable || attempt >= self.max_retries {
                        return Err(error.context(format!(
                            "Signing authority {} rejected request after {} attempt(s)",
                            self.endpoint,
                            attempt + 1
                        )));
                    }
                    attempt += 1;
                    warn!("Signing attempt {attempt} failed, retrying: {error:#}");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }
}
