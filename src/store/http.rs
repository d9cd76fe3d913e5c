//! REST client for a remote Mahakrama server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::MahakramaStore;
use crate::config::ClientConfig;
use crate::error::ProgressionError;
use crate::rest::dto::{ImportStepsRequest, ImportStepsResponse, SuccessResponse};
use crate::types::{
    CompleteProgressionRequest, MahakramaHistory, MahakramaStep, StartProgressionRequest,
    StepInput, StepUpdate,
};

/// Error payload returned by the server on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`MahakramaStore`] speaking the `/api/mahakrama` REST endpoints
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStore {
    /// Create a client for `base_url` (e.g. `http://localhost:7010`)
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProgressionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProgressionError::transport(None, e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Create from config, reading the bearer token from `client.token_env`
    pub fn from_config(config: &ClientConfig) -> Result<Self, ProgressionError> {
        let token = std::env::var(&config.token_env).ok();
        Self::new(
            &config.base_url,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/mahakrama{}", self.base_url, path)
    }

    /// Send the request and turn non-2xx statuses into typed errors
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ProgressionError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = error_from_response(status, &body);
        debug!(status = status.as_u16(), error = %err, "Mahakrama API error");
        Err(err)
    }

    async fn json<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ProgressionError> {
        let response = self.execute(request).await?;
        let status = response.status();
        response.json::<R>().await.map_err(|e| {
            ProgressionError::transport(
                Some(status.as_u16()),
                format!("Failed to parse response: {}", e),
            )
        })
    }
}

/// Message from `message`, then `error`, then the bare status
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API error: {}", status.as_u16()))
}

/// Map a non-2xx response back onto the error the server raised.
///
/// The server's `error` code picks the variant; statuses without a known
/// code fall back to `Transport`.
fn error_from_response(status: StatusCode, body: &str) -> ProgressionError {
    let message = error_message(status, body);
    let code = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error);

    match (status, code.as_deref()) {
        (StatusCode::UNAUTHORIZED, _) => ProgressionError::Auth,
        (StatusCode::NOT_FOUND, _) => ProgressionError::NotFound(message),
        (_, Some("already_in_progress")) => ProgressionError::AlreadyInProgress(message),
        (_, Some("precondition_failed")) => ProgressionError::Precondition(message),
        (_, Some("no_current_step")) => ProgressionError::NoCurrentStep(message),
        (_, Some("conflict")) => ProgressionError::Conflict(message),
        (_, Some("validation_error")) => ProgressionError::Validation(vec![message]),
        _ => ProgressionError::transport(Some(status.as_u16()), message),
    }
}

#[async_trait]
impl MahakramaStore for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_steps(&self) -> Result<Vec<MahakramaStep>, ProgressionError> {
        debug!("GET /steps");
        self.json(self.client.get(self.url("/steps"))).await
    }

    async fn get_step(&self, id: Uuid) -> Result<MahakramaStep, ProgressionError> {
        self.json(self.client.get(self.url(&format!("/steps/{}", id))))
            .await
    }

    async fn create_step(&self, input: StepInput) -> Result<MahakramaStep, ProgressionError> {
        self.json(self.client.post(self.url("/steps")).json(&input))
            .await
    }

    async fn bulk_create_steps(&self, records: Vec<StepInput>) -> Result<usize, ProgressionError> {
        let body = ImportStepsRequest { records };
        let response: ImportStepsResponse = self
            .json(self.client.post(self.url("/steps/import")).json(&body))
            .await?;
        Ok(response.inserted)
    }

    async fn update_step(
        &self,
        id: Uuid,
        update: StepUpdate,
    ) -> Result<MahakramaStep, ProgressionError> {
        self.json(
            self.client
                .put(self.url(&format!("/steps/{}", id)))
                .json(&update),
        )
        .await
    }

    async fn delete_step(&self, id: Uuid) -> Result<(), ProgressionError> {
        let _: SuccessResponse = self
            .json(self.client.delete(self.url(&format!("/steps/{}", id))))
            .await?;
        Ok(())
    }

    async fn list_history(
        &self,
        person_id: Uuid,
    ) -> Result<Vec<MahakramaHistory>, ProgressionError> {
        self.json(
            self.client
                .get(self.url(&format!("/person/{}/history", person_id))),
        )
        .await
    }

    async fn start_history(
        &self,
        person_id: Uuid,
        request: StartProgressionRequest,
    ) -> Result<MahakramaHistory, ProgressionError> {
        self.json(
            self.client
                .post(self.url(&format!("/person/{}/history", person_id)))
                .json(&request),
        )
        .await
    }

    async fn complete_history(
        &self,
        person_id: Uuid,
        history_id: Uuid,
        request: CompleteProgressionRequest,
    ) -> Result<(), ProgressionError> {
        let url = self.url(&format!(
            "/person/{}/history/{}/complete",
            person_id, history_id
        ));
        let _: SuccessResponse = self.json(self.client.post(url).json(&request)).await?;
        Ok(())
    }
}
