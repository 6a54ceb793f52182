//! RestWorkflowApi -- concrete [`WorkflowApi`] over the workflow REST backend.
//!
//! Speaks `POST /workflows`, `PATCH /workflows/{id}` and
//! `GET /workflows/{id}`. Successful responses wrap their payload in a
//! `{ "data": ... }` envelope; failures carry `{ "code", "message" }`.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use flowpad_core::repository::workflow::WorkflowApi;
use flowpad_types::config::ApiConfig;
use flowpad_types::error::{ApiError, VERSION_CONFLICT_ERROR_CODE};
use flowpad_types::workflow::{WorkflowRecord, WorkflowUpdate};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

pub struct RestWorkflowApi {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl RestWorkflowApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Transport(format!("invalid base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!("base URL '{base_url}' cannot hold a path")));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    /// Client for `config`, with the API key read from the environment
    /// variable it names (if set).
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let api = Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        Ok(match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => api.with_api_key(SecretString::from(key)),
            _ => {
                tracing::debug!(env = %config.api_key_env, "no API key set, sending unauthenticated requests");
                api
            }
        })
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    fn workflows_url(&self) -> Result<Url, ApiError> {
        self.endpoint(&["workflows"])
    }

    /// The id is percent-encoded as a single path segment.
    fn workflow_url(&self, id: &str) -> Result<Url, ApiError> {
        self.endpoint(&["workflows", id])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport(format!("base URL '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<WorkflowRecord, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }
        unwrap_envelope(&body)
    }
}

// RestWorkflowApi does not derive Debug so the API key never ends up in logs.

impl WorkflowApi for RestWorkflowApi {
    async fn create(&self, payload: &WorkflowUpdate) -> Result<WorkflowRecord, ApiError> {
        tracing::debug!(name = ?payload.name, "creating workflow");
        self.send(self.client.post(self.workflows_url()?).json(payload)).await
    }

    async fn update(
        &self,
        id: &str,
        payload: &WorkflowUpdate,
        force_save: bool,
    ) -> Result<WorkflowRecord, ApiError> {
        tracing::debug!(workflow_id = id, force_save, "updating workflow");
        let mut request = self.client.patch(self.workflow_url(id)?).json(payload);
        if force_save {
            request = request.query(&[("forceSave", "true")]);
        }
        self.send(request).await
    }

    async fn fetch(&self, id: &str) -> Result<WorkflowRecord, ApiError> {
        self.send(self.client.get(self.workflow_url(id)?)).await
    }
}

/// Map a failed response onto [`ApiError`].
///
/// The backend's error code wins over the HTTP status, so a stale version
/// is always a conflict.
fn error_from_response(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| body.to_string());

    match (parsed.code, status) {
        (Some(VERSION_CONFLICT_ERROR_CODE), _) => {
            tracing::warn!(status = status.as_u16(), "backend reported a version conflict");
            ApiError::Conflict {
                code: VERSION_CONFLICT_ERROR_CODE,
                message,
            }
        }
        (_, StatusCode::NOT_FOUND) => ApiError::NotFound,
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str::<DataEnvelope<T>>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| ApiError::Decode(format!("failed to parse response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_code_maps_to_conflict() {
        let err = error_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"code": 100, "message": "Your most recent changes may be lost"}"#,
        );
        match err {
            ApiError::Conflict { code, message } => {
                assert_eq!(code, 100);
                assert!(message.contains("changes may be lost"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_not_found_and_other_statuses() {
        assert!(matches!(
            error_from_response(StatusCode::NOT_FOUND, r#"{"message": "missing"}"#),
            ApiError::NotFound
        ));

        match error_from_response(StatusCode::INTERNAL_SERVER_ERROR, "gateway exploded") {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "gateway exploded");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_unwraps_record() {
        let record: WorkflowRecord = unwrap_envelope(
            r#"{"data": {"id": "7", "name": "Sync", "versionId": "v2", "tags": [{"id": "t", "name": "ops"}]}}"#,
        )
        .unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.version_id.as_deref(), Some("v2"));
        assert_eq!(record.tags[0].name, "ops");

        let err = unwrap_envelope::<WorkflowRecord>(r#"{"id": "7"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_urls_drop_trailing_slash() {
        let api = RestWorkflowApi::new("http://localhost:5678/rest/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.workflows_url().unwrap().as_str(), "http://localhost:5678/rest/workflows");
        assert_eq!(api.workflow_url("42").unwrap().as_str(), "http://localhost:5678/rest/workflows/42");

        let bare = RestWorkflowApi::new("http://localhost:5678", Duration::from_secs(5)).unwrap();
        assert_eq!(bare.workflows_url().unwrap().as_str(), "http://localhost:5678/workflows");
    }

    #[test]
    fn test_workflow_id_is_encoded_as_one_segment() {
        let api = RestWorkflowApi::new("http://localhost:5678/rest", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.workflow_url("a/b c?d").unwrap().as_str(),
            "http://localhost:5678/rest/workflows/a%2Fb%20c%3Fd"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            RestWorkflowApi::new("not a url", Duration::from_secs(5)),
            Err(ApiError::Transport(_))
        ));
        assert!(RestWorkflowApi::new("mailto:ops@example.com", Duration::from_secs(5)).is_err());
    }
}
