//! Client for the third-party virtual try-on API.
//!
//! A run is started with `POST {base}/run` and polled with
//! `POST {base}/status` until it reports `done` or `failed`.

use std::time::Duration;

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use vton_core::GarmentCategory;

use crate::config::TryOnConfig;

/// Diffusion steps requested for every run.
pub const DEFAULT_STEPS: u32 = 30;

/// Guidance scale requested for every run.
pub const DEFAULT_SCALE: f64 = 2.5;

/// Upper bound (exclusive) of the random seed.
const SEED_RANGE: u32 = 10_000;

/// Errors from the try-on API.
#[derive(Debug, Error)]
pub enum TryOnError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API returned a non-success status.
    #[error("Try-on API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A run was accepted without a process id.
    #[error("No process_id returned from try-on API")]
    MissingProcessId,
}

/// Body of a run request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnRunRequest {
    pub user_id: String,
    pub model_image: String,
    pub garment_image: String,
    pub category: GarmentCategory,
    pub step: u32,
    pub scale: f64,
    pub seed: u32,
}

impl TryOnRunRequest {
    /// Build a run request with the default steps, scale and a random seed.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        model_image: impl Into<String>,
        garment_image: impl Into<String>,
        category: GarmentCategory,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            model_image: model_image.into(),
            garment_image: garment_image.into(),
            category,
            step: DEFAULT_STEPS,
            scale: DEFAULT_SCALE,
            seed: rand::rng().random_range(0..SEED_RANGE),
        }
    }
}

/// Accepted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnRunResponse {
    pub process_id: String,
}

#[derive(Debug, Deserialize)]
struct RawRunResponse {
    #[serde(default)]
    process_id: Option<serde_json::Value>,
}

/// Processing state of a run.
///
/// Only `done` and `failed` are final. Any other state the vendor reports
/// is kept verbatim in `Other` and passed on to the storefront, which keeps
/// polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TryOnState {
    Pending,
    Processing,
    Done,
    Failed,
    #[serde(untagged)]
    Other(String),
}

impl TryOnState {
    /// Whether polling can stop.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Status of a run; `output` is the result image URL once done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnStatus {
    pub status: TryOnState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    process_id: &'a str,
}

/// Try-on API client.
#[derive(Clone)]
pub struct TryOnClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for TryOnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryOnClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TryOnClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::Http` if the HTTP client cannot be built.
    pub fn new(config: &TryOnConfig) -> Result<Self, TryOnError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, TryOnError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TryOnError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// Start a try-on run.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API rejects it, or no
    /// `process_id` comes back.
    #[instrument(skip(self, request), fields(category = request.category.as_str()))]
    pub async fn run(&self, request: &TryOnRunRequest) -> Result<TryOnRunResponse, TryOnError> {
        let text = self.post("/run", request).await?;
        let raw: RawRunResponse = serde_json::from_str(&text)?;

        // Some deployments return the id as a number.
        let process_id = match raw.process_id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(TryOnError::MissingProcessId),
        };

        Ok(TryOnRunResponse { process_id })
    }

    /// Poll the state of a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn status(&self, process_id: &str) -> Result<TryOnStatus, TryOnError> {
        let text = self.post("/status", &StatusRequest { process_id }).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use super::*;

    async fn client_for(router: Router) -> TryOnClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TryOnClient::new(&TryOnConfig {
            base_url: format!("http://{addr}/"),
            api_key: SecretString::from("vendor_key"),
        })
        .unwrap()
    }

    #[test]
    fn test_run_request_defaults() {
        let request = TryOnRunRequest::new("u1", "model.jpg", "garment.jpg", GarmentCategory::Pants);
        assert_eq!(request.step, 30);
        assert!((request.scale - 2.5).abs() < f64::EPSILON);
        assert!(request.seed < 10_000);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["category"], "pants");
        assert_eq!(json["model_image"], "model.jpg");
    }

    #[tokio::test]
    async fn test_run_returns_process_id() {
        let router = Router::new().route(
            "/run",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if headers.get("authorization").and_then(|v| v.to_str().ok())
                    != Some("Bearer vendor_key")
                {
                    return (StatusCode::UNAUTHORIZED, Json(json!({})));
                }
                assert_eq!(body["step"], 30);
                (StatusCode::OK, Json(json!({"process_id": "p-1"})))
            }),
        );
        let client = client_for(router).await;

        let request = TryOnRunRequest::new("u1", "m", "g", GarmentCategory::Tshirt);
        let response = client.run(&request).await.unwrap();
        assert_eq!(response.process_id, "p-1");
    }

    #[tokio::test]
    async fn test_run_without_process_id() {
        let router = Router::new().route("/run", post(|| async { Json(json!({"ok": true})) }));
        let client = client_for(router).await;

        let request = TryOnRunRequest::new("u1", "m", "g", GarmentCategory::Dress);
        let err = client.run(&request).await.unwrap_err();
        assert!(matches!(err, TryOnError::MissingProcessId));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let router = Router::new().route(
            "/run",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = client_for(router).await;

        let request = TryOnRunRequest::new("u1", "m", "g", GarmentCategory::Dress);
        let err = client.run(&request).await.unwrap_err();
        assert!(matches!(err, TryOnError::Api { status: 502, ref body } if body == "upstream down"));
    }

    #[tokio::test]
    async fn test_status_done_and_pending() {
        let router = Router::new().route(
            "/status",
            post(|Json(body): Json<Value>| async move {
                if body["process_id"] == "p-done" {
                    Json(json!({"status": "done", "output": "https://cdn.example/out.png"}))
                } else {
                    Json(json!({"status": "processing"}))
                }
            }),
        );
        let client = client_for(router).await;

        let done = client.status("p-done").await.unwrap();
        assert_eq!(done.status, TryOnState::Done);
        assert_eq!(done.output.as_deref(), Some("https://cdn.example/out.png"));

        let pending = client.status("p-other").await.unwrap();
        assert_eq!(pending.status, TryOnState::Processing);
        assert!(pending.output.is_none());
    }

    #[tokio::test]
    async fn test_status_unlisted_state_passes_through() {
        let router = Router::new().route(
            "/status",
            post(|| async { Json(json!({"status": "queued"})) }),
        );
        let client = client_for(router).await;

        let status = client.status("p-1").await.unwrap();
        assert_eq!(status.status, TryOnState::Other("queued".to_string()));
        assert!(!status.status.is_final());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, json!({"status": "queued"}));
    }

    #[test]
    fn test_state_finality() {
        let done: TryOnStatus = serde_json::from_str(r#"{"status":"done","output":"o"}"#).unwrap();
        assert!(done.status.is_final());
        let failed: TryOnStatus = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert!(failed.status.is_final());
        assert_eq!(serde_json::to_value(TryOnState::Pending).unwrap(), "pending");
    }
}
