//! HTTP moderation client.
//!
//! [`HttpModeration`] implements [`ModerationService`] against the moderation
//! service's two endpoints:
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | analyze | `POST /analyze {"text": ..}` | [`AnalysisResponse`] |
//! | fetch count | `GET /chat/count` | `n` or `{"count": n}` |

use serde::{Deserialize, Serialize};

use crate::{
    config::ModerationConfig,
    moderation::{AnalysisResponse, ModerationError, Verdict},
    runtime::ModerationService,
};

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountResponse {
    Bare(u64),
    Wrapped { count: u64 },
}

impl From<CountResponse> for u64 {
    fn from(response: CountResponse) -> Self {
        match response {
            CountResponse::Bare(count) | CountResponse::Wrapped { count } => count,
        }
    }
}

/// [`ModerationService`] over HTTP.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpModeration {
    client: reqwest::Client,
    base_url: String,
}

impl HttpModeration {
    /// Build a client for the service described by `config`.
    ///
    /// # Errors
    ///
    /// - `ModerationError::Request` if the HTTP client cannot be built
    pub fn new(config: &ModerationConfig) -> Result<Self, ModerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ModerationError::Request(e.to_string()))?;

        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, ModerationError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ModerationError::Status(status.as_u16()));
        }
        response.text().await.map_err(map_transport_error)
    }
}

impl ModerationService for HttpModeration {
    async fn analyze(&self, text: String) -> Result<Verdict, ModerationError> {
        let response = self
            .client
            .post(self.url("/analyze"))
            .json(&AnalyzeRequest { text: &text })
            .send()
            .await
            .map_err(map_transport_error)?;

        let body = Self::read_body(response).await?;
        let parsed: AnalysisResponse =
            serde_json::from_str(&body).map_err(|e| ModerationError::Parse(e.to_string()))?;
        Ok(parsed.into())
    }

    async fn fetch_count(&self) -> Result<u64, ModerationError> {
        let response = self
            .client
            .get(self.url("/chat/count"))
            .send()
            .await
            .map_err(map_transport_error)?;

        let body = Self::read_body(response).await?;
        let parsed: CountResponse =
            serde_json::from_str(&body).map_err(|e| ModerationError::Parse(e.to_string()))?;
        Ok(parsed.into())
    }
}

fn map_transport_error(err: reqwest::Error) -> ModerationError {
    if err.is_timeout() {
        ModerationError::Timeout
    } else {
        ModerationError::Request(err.to_string())
    }
}
