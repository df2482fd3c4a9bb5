use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::SessionId,
    error::ApiError,
    protocol::{
        LeaderboardRow, NextStageResponse, StartRequest, StartResponse, StatusResponse,
        SubmitStageRequest, SubmitStageResponse, Verdict,
    },
};
use tracing::{debug, info, warn};

pub mod completion;
pub mod controller;
pub mod error;
pub mod status;

pub use completion::CompletionCounter;
pub use controller::{
    ControllerEvent, LoadOutcome, Phase, StageController, StageSnapshot, SubmitOutcome,
};
pub use error::{ClientError, ControllerError};
pub use status::{Redirect, SessionStatusReader, StatusCheck};

pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 50;

/// Boundary to the remote scoring/session service.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn start(&self, display_name: &str) -> Result<StartResponse, ClientError>;
    async fn status(&self, session_id: &SessionId) -> Result<StatusResponse, ClientError>;
    async fn next_stage(&self, session_id: &SessionId) -> Result<NextStageResponse, ClientError>;
    async fn submit_stage(
        &self,
        session_id: &SessionId,
        request: &SubmitStageRequest,
    ) -> Result<Verdict, ClientError>;
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, ClientError>;
}

pub struct HttpGameClient {
    http: Client,
    base_url: String,
}

impl HttpGameClient {
    /// `base_url` includes the API prefix, e.g. `http://127.0.0.1:8000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_url(&self, session_id: &SessionId, leaf: &str) -> String {
        format!("{}/session/{}/{leaf}", self.base_url, session_id.as_str())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    Err(ClientError::from_api(rejection(status, response).await))
}

async fn rejection(status: StatusCode, response: Response) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_body(status.as_u16(), &body);
    warn!(status = status.as_u16(), detail = ?err.detail, "scoring service rejected request");
    err
}

#[async_trait]
impl GameApi for HttpGameClient {
    async fn start(&self, display_name: &str) -> Result<StartResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/start", self.base_url))
            .json(&StartRequest {
                display_name: display_name.trim().to_string(),
            })
            .send()
            .await?;

        if response.status() == StatusCode::FORBIDDEN {
            let err = rejection(StatusCode::FORBIDDEN, response).await;
            info!(display_name, "start refused: display name already played");
            return Err(ClientError::AlreadyPlayed(err));
        }

        let started: StartResponse = decode(response).await?;
        info!(
            session_id = %started.session_id,
            stage = %started.current_stage,
            "session started"
        );
        Ok(started)
    }

    async fn status(&self, session_id: &SessionId) -> Result<StatusResponse, ClientError> {
        debug!(%session_id, "fetching session status");
        let response = self
            .http
            .get(self.session_url(session_id, "status"))
            .send()
            .await?;
        decode(response).await
    }

    async fn next_stage(&self, session_id: &SessionId) -> Result<NextStageResponse, ClientError> {
        debug!(%session_id, "fetching stage images");
        let response = self
            .http
            .get(self.session_url(session_id, "next_stage"))
            .send()
            .await?;
        decode(response).await
    }

    async fn submit_stage(
        &self,
        session_id: &SessionId,
        request: &SubmitStageRequest,
    ) -> Result<Verdict, ClientError> {
        debug!(%session_id, items = request.items.len(), "submitting stage prompts");
        let response = self
            .http
            .post(self.session_url(session_id, "submit_stage"))
            .json(request)
            .send()
            .await?;
        let raw: SubmitStageResponse = decode(response).await?;
        Verdict::try_from(raw).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>, ClientError> {
        let response = self
            .http
            .get(format!("{}/leaderboard", self.base_url))
            .query(&[("limit", limit)])
            .send()
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
