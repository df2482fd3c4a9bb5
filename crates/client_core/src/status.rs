//! Reads the authoritative session status and decides whether play may continue.

use std::sync::Arc;

use shared::{
    domain::{LifecycleState, SessionId},
    protocol::StatusResponse,
};
use tracing::info;

use crate::{error::ClientError, GameApi};

/// Where a finished session sends the player: the results view.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub session_id: SessionId,
    pub state: LifecycleState,
    pub eliminated_at: Option<String>,
    pub total_score: Option<f64>,
    pub images_completed: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum StatusCheck {
    Active(StatusResponse),
    Terminal(Redirect),
}

impl StatusCheck {
    pub fn images_completed(&self) -> Option<u32> {
        match self {
            StatusCheck::Active(status) => status.images_completed,
            StatusCheck::Terminal(redirect) => redirect.images_completed,
        }
    }
}

#[derive(Clone)]
pub struct SessionStatusReader {
    api: Arc<dyn GameApi>,
}

impl SessionStatusReader {
    pub fn new(api: Arc<dyn GameApi>) -> Self {
        Self { api }
    }

    pub async fn read(&self, session_id: &SessionId) -> Result<StatusResponse, ClientError> {
        self.api.status(session_id).await
    }

    /// Fetches the status and classifies the session. Completed and eliminated
    /// sessions must not load any further stage.
    pub async fn check(&self, session_id: &SessionId) -> Result<StatusCheck, ClientError> {
        let status = self.read(session_id).await?;
        if !status.state.is_terminal() {
            return Ok(StatusCheck::Active(status));
        }

        info!(
            %session_id,
            state = %status.state,
            eliminated_at = status.eliminated_at.as_deref().unwrap_or(""),
            "session already finished; redirecting to results"
        );
        Ok(StatusCheck::Terminal(Redirect {
            session_id: session_id.clone(),
            state: status.state,
            eliminated_at: status.eliminated_at,
            total_score: status.total_score,
            images_completed: status.images_completed,
        }))
    }
}
