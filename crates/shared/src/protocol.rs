use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::domain::{
    ImageId, LifecycleState, NextStage, SessionId, SessionImageId, Stage, StagePointer,
};

/// Accepts only well-formed, non-negative whole numbers; anything else reads as absent.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(count_from_value))
}

fn count_from_value(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageImage {
    pub session_image_id: SessionImageId,
    pub stage_order: u32,
    pub level: Stage,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: SessionId,
    pub current_stage: Stage,
    #[serde(default)]
    pub images: Vec<StageImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub current_stage: Stage,
    #[serde(default)]
    pub images: Vec<StageImage>,
}

/// Per-image row of the status endpoint, used by the results view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultImage {
    pub session_image_id: SessionImageId,
    pub stage_order: u32,
    pub level: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<StagePointer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StagePointer>,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub images_completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_at: Option<String>,
    #[serde(default)]
    pub images: Vec<ResultImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitItem {
    pub session_image_id: SessionImageId,
    pub user_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitStageRequest {
    pub items: Vec<SubmitItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub stage_order: u32,
    pub level: Stage,
    pub score: f64,
    pub points: i64,
}

/// Submit response exactly as the server shapes it; see [`Verdict`] for the checked form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitStageResponse {
    pub passed: bool,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub images_completed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<NextStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<Match>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Elimination {
    pub eliminated_at: Option<String>,
    pub eliminated_prompt: Option<String>,
    pub eliminated_image_url: Option<String>,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed {
        next_stage: NextStage,
        images_completed: Option<u32>,
        matches: Vec<Match>,
    },
    Eliminated {
        images_completed: Option<u32>,
        details: Elimination,
    },
}

impl Verdict {
    pub fn images_completed(&self) -> Option<u32> {
        match self {
            Verdict::Passed {
                images_completed, ..
            }
            | Verdict::Eliminated {
                images_completed, ..
            } => *images_completed,
        }
    }

    pub fn matches(&self) -> &[Match] {
        match self {
            Verdict::Passed { matches, .. } => matches,
            Verdict::Eliminated { details, .. } => &details.matches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerdictError {
    #[error("passed stage response is missing next_stage")]
    MissingNextStage,
}

impl TryFrom<SubmitStageResponse> for Verdict {
    type Error = VerdictError;

    fn try_from(value: SubmitStageResponse) -> Result<Self, Self::Error> {
        let matches = value.matches.unwrap_or_default();
        if value.passed {
            let next_stage = value.next_stage.ok_or(VerdictError::MissingNextStage)?;
            Ok(Verdict::Passed {
                next_stage,
                images_completed: value.images_completed,
                matches,
            })
        } else {
            Ok(Verdict::Eliminated {
                images_completed: value.images_completed,
                details: Elimination {
                    eliminated_at: value.eliminated_at,
                    eliminated_prompt: value.eliminated_prompt,
                    eliminated_image_url: value.eliminated_image_url,
                    matches,
                },
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub display_name: String,
    pub state: LifecycleState,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
