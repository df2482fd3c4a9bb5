use super::*;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use client_core::ClientError;
use shared::{
    domain::{LifecycleState, NextStage, Stage, StagePointer},
    protocol::{
        Elimination, LeaderboardRow, Match, NextStageResponse, StageImage, StartResponse,
        StatusResponse, SubmitStageRequest, Verdict,
    },
};
use tokio::sync::Mutex;

#[derive(Default)]
struct ScriptedGame {
    statuses: Mutex<VecDeque<Result<StatusResponse, ClientError>>>,
    stages: Mutex<VecDeque<Result<NextStageResponse, ClientError>>>,
    verdicts: Mutex<VecDeque<Result<Verdict, ClientError>>>,
    submitted: Mutex<Vec<SubmitStageRequest>>,
    status_calls: AtomicUsize,
    next_stage_calls: AtomicUsize,
}

impl ScriptedGame {
    async fn stage(&self, stage: Stage, ids: &[(&str, u32)]) {
        let images = ids
            .iter()
            .map(|(id, order)| StageImage {
                session_image_id: SessionImageId::new(*id),
                stage_order: *order,
                level: stage,
                image_url: format!("/static/{stage}/{order}.png"),
                image_id: None,
                stage_name: Some(stage),
            })
            .collect();
        self.stages.lock().await.push_back(Ok(NextStageResponse {
            session_id: None,
            current_stage: stage,
            images,
        }));
    }

    async fn stage_fails(&self) {
        self.stages
            .lock()
            .await
            .push_back(Err(ClientError::Network("connection reset".to_string())));
    }

    async fn verdict(&self, verdict: Result<Verdict, ClientError>) {
        self.verdicts.lock().await.push_back(verdict);
    }

    async fn passes_to(&self, next_stage: NextStage, images_completed: u32) {
        self.verdict(Ok(Verdict::Passed {
            next_stage,
            images_completed: Some(images_completed),
            matches: Vec::new(),
        }))
        .await;
    }

    async fn eliminates(&self) {
        self.verdict(Ok(Verdict::Eliminated {
            images_completed: Some(0),
            details: Elimination {
                eliminated_at: Some("easy-1".to_string()),
                eliminated_prompt: Some("a kite over dunes".to_string()),
                eliminated_image_url: None,
                matches: vec![Match {
                    stage_order: 1,
                    level: Stage::Easy,
                    score: 40.0,
                    points: 5,
                }],
            },
        }))
        .await;
    }

    async fn prompts_sent(&self) -> Vec<Vec<(String, String)>> {
        self.submitted
            .lock()
            .await
            .iter()
            .map(|req| {
                req.items
                    .iter()
                    .map(|item| {
                        (
                            item.session_image_id.as_str().to_string(),
                            item.user_prompt.clone(),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl GameApi for ScriptedGame {
    async fn start(&self, _display_name: &str) -> Result<StartResponse, ClientError> {
        Err(ClientError::Network("not scripted".to_string()))
    }

    async fn status(&self, _session_id: &SessionId) -> Result<StatusResponse, ClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().await.pop_front().unwrap_or_else(|| {
            Ok(StatusResponse {
                state: LifecycleState::Active,
                current_stage: None,
                images_completed: None,
                total_score: None,
                eliminated_at: None,
                images: Vec::new(),
            })
        })
    }

    async fn next_stage(&self, _session_id: &SessionId) -> Result<NextStageResponse, ClientError> {
        self.next_stage_calls.fetch_add(1, Ordering::SeqCst);
        self.stages
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no stage scripted".to_string())))
    }

    async fn submit_stage(
        &self,
        _session_id: &SessionId,
        request: &SubmitStageRequest,
    ) -> Result<Verdict, ClientError> {
        self.submitted.lock().await.push(request.clone());
        self.verdicts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no verdict scripted".to_string())))
    }

    async fn leaderboard(&self, _limit: u32) -> Result<Vec<LeaderboardRow>, ClientError> {
        Ok(Vec::new())
    }
}

async fn play_with_input(game: &Arc<ScriptedGame>, input: &str) -> anyhow::Result<PlayEnd> {
    let controller = StageController::new(SessionId::new("sess-1"), game.clone());
    let mut console = Console::from_reader(input.as_bytes());
    let end = play_stages(&controller, &Settings::default(), &mut console).await;
    controller.close().await;
    end
}

fn prompts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect()
}

#[tokio::test]
async fn clears_every_tier_and_advances_on_enter() {
    let game = Arc::new(ScriptedGame::default());
    game.stage(Stage::Easy, &[("si-1", 1)]).await;
    game.stage(Stage::Medium, &[("si-2", 2), ("si-3", 3)]).await;
    game.stage(Stage::Hard, &[("si-4", 4), ("si-5", 5)]).await;
    game.passes_to(NextStage::Medium, 1).await;
    game.passes_to(NextStage::Hard, 3).await;
    game.passes_to(NextStage::Done, 5).await;

    let input = "a red bicycle on grass\n\nfog on a pier\ntwo cats\n\nneon alley\nglacier\n";
    let end = play_with_input(&game, input).await.expect("play");

    assert_eq!(end, PlayEnd::Completed);
    assert_eq!(
        game.prompts_sent().await,
        vec![
            prompts(&[("si-1", "a red bicycle on grass")]),
            prompts(&[("si-2", "fog on a pier"), ("si-3", "two cats")]),
            prompts(&[("si-4", "neon alley"), ("si-5", "glacier")]),
        ]
    );
    assert_eq!(game.status_calls.load(Ordering::SeqCst), 3);
    assert_eq!(game.next_stage_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn blank_prompt_is_asked_again_alone() {
    let game = Arc::new(ScriptedGame::default());
    game.stage(Stage::Medium, &[("si-2", 2), ("si-3", 3)]).await;
    game.eliminates().await;

    let end = play_with_input(&game, "first\n   \nsecond\n")
        .await
        .expect("play");

    assert_eq!(end, PlayEnd::Eliminated);
    assert_eq!(
        game.prompts_sent().await,
        vec![prompts(&[("si-2", "first"), ("si-3", "second")])]
    );
}

#[tokio::test]
async fn failed_load_is_retried_after_confirmation() {
    let game = Arc::new(ScriptedGame::default());
    game.stage_fails().await;
    game.stage(Stage::Easy, &[("si-1", 1)]).await;
    game.eliminates().await;

    let end = play_with_input(&game, "y\na paper boat\n").await.expect("play");

    assert_eq!(end, PlayEnd::Eliminated);
    assert_eq!(game.status_calls.load(Ordering::SeqCst), 2);
    assert_eq!(game.next_stage_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn declined_load_retry_ends_play() {
    let game = Arc::new(ScriptedGame::default());
    game.stage_fails().await;

    let result = play_with_input(&game, "n\n").await;

    assert!(result.is_err());
    assert_eq!(game.next_stage_calls.load(Ordering::SeqCst), 1);
    assert!(game.prompts_sent().await.is_empty());
}

#[tokio::test]
async fn failed_submit_is_resent_with_the_same_prompts() {
    let game = Arc::new(ScriptedGame::default());
    game.stage(Stage::Easy, &[("si-1", 1)]).await;
    game.verdict(Err(ClientError::Network("timed out".to_string())))
        .await;
    game.eliminates().await;

    let end = play_with_input(&game, "lanterns on water\n\n")
        .await
        .expect("play");

    assert_eq!(end, PlayEnd::Eliminated);
    let sent = game.prompts_sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0], prompts(&[("si-1", "lanterns on water")]));
}

#[tokio::test]
async fn finished_session_redirects_without_reading_input() {
    let game = Arc::new(ScriptedGame::default());
    game.statuses.lock().await.push_back(Ok(StatusResponse {
        state: LifecycleState::Completed,
        current_stage: Some(StagePointer::Done),
        images_completed: Some(5),
        total_score: Some(188.0),
        eliminated_at: None,
        images: Vec::new(),
    }));

    let end = play_with_input(&game, "").await.expect("play");

    assert_eq!(end, PlayEnd::Redirected);
    assert_eq!(game.next_stage_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn closed_input_stops_play() {
    let game = Arc::new(ScriptedGame::default());
    game.stage(Stage::Easy, &[("si-1", 1)]).await;

    let err = play_with_input(&game, "").await.expect_err("no input");

    assert_eq!(err.to_string(), "input closed");
    assert!(game.prompts_sent().await.is_empty());
}
