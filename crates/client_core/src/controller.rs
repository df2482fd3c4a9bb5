//! Stage progression: loads a stage, collects prompts, submits them and
//! interprets the verdict.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{LifecycleState, NextStage, SessionId, SessionImageId, Stage, MAX_PROMPT_CHARS},
    protocol::{Elimination, Match, StageImage, SubmitItem, SubmitStageRequest, Verdict},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    completion::CompletionCounter,
    error::ControllerError,
    status::{Redirect, SessionStatusReader, StatusCheck},
    GameApi,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    /// The only phase that accepts prompt input.
    Active,
    Submitting,
    /// Stage passed; stays put until the player asks to advance.
    Cleared { next_stage: NextStage },
    Eliminated,
    Completed,
    /// The owning view went away; late results are dropped.
    Closed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Eliminated | Phase::Completed | Phase::Closed)
    }

    pub fn accepts_input(self) -> bool {
        self == Phase::Active
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StageLoaded {
        stage: Stage,
        images: Vec<StageImage>,
    },
    ProgressUpdated {
        images_completed: u32,
    },
    StageCleared {
        stage: Stage,
        next_stage: NextStage,
        message: &'static str,
        matches: Vec<Match>,
    },
    Eliminated(Elimination),
    Completed {
        matches: Vec<Match>,
    },
    Redirect(Redirect),
    Error(String),
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Ready(StageSnapshot),
    /// Session already finished: leave the play flow for the results view.
    Redirect(Redirect),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Cleared {
        stage: Stage,
        next_stage: NextStage,
        matches: Vec<Match>,
    },
    Eliminated(Elimination),
    Completed {
        matches: Vec<Match>,
    },
    /// A submission was already in flight; nothing was sent.
    AlreadySubmitting,
}

/// View model of the controller at one point in time.
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub session_id: SessionId,
    pub phase: Phase,
    pub stage: Option<Stage>,
    pub images: Vec<StageImage>,
    pub prompts: HashMap<SessionImageId, String>,
    /// Images of this stage holding a non-blank prompt.
    pub filled: usize,
    pub total: usize,
    pub images_completed: u32,
    pub last_error: Option<String>,
    pub elimination: Option<Elimination>,
    pub last_matches: Vec<Match>,
}

impl StageSnapshot {
    pub fn threshold(&self) -> Option<f64> {
        self.stage.map(Stage::pass_threshold)
    }

    pub fn prompt(&self, id: &SessionImageId) -> &str {
        self.prompts.get(id).map(String::as_str).unwrap_or("")
    }
}

struct LoadedStage {
    stage: Stage,
    images: Vec<StageImage>,
}

struct ControllerState {
    phase: Phase,
    /// Bumped by every load and by `close`; a result is applied only if the
    /// generation it started under is still current.
    generation: u64,
    loaded: Option<LoadedStage>,
    prompts: HashMap<SessionImageId, String>,
    last_error: Option<String>,
    elimination: Option<Elimination>,
    last_matches: Vec<Match>,
}

fn discarded(state: &ControllerState) -> ControllerError {
    if state.phase == Phase::Closed {
        ControllerError::Closed
    } else {
        ControllerError::Superseded
    }
}

pub fn truncate_prompt(text: &str) -> String {
    text.chars().take(MAX_PROMPT_CHARS).collect()
}

pub struct StageController {
    session_id: SessionId,
    api: Arc<dyn GameApi>,
    status: SessionStatusReader,
    completion: Arc<CompletionCounter>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl StageController {
    pub fn new(session_id: SessionId, api: Arc<dyn GameApi>) -> Arc<Self> {
        Self::with_completion(session_id, api, Arc::new(CompletionCounter::new()))
    }

    pub fn with_completion(
        session_id: SessionId,
        api: Arc<dyn GameApi>,
        completion: Arc<CompletionCounter>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            session_id,
            status: SessionStatusReader::new(api.clone()),
            api,
            completion,
            inner: Mutex::new(ControllerState {
                phase: Phase::Loading,
                generation: 0,
                loaded: None,
                prompts: HashMap::new(),
                last_error: None,
                elimination: None,
                last_matches: Vec::new(),
            }),
            events,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn completion(&self) -> Arc<CompletionCounter> {
        self.completion.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub async fn snapshot(&self) -> StageSnapshot {
        let guard = self.inner.lock().await;
        self.snapshot_locked(&guard)
    }

    fn snapshot_locked(&self, state: &ControllerState) -> StageSnapshot {
        let (stage, images) = match &state.loaded {
            Some(loaded) => (Some(loaded.stage), loaded.images.clone()),
            None => (None, Vec::new()),
        };
        let filled = images
            .iter()
            .filter(|img| {
                state
                    .prompts
                    .get(&img.session_image_id)
                    .is_some_and(|p| !p.trim().is_empty())
            })
            .count();
        let total = stage.map(Stage::image_count).unwrap_or(images.len());
        StageSnapshot {
            session_id: self.session_id.clone(),
            phase: state.phase,
            stage,
            images,
            prompts: state.prompts.clone(),
            filled,
            total,
            images_completed: self.completion.display_count(),
            last_error: state.last_error.clone(),
            elimination: state.elimination.clone(),
            last_matches: state.last_matches.clone(),
        }
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn record_progress(&self, reported: Option<u32>) {
        if let Some(images_completed) = self.completion.resolve(reported) {
            self.emit(ControllerEvent::ProgressUpdated { images_completed });
        }
    }

    /// Detaches the controller from its view. Anything still in flight is
    /// discarded when it resolves.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        guard.generation += 1;
        guard.phase = Phase::Closed;
        info!(session_id = %self.session_id, "stage controller closed");
    }

    /// Checks the session status and, while it is still active, fetches the
    /// current stage's images. Prompts of the previous stage are discarded.
    pub async fn load_stage(&self) -> Result<LoadOutcome, ControllerError> {
        let generation = {
            let mut guard = self.inner.lock().await;
            match guard.phase {
                Phase::Closed => return Err(ControllerError::Closed),
                phase if phase.is_terminal() || phase == Phase::Submitting => {
                    return Err(ControllerError::InvalidPhase {
                        action: "load a stage",
                        phase,
                    })
                }
                _ => {}
            }
            guard.generation += 1;
            guard.phase = Phase::Loading;
            guard.prompts.clear();
            guard.last_error = None;
            guard.generation
        };

        let checked = self.status.check(&self.session_id).await;
        {
            let mut guard = self.inner.lock().await;
            if guard.generation != generation {
                debug!(session_id = %self.session_id, "discarding stale status read");
                return Err(discarded(&guard));
            }
            let check = match checked {
                Ok(check) => check,
                Err(err) => return Err(self.fail_load(&mut guard, ControllerError::load(err))),
            };
            self.record_progress(check.images_completed());

            if let StatusCheck::Terminal(mut redirect) = check {
                redirect.images_completed = self.completion.read();
                guard.phase = match redirect.state {
                    LifecycleState::Completed => Phase::Completed,
                    _ => Phase::Eliminated,
                };
                self.emit(ControllerEvent::Redirect(redirect.clone()));
                return Ok(LoadOutcome::Redirect(redirect));
            }
        }

        let fetched = self.api.next_stage(&self.session_id).await;
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!(session_id = %self.session_id, "discarding stale stage load");
            return Err(discarded(&guard));
        }
        let next = match fetched {
            Ok(next) => next,
            Err(err) => return Err(self.fail_load(&mut guard, ControllerError::load(err))),
        };

        let mut images = next.images;
        images.sort_by_key(|img| img.stage_order);
        info!(
            session_id = %self.session_id,
            stage = %next.current_stage,
            images = images.len(),
            "stage loaded"
        );
        guard.loaded = Some(LoadedStage {
            stage: next.current_stage,
            images: images.clone(),
        });
        guard.prompts.clear();
        guard.last_matches.clear();
        guard.phase = Phase::Active;
        self.emit(ControllerEvent::StageLoaded {
            stage: next.current_stage,
            images,
        });
        Ok(LoadOutcome::Ready(self.snapshot_locked(&guard)))
    }

    fn fail_load(&self, state: &mut ControllerState, err: ControllerError) -> ControllerError {
        let message = err.player_message();
        warn!(session_id = %self.session_id, error = %err, "stage load failed");
        state.last_error = Some(message.clone());
        self.emit(ControllerEvent::Error(message));
        err
    }

    /// Proceeds to the next stage after a cleared one.
    pub async fn advance(&self) -> Result<LoadOutcome, ControllerError> {
        let phase = self.phase().await;
        match phase {
            Phase::Cleared { next_stage } if !next_stage.is_done() => self.load_stage().await,
            Phase::Closed => Err(ControllerError::Closed),
            phase => Err(ControllerError::InvalidPhase {
                action: "advance",
                phase,
            }),
        }
    }

    /// Stores the prompt for one image, cut to the input limit. Returns the stored text.
    pub async fn set_prompt(
        &self,
        image_id: &SessionImageId,
        text: &str,
    ) -> Result<String, ControllerError> {
        let mut guard = self.inner.lock().await;
        if !guard.phase.accepts_input() {
            return Err(ControllerError::InputNotAccepted { phase: guard.phase });
        }
        let known = guard
            .loaded
            .as_ref()
            .is_some_and(|l| l.images.iter().any(|img| &img.session_image_id == image_id));
        if !known {
            return Err(ControllerError::UnknownImage(image_id.clone()));
        }
        let stored = truncate_prompt(text);
        guard.prompts.insert(image_id.clone(), stored.clone());
        Ok(stored)
    }

    /// Sends every prompt of the stage as one batch and applies the verdict.
    pub async fn submit_stage(&self) -> Result<SubmitOutcome, ControllerError> {
        let (generation, stage, request) = {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            match state.phase {
                Phase::Active => {}
                Phase::Submitting => {
                    debug!(session_id = %self.session_id, "submit ignored: already submitting");
                    return Ok(SubmitOutcome::AlreadySubmitting);
                }
                Phase::Closed => return Err(ControllerError::Closed),
                phase => {
                    return Err(ControllerError::InvalidPhase {
                        action: "submit",
                        phase,
                    })
                }
            }
            let Some(loaded) = state.loaded.as_ref() else {
                return Err(ControllerError::InvalidPhase {
                    action: "submit",
                    phase: state.phase,
                });
            };

            let prompts = &state.prompts;
            let prompt_for = |id: &SessionImageId| {
                prompts
                    .get(id)
                    .map(|p| p.trim().to_string())
                    .unwrap_or_default()
            };
            let missing: Vec<SessionImageId> = loaded
                .images
                .iter()
                .filter(|img| prompt_for(&img.session_image_id).is_empty())
                .map(|img| img.session_image_id.clone())
                .collect();
            if !missing.is_empty() {
                let err = ControllerError::Validation { missing };
                state.last_error = Some(err.player_message());
                return Err(err);
            }

            let items = loaded
                .images
                .iter()
                .map(|img| SubmitItem {
                    session_image_id: img.session_image_id.clone(),
                    user_prompt: prompt_for(&img.session_image_id),
                })
                .collect();
            let stage = loaded.stage;
            state.phase = Phase::Submitting;
            state.last_error = None;
            (state.generation, stage, SubmitStageRequest { items })
        };

        info!(
            session_id = %self.session_id,
            %stage,
            items = request.items.len(),
            "submitting stage"
        );
        let result = self.api.submit_stage(&self.session_id, &request).await;

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!(session_id = %self.session_id, "discarding late submission result");
            return Err(discarded(&guard));
        }

        let verdict = match result {
            Ok(verdict) => verdict,
            Err(err) => {
                let err = ControllerError::submit(err);
                let message = err.player_message();
                warn!(session_id = %self.session_id, %stage, error = %err, "stage submission failed");
                guard.phase = Phase::Active;
                guard.last_error = Some(message.clone());
                self.emit(ControllerEvent::Error(message));
                return Err(err);
            }
        };

        self.record_progress(verdict.images_completed());
        guard.last_matches = verdict.matches().to_vec();

        let outcome = match verdict {
            Verdict::Eliminated { details, .. } => {
                info!(
                    session_id = %self.session_id,
                    %stage,
                    eliminated_at = details.eliminated_at.as_deref().unwrap_or(""),
                    "player eliminated"
                );
                guard.phase = Phase::Eliminated;
                guard.elimination = Some(details.clone());
                self.emit(ControllerEvent::Eliminated(details.clone()));
                SubmitOutcome::Eliminated(details)
            }
            Verdict::Passed {
                next_stage: NextStage::Done,
                matches,
                ..
            } => {
                info!(session_id = %self.session_id, %stage, "challenge completed");
                guard.phase = Phase::Completed;
                self.emit(ControllerEvent::Completed {
                    matches: matches.clone(),
                });
                SubmitOutcome::Completed { matches }
            }
            Verdict::Passed {
                next_stage,
                matches,
                ..
            } => {
                if next_stage != stage.next() {
                    warn!(
                        session_id = %self.session_id,
                        %stage,
                        %next_stage,
                        "server moved the session out of tier order"
                    );
                }
                info!(session_id = %self.session_id, %stage, %next_stage, "stage cleared");
                guard.phase = Phase::Cleared { next_stage };
                self.emit(ControllerEvent::StageCleared {
                    stage,
                    next_stage,
                    message: stage.cleared_message(),
                    matches: matches.clone(),
                });
                SubmitOutcome::Cleared {
                    stage,
                    next_stage,
                    matches,
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
