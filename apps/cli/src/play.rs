//! Interactive stage loop on stdin/stdout.

use std::sync::Arc;

use anyhow::{bail, Context};
use client_core::{
    ControllerError, ControllerEvent, GameApi, LoadOutcome, StageController, StageSnapshot,
    SubmitOutcome,
};
use shared::domain::{SessionId, SessionImageId};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info};

use crate::{config::Settings, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayEnd {
    Eliminated,
    Completed,
    /// Session had already finished before this run could play a stage.
    Redirected,
}

/// Line-oriented player input; stdin unless built from another reader.
pub struct Console<R = BufReader<Stdin>> {
    lines: Lines<R>,
}

impl Console {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    async fn ask(&mut self, question: &str) -> anyhow::Result<String> {
        println!("{question}");
        match self.lines.next_line().await.context("failed to read stdin")? {
            Some(line) => Ok(line),
            None => bail!("input closed"),
        }
    }

    async fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        let answer = self.ask(&format!("{question} [Y/n]")).await?;
        Ok(!matches!(answer.trim(), "n" | "N" | "no"))
    }
}

/// Prints progress updates as the controller publishes them.
fn spawn_progress_printer(controller: &StageController) -> tokio::task::JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::ProgressUpdated { images_completed }) => {
                    println!("{}", render::progress_line(images_completed));
                }
                Ok(ControllerEvent::Error(message)) => debug!(%message, "controller error event"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[derive(Clone, Copy)]
enum Next {
    Load,
    Advance,
}

pub async fn run<R: AsyncBufRead + Unpin>(
    api: Arc<dyn GameApi>,
    settings: &Settings,
    session_id: SessionId,
    console: &mut Console<R>,
) -> anyhow::Result<PlayEnd> {
    let controller = StageController::new(session_id, api);
    let printer = spawn_progress_printer(&controller);

    let result = tokio::select! {
        result = play_stages(&controller, settings, console) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!(session_id = %controller.session_id(), "interrupted; leaving session");
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    controller.close().await;
    printer.abort();
    result
}

async fn play_stages<R: AsyncBufRead + Unpin>(
    controller: &StageController,
    settings: &Settings,
    console: &mut Console<R>,
) -> anyhow::Result<PlayEnd> {
    let mut next = Next::Load;
    loop {
        let loaded = match next {
            Next::Load => controller.load_stage().await,
            Next::Advance => controller.advance().await,
        };
        let snapshot = match loaded {
            Ok(LoadOutcome::Ready(snapshot)) => snapshot,
            Ok(LoadOutcome::Redirect(redirect)) => {
                println!("{}", render::redirect(&redirect));
                return Ok(PlayEnd::Redirected);
            }
            Err(err) if err.is_retryable() => {
                println!("{}", err.player_message());
                if console.confirm("Retry?").await? {
                    next = Next::Load;
                    continue;
                }
                bail!(err);
            }
            Err(err) => bail!(err.player_message()),
        };

        match play_stage(controller, settings, console, snapshot).await? {
            SubmitOutcome::Cleared {
                stage, matches, ..
            } => {
                for line in render::match_lines(&matches) {
                    println!("{line}");
                }
                println!("{}", stage.cleared_message());
                console.ask("Press enter to continue.").await?;
                next = Next::Advance;
            }
            SubmitOutcome::Eliminated(details) => {
                for line in render::match_lines(&details.matches) {
                    println!("{line}");
                }
                println!("{}", render::elimination(&details));
                return Ok(PlayEnd::Eliminated);
            }
            SubmitOutcome::Completed { matches } => {
                for line in render::match_lines(&matches) {
                    println!("{line}");
                }
                println!("You did it! All stages cleared.");
                return Ok(PlayEnd::Completed);
            }
            SubmitOutcome::AlreadySubmitting => {
                bail!("a submission is already in flight for this session")
            }
        }
    }
}

/// Collects a prompt per image and submits until the server returns a verdict.
async fn play_stage<R: AsyncBufRead + Unpin>(
    controller: &StageController,
    settings: &Settings,
    console: &mut Console<R>,
    snapshot: StageSnapshot,
) -> anyhow::Result<SubmitOutcome> {
    println!("{}", render::stage_header(&snapshot));
    let mut pending: Vec<SessionImageId> = snapshot
        .images
        .iter()
        .map(|img| img.session_image_id.clone())
        .collect();

    loop {
        for image_id in &pending {
            let Some(image) = snapshot
                .images
                .iter()
                .find(|img| &img.session_image_id == image_id)
            else {
                continue;
            };
            let text = console
                .ask(&format!(
                    "Image {}: {}\nDescribe it:",
                    image.stage_order,
                    settings.image_link(&image.image_url)
                ))
                .await?;
            controller
                .set_prompt(image_id, &text)
                .await
                .map_err(|err| anyhow::anyhow!(err.player_message()))?;
        }

        match controller.submit_stage().await {
            Ok(outcome) => return Ok(outcome),
            Err(ControllerError::Validation { missing }) => {
                println!("Please enter a prompt for every image.");
                pending = missing;
            }
            Err(err) if err.is_retryable() => {
                println!("{}", err.player_message());
                if !console.confirm("Submit again?").await? {
                    bail!(err);
                }
                pending.clear();
            }
            Err(err) => bail!(err.player_message()),
        }
    }
}

#[cfg(test)]
#[path = "tests/play_tests.rs"]
mod tests;
