//! Plain-text views for the terminal.

use std::fmt::Write as _;

use client_core::{Redirect, StageSnapshot};
use shared::{
    domain::{LifecycleState, StagePointer, TOTAL_IMAGES},
    protocol::{Elimination, LeaderboardRow, Match, StatusResponse},
};

pub fn progress_line(images_completed: u32) -> String {
    format!("Progress: {images_completed}/{TOTAL_IMAGES} images")
}

pub fn stage_header(snapshot: &StageSnapshot) -> String {
    let Some(stage) = snapshot.stage else {
        return "No stage loaded".to_string();
    };
    format!(
        "== {} stage: describe {} image(s), pass mark {:.0} ==",
        stage.label(),
        snapshot.total,
        stage.pass_threshold()
    )
}

pub fn match_lines(matches: &[Match]) -> Vec<String> {
    matches
        .iter()
        .map(|m| {
            let verdict = if m.level.passes(m.score) { "pass" } else { "below" };
            format!(
                "  #{} {:<6} score {:>5.1} ({verdict})  +{} pts",
                m.stage_order, m.level.as_str(), m.score, m.points
            )
        })
        .collect()
}

pub fn elimination(details: &Elimination) -> String {
    let mut out = String::from("Eliminated");
    if let Some(at) = &details.eliminated_at {
        let _ = write!(out, " at {at}");
    }
    out.push('.');
    if let Some(prompt) = &details.eliminated_prompt {
        let _ = write!(out, "\n  Reference prompt: {prompt}");
    }
    if let Some(url) = &details.eliminated_image_url {
        let _ = write!(out, "\n  Image: {url}");
    }
    out
}

pub fn redirect(redirect: &Redirect) -> String {
    match redirect.state {
        LifecycleState::Completed => match redirect.total_score {
            Some(score) => format!("Session already completed with {score:.1} points."),
            None => "Session already completed.".to_string(),
        },
        _ => match &redirect.eliminated_at {
            Some(at) => format!("Session already ended: eliminated at {at}."),
            None => "Session already ended.".to_string(),
        },
    }
}

pub fn results(status: &StatusResponse) -> String {
    let mut out = format!("State: {}", status.state);
    if status.state == LifecycleState::Active {
        if let Some(stage) = status.current_stage.and_then(StagePointer::stage) {
            let _ = write!(out, "\nCurrent stage: {}", stage.label());
        }
    }
    if let Some(score) = status.total_score {
        let _ = write!(out, "\nTotal score: {score:.1}");
    }
    if let Some(at) = &status.eliminated_at {
        let _ = write!(out, "\nEliminated at: {at}");
    }
    if let Some(done) = status.images_completed {
        let _ = write!(out, "\n{}", progress_line(done));
    }
    let mut images: Vec<_> = status.images.iter().collect();
    images.sort_by_key(|img| img.stage_order);
    for img in images {
        let score = img
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let prompt = img.user_prompt.as_deref().unwrap_or("");
        let _ = write!(
            out,
            "\n  #{} {:<6} {:>5}  {prompt}",
            img.stage_order,
            img.level.as_str(),
            score
        );
    }
    out
}

pub fn leaderboard(rows: &[LeaderboardRow]) -> String {
    if rows.is_empty() {
        return "No finished sessions yet.".to_string();
    }
    let mut out = String::new();
    for (rank, row) in rows.iter().enumerate() {
        let outcome = match (&row.state, &row.eliminated_at) {
            (LifecycleState::Eliminated, Some(at)) => format!("eliminated at {at}"),
            (state, _) => state.to_string(),
        };
        if rank > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{:>3}. {:<20} {:>7.1}  {outcome}",
            rank + 1,
            row.display_name,
            row.total_score
        );
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
