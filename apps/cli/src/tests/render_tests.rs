use super::*;
use shared::{
    domain::{SessionId, SessionImageId, Stage},
    protocol::ResultImage,
};

fn row(name: &str, state: LifecycleState, score: f64, eliminated_at: Option<&str>) -> LeaderboardRow {
    LeaderboardRow {
        display_name: name.to_string(),
        state,
        total_score: score,
        eliminated_at: eliminated_at.map(str::to_string),
        created_at: None,
    }
}

#[test]
fn match_lines_flag_scores_against_stage_threshold() {
    let lines = match_lines(&[
        Match {
            stage_order: 1,
            level: Stage::Easy,
            score: 70.0,
            points: 12,
        },
        Match {
            stage_order: 4,
            level: Stage::Hard,
            score: 84.9,
            points: 30,
        },
    ]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("(pass)"), "{}", lines[0]);
    assert!(lines[0].contains("+12 pts"));
    assert!(lines[1].contains("(below)"), "{}", lines[1]);
}

#[test]
fn elimination_shows_server_fields() {
    let text = elimination(&Elimination {
        eliminated_at: Some("medium-2".to_string()),
        eliminated_prompt: Some("a lighthouse in fog".to_string()),
        eliminated_image_url: None,
        matches: Vec::new(),
    });
    assert_eq!(
        text,
        "Eliminated at medium-2.\n  Reference prompt: a lighthouse in fog"
    );
}

#[test]
fn redirect_describes_finished_session() {
    let completed = Redirect {
        session_id: SessionId::new("sess-1"),
        state: LifecycleState::Completed,
        eliminated_at: None,
        total_score: Some(171.0),
        images_completed: Some(5),
    };
    assert_eq!(redirect(&completed), "Session already completed with 171.0 points.");

    let eliminated = Redirect {
        state: LifecycleState::Eliminated,
        eliminated_at: Some("medium".to_string()),
        total_score: None,
        ..completed
    };
    assert_eq!(redirect(&eliminated), "Session already ended: eliminated at medium.");
}

#[test]
fn results_list_images_in_stage_order() {
    let status = StatusResponse {
        state: LifecycleState::Eliminated,
        current_stage: Some(StagePointer::Medium),
        images_completed: Some(1),
        total_score: Some(10.0),
        eliminated_at: Some("medium-1".to_string()),
        images: vec![
            ResultImage {
                session_image_id: SessionImageId::new("si-2"),
                stage_order: 2,
                level: Stage::Medium,
                stage_name: Some(StagePointer::Medium),
                score: None,
                image_id: None,
                image_url: "/static/medium/2.png".to_string(),
                user_prompt: None,
            },
            ResultImage {
                session_image_id: SessionImageId::new("si-1"),
                stage_order: 1,
                level: Stage::Easy,
                stage_name: Some(StagePointer::Easy),
                score: Some(82.0),
                image_id: None,
                image_url: "/static/easy/1.png".to_string(),
                user_prompt: Some("a red bicycle on grass".to_string()),
            },
        ],
    };

    let text = results(&status);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "State: eliminated");
    assert_eq!(lines[1], "Total score: 10.0");
    assert_eq!(lines[2], "Eliminated at: medium-1");
    assert_eq!(lines[3], "Progress: 1/5 images");
    assert!(lines[4].starts_with("  #1 easy"));
    assert!(lines[4].ends_with("a red bicycle on grass"));
    assert!(lines[5].starts_with("  #2 medium"));
    assert!(lines[5].contains('-'));
}

#[test]
fn leaderboard_ranks_rows_as_given() {
    let text = leaderboard(&[
        row("maverick", LifecycleState::Completed, 180.0, None),
        row("goose", LifecycleState::Eliminated, 42.5, Some("hard-1")),
    ]);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("  1. maverick"));
    assert!(lines[0].ends_with("completed"));
    assert!(lines[1].starts_with("  2. goose"));
    assert!(lines[1].ends_with("eliminated at hard-1"));

    assert_eq!(leaderboard(&[]), "No finished sessions yet.");
}

#[test]
fn results_of_running_session_name_the_current_stage() {
    let status = StatusResponse {
        state: LifecycleState::Active,
        current_stage: Some(StagePointer::Hard),
        images_completed: Some(3),
        total_score: None,
        eliminated_at: None,
        images: Vec::new(),
    };
    assert_eq!(
        results(&status),
        "State: active\nCurrent stage: Hard\nProgress: 3/5 images"
    );

    let done = StatusResponse {
        state: LifecycleState::Completed,
        current_stage: Some(StagePointer::Done),
        ..status
    };
    assert!(!results(&done).contains("Current stage"));
}
