// End-to-end game flow tests driving the room service and game controller
// through the same public API the HTTP handlers use.

use std::sync::Arc;
use std::time::Duration;

use quizclash::room::models::{Phase, QuestionDraft, QuestionKind, RevealStage, RoomModel};
use quizclash::room::repository::InMemoryRoomRepository;
use quizclash::{AppError, AppState, EventBus, WritingSettings};

fn new_state() -> AppState {
    AppState::new(Arc::new(InMemoryRoomRepository::new()), EventBus::new())
}

fn default_settings() -> WritingSettings {
    WritingSettings {
        writing_timer_seconds: 600,
        question_timer_seconds: 20,
        max_questions: None,
    }
}

fn tf_draft(text: &str, correct_index: usize) -> QuestionDraft {
    QuestionDraft {
        text: text.to_string(),
        kind: QuestionKind::TrueFalse,
        options: vec!["True".to_string(), "False".to_string()],
        correct_index,
    }
}

fn assert_score_invariant(room: &RoomModel) {
    for (id, player) in &room.players {
        assert_eq!(
            player.score,
            player.answering_score + player.author_score,
            "score invariant broken for {}",
            id
        );
    }
}

/// Creates a room with three joined players and runs it to the start of
/// the quiz with one question from p_a and one from p_b.
async fn game_ready_to_quiz(state: &AppState) -> String {
    let room = state
        .room_service
        .create_room("h_host".to_string())
        .await
        .unwrap();
    let code = room.code.clone();

    for (id, name) in [("p_a", "Alice"), ("p_b", "Bob"), ("p_c", "Cara")] {
        state
            .room_service
            .join_room(&code, id.to_string(), name.to_string(), None)
            .await
            .unwrap();
    }

    state
        .controller
        .start_writing(&code, "h_host", default_settings())
        .await
        .unwrap();
    state
        .controller
        .submit_question(&code, "p_a", tf_draft("Alice's question?", 0))
        .await
        .unwrap();
    state
        .controller
        .submit_question(&code, "p_b", tf_draft("Bob's question?", 1))
        .await
        .unwrap();

    state
        .controller
        .end_writing_early(&code, "h_host")
        .await
        .unwrap();
    state.controller.start_quiz(&code, "h_host").await.unwrap();

    code
}

#[tokio::test]
async fn test_full_round_trip_preserves_score_invariant() {
    let state = new_state();
    let code = game_ready_to_quiz(&state).await;

    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Quiz);
    let quiz = room.quiz.as_ref().unwrap();
    assert_eq!(quiz.question_order.len(), 2);

    // Play both questions: every non-author answers, one of them correctly.
    for _ in 0..2 {
        let room = state.room_service.get_room(&code).await.unwrap();
        let question_id = room.current_question_id().unwrap().to_string();
        let question = &room.questions[&question_id];
        let correct = question.correct_index;
        let wrong = 1 - correct;

        let mut answered_correctly = false;
        for player in ["p_a", "p_b", "p_c"] {
            if player == question.author_id {
                continue;
            }
            let index = if answered_correctly { wrong } else { correct };
            answered_correctly = true;
            state
                .controller
                .submit_answer(&code, player, &question_id, index)
                .await
                .unwrap();
        }

        // Resolve and check the invariant after every resolution
        state
            .controller
            .force_next_question(&code, "h_host")
            .await
            .unwrap();
        let room = state.room_service.get_room(&code).await.unwrap();
        assert!(room.quiz.as_ref().unwrap().showing_results);
        assert_score_invariant(&room);

        // Exactly one correct non-author answer: the author earned 1000
        let author = &room.players[&question.author_id];
        assert!(author.author_score >= 1000);

        state
            .controller
            .force_next_question(&code, "h_host")
            .await
            .unwrap();
    }

    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Results);
    assert_eq!(
        room.settings.reveal_stage,
        Some(RevealStage::RunningLeaderboard)
    );
    assert_score_invariant(&room);

    // The question order never changed once the quiz started
    assert_eq!(room.quiz.as_ref().unwrap().question_order.len(), 2);
}

#[tokio::test]
async fn test_awards_reveal_applies_bonuses_exactly_once() {
    let state = new_state();
    let code = game_ready_to_quiz(&state).await;

    // Run the quiz with p_c always correct, the other non-author wrong.
    for _ in 0..2 {
        let room = state.room_service.get_room(&code).await.unwrap();
        let question_id = room.current_question_id().unwrap().to_string();
        let question = &room.questions[&question_id];
        for player in ["p_a", "p_b", "p_c"] {
            if player == question.author_id {
                continue;
            }
            let index = if player == "p_c" {
                question.correct_index
            } else {
                1 - question.correct_index
            };
            state
                .controller
                .submit_answer(&code, player, &question_id, index)
                .await
                .unwrap();
        }
        state
            .controller
            .force_next_question(&code, "h_host")
            .await
            .unwrap();
        state
            .controller
            .force_next_question(&code, "h_host")
            .await
            .unwrap();
    }

    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Results);
    let awards = room.awards.clone().unwrap();
    // Both authors wrote one question; the tie breaks to the lowest id
    assert_eq!(awards.prolific.as_deref(), Some("p_a"));
    // Both authors have a 0.5 mean correct fraction; same tie-break
    assert_eq!(awards.challenging.as_deref(), Some("p_a"));

    let before = room.players["p_a"].score;

    // Reveal everything
    for expected_stage in [
        RevealStage::ProlificAuthor,
        RevealStage::ChallengingAuthor,
        RevealStage::Podium,
    ] {
        let room = state
            .controller
            .advance_reveal_stage(&code, "h_host")
            .await
            .unwrap();
        assert_eq!(room.settings.reveal_stage, Some(expected_stage));
    }

    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.players["p_a"].score, before + 5000);
    assert_eq!(room.settings.prolific_winner_id.as_deref(), Some("p_a"));
    assert_eq!(room.settings.challenging_winner_id.as_deref(), Some("p_a"));
    assert_score_invariant(&room);

    // Advancing past the podium changes nothing
    let room = state
        .controller
        .advance_reveal_stage(&code, "h_host")
        .await
        .unwrap();
    assert_eq!(room.settings.reveal_stage, Some(RevealStage::Podium));
    assert_eq!(room.players["p_a"].score, before + 5000);
}

#[tokio::test]
async fn test_duplicate_answer_race_first_wins() {
    let state = new_state();
    let code = game_ready_to_quiz(&state).await;

    let room = state.room_service.get_room(&code).await.unwrap();
    let question_id = room.current_question_id().unwrap().to_string();
    let question = &room.questions[&question_id];
    let answerer = if question.author_id == "p_c" { "p_b" } else { "p_c" };

    // Two concurrent submissions for the same player and question: exactly
    // one is recorded.
    let tasks: Vec<_> = [0usize, 1usize]
        .into_iter()
        .map(|index| {
            let controller = Arc::clone(&state.controller);
            let code = code.clone();
            let question_id = question_id.clone();
            let answerer = answerer.to_string();
            tokio::spawn(async move {
                controller
                    .submit_answer(&code, &answerer, &question_id, index)
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    let outcomes: Vec<Result<RoomModel, AppError>> =
        results.into_iter().map(|r| r.unwrap()).collect();
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::Conflict(_)))));

    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.answers[&question_id].len(), 1);
}

#[tokio::test]
async fn test_disconnected_player_is_scored_as_absent() {
    let state = new_state();
    let code = game_ready_to_quiz(&state).await;

    // p_c never answers and goes offline mid-question
    state
        .room_service
        .set_connected(&code, "p_c", false)
        .await
        .unwrap();

    let room = state.room_service.get_room(&code).await.unwrap();
    let question_id = room.current_question_id().unwrap().to_string();
    let question = &room.questions[&question_id];
    let other_answerer = if question.author_id == "p_a" { "p_b" } else { "p_a" };
    state
        .controller
        .submit_answer(&code, other_answerer, &question_id, question.correct_index)
        .await
        .unwrap();

    state
        .controller
        .force_next_question(&code, "h_host")
        .await
        .unwrap();

    let room = state.room_service.get_room(&code).await.unwrap();
    let p_c = &room.players["p_c"];
    // Still present, still ranked, scored as a non-answer
    assert_eq!(p_c.score, 0);
    assert_eq!(p_c.streak, 0);
    assert!(!p_c.connected);
    // Two non-author results (one correct, one absent) -> author gets 1000
    let author = &room.players[&question.author_id];
    assert_eq!(author.author_score, 1000);
    assert_score_invariant(&room);
}

#[tokio::test(start_paused = true)]
async fn test_timer_driven_game_without_host_intervention() {
    let state = new_state();
    let room = state
        .room_service
        .create_room("h_host".to_string())
        .await
        .unwrap();
    let code = room.code.clone();

    for id in ["p_a", "p_b"] {
        state
            .room_service
            .join_room(&code, id.to_string(), id.to_string(), None)
            .await
            .unwrap();
    }

    state
        .controller
        .start_writing(
            &code,
            "h_host",
            WritingSettings {
                writing_timer_seconds: 30,
                question_timer_seconds: 10,
                max_questions: None,
            },
        )
        .await
        .unwrap();
    state
        .controller
        .submit_question(&code, "p_a", tf_draft("Only question?", 0))
        .await
        .unwrap();

    // The writing deadline fires on its own
    tokio::time::sleep(Duration::from_secs(31)).await;
    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Review);

    state.controller.start_quiz(&code, "h_host").await.unwrap();

    // Nobody answers; the question deadline and the reveal delay both fire
    // on their own and the quiz completes.
    tokio::time::sleep(Duration::from_secs(11)).await;
    let room = state.room_service.get_room(&code).await.unwrap();
    assert!(room.quiz.as_ref().unwrap().showing_results);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Results);
    // One non-author player who never answered: sample too small, no
    // author points
    assert_eq!(room.players["p_a"].score, 0);
    assert_eq!(room.players["p_b"].score, 0);
    assert_score_invariant(&room);
}

#[tokio::test]
async fn test_event_stream_reports_committed_mutations() {
    let state = new_state();
    let room = state
        .room_service
        .create_room("h_host".to_string())
        .await
        .unwrap();
    let code = room.code.clone();
    let mut events = state.event_bus.subscribe_to_room(&code).await;

    state
        .room_service
        .join_room(&code, "p_a".to_string(), "Alice".to_string(), None)
        .await
        .unwrap();
    state
        .controller
        .start_writing(&code, "h_host", default_settings())
        .await
        .unwrap();
    state
        .controller
        .submit_question(&code, "p_a", tf_draft("Q?", 0))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.event_type().to_string());
    }
    assert_eq!(seen, vec!["player_joined", "phase_changed", "question_submitted"]);

    // Rejected actions emit nothing
    let result = state
        .controller
        .start_quiz(&code, "h_host")
        .await;
    assert!(result.is_err());
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_phase_guards_reject_out_of_order_actions() {
    let state = new_state();
    let room = state
        .room_service
        .create_room("h_host".to_string())
        .await
        .unwrap();
    let code = room.code.clone();
    state
        .room_service
        .join_room(&code, "p_a".to_string(), "Alice".to_string(), None)
        .await
        .unwrap();

    // Cannot submit questions from the lobby
    let result = state
        .controller
        .submit_question(&code, "p_a", tf_draft("Too early?", 0))
        .await;
    assert!(matches!(result.unwrap_err(), AppError::WrongPhase(_)));

    // Cannot start the quiz from the lobby
    let result = state.controller.start_quiz(&code, "h_host").await;
    assert!(matches!(result.unwrap_err(), AppError::WrongPhase(_)));

    // Cannot answer outside the quiz
    let result = state
        .controller
        .submit_answer(&code, "p_a", "q_whatever", 0)
        .await;
    assert!(matches!(result.unwrap_err(), AppError::WrongPhase(_)));

    // Cannot advance the reveal before results
    let result = state.controller.advance_reveal_stage(&code, "h_host").await;
    assert!(matches!(result.unwrap_err(), AppError::WrongPhase(_)));

    // Nothing above corrupted the room
    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Lobby);
    assert!(room.questions.is_empty());
    assert!(room.answers.is_empty());
}

#[tokio::test]
async fn test_kicked_player_keeps_their_question_in_play() {
    let state = new_state();
    let code = game_ready_to_quiz(&state).await;

    // Kick p_a; their authored question stays in the order and remains
    // scoreable.
    state
        .room_service
        .kick_player(&code, "h_host", "p_a")
        .await
        .unwrap();

    let room = state.room_service.get_room(&code).await.unwrap();
    assert!(!room.has_player("p_a"));
    assert!(room
        .questions
        .values()
        .any(|question| question.author_id == "p_a"));

    // Play through both questions without any answers
    for _ in 0..2 {
        state
            .controller
            .force_next_question(&code, "h_host")
            .await
            .unwrap();
        state
            .controller
            .force_next_question(&code, "h_host")
            .await
            .unwrap();
    }

    let room = state.room_service.get_room(&code).await.unwrap();
    assert_eq!(room.phase(), Phase::Results);
    assert_score_invariant(&room);
}
