use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::scoring;
use super::timers::{TimerKind, TimerRegistry};
use crate::event::{EventBus, RoomEvent};
use crate::identity;
use crate::room::locks::RoomLocks;
use crate::room::models::{now_ms, AwardWinners, Phase, QuestionDraft, QuizRun, RevealStage, RoomModel};
use crate::room::repository::RoomRepository;
use crate::room::service::ensure_host;
use crate::shared::AppError;

/// Seconds a resolved question stays on screen before auto-advancing.
pub const REVEAL_DELAY_SECONDS: u64 = 5;
/// Flat bonus applied to each author award winner.
pub const AWARD_BONUS: i64 = 2500;

/// Host-chosen settings when the writing phase starts.
#[derive(Debug, Clone, Deserialize)]
pub struct WritingSettings {
    pub writing_timer_seconds: u32,
    pub question_timer_seconds: u32,
    pub max_questions: Option<usize>,
}

/// The game session state machine.
///
/// Owns every transition of LOBBY -> WRITING -> REVIEW -> QUIZ -> RESULTS,
/// question resolution and scoring, and the award reveal. Each mutating
/// action holds the room's action lock for its full load-mutate-store
/// cycle; timer callbacks go through the same lock and re-validate phase
/// and question index before applying anything, so a timer that lost a
/// race to a host action degrades to a no-op instead of double-scoring.
pub struct GameController {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    event_bus: EventBus,
    locks: Arc<RoomLocks>,
    timers: TimerRegistry,
    /// Handle to the owning Arc, used to move a controller reference into
    /// scheduled timer tasks.
    self_ref: Weak<GameController>,
}

impl GameController {
    pub fn new(
        repository: Arc<dyn RoomRepository + Send + Sync>,
        event_bus: EventBus,
        locks: Arc<RoomLocks>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            repository,
            event_bus,
            locks,
            timers: TimerRegistry::new(),
            self_ref: self_ref.clone(),
        })
    }

    // ----- WRITING -----

    /// LOBBY -> WRITING. Stores the host's timer settings and starts the
    /// writing countdown.
    #[instrument(skip(self))]
    pub async fn start_writing(
        &self,
        room_code: &str,
        host_id: &str,
        settings: WritingSettings,
    ) -> Result<RoomModel, AppError> {
        if settings.writing_timer_seconds == 0 {
            return Err(AppError::Validation(
                "Writing timer must be at least one second".to_string(),
            ));
        }
        if settings.question_timer_seconds == 0 {
            return Err(AppError::Validation(
                "Question timer must be at least one second".to_string(),
            ));
        }
        if settings.max_questions == Some(0) {
            return Err(AppError::Validation(
                "Max questions must be at least one".to_string(),
            ));
        }

        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;
        if room.phase() != Phase::Lobby {
            return Err(AppError::WrongPhase(
                "Writing can only start from the lobby".to_string(),
            ));
        }
        if room.connected_player_count() == 0 {
            return Err(AppError::Validation(
                "At least one connected player is required".to_string(),
            ));
        }

        room.settings.phase = Phase::Writing;
        room.settings.writing_timer_seconds = settings.writing_timer_seconds;
        room.settings.question_timer_seconds = settings.question_timer_seconds;
        room.settings.max_questions = settings.max_questions;
        self.repository.update_room(&room).await?;

        info!(room_code = %room_code, "Writing phase started");
        self.emit_phase_changed(room_code, Phase::Writing).await;

        if let Some(controller) = self.self_ref.upgrade() {
            let code = room_code.to_string();
            self.timers.schedule(
                room_code,
                TimerKind::WritingDeadline,
                Duration::from_secs(settings.writing_timer_seconds as u64),
                async move {
                    controller.writing_deadline_elapsed(&code).await;
                },
            );
        }

        Ok(room)
    }

    /// Timer callback for the writing countdown. No-op unless the room is
    /// still writing; the host may already have ended the phase early.
    #[instrument(skip(self))]
    pub async fn writing_deadline_elapsed(&self, room_code: &str) {
        let _guard = self.locks.acquire(room_code).await;
        let Ok(Some(mut room)) = self.repository.get_room(room_code).await else {
            return;
        };
        if room.phase() != Phase::Writing {
            debug!(room_code = %room_code, "Stale writing deadline ignored");
            return;
        }

        room.settings.phase = Phase::Review;
        if self.repository.update_room(&room).await.is_err() {
            return;
        }
        info!(room_code = %room_code, "Writing deadline elapsed, moving to review");
        self.emit_phase_changed(room_code, Phase::Review).await;
    }

    /// Host pre-empts the writing countdown. Converges with the deadline on
    /// the same transition: whichever fires first wins, the other no-ops.
    #[instrument(skip(self))]
    pub async fn end_writing_early(
        &self,
        room_code: &str,
        host_id: &str,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;

        match room.phase() {
            // The deadline already fired; nothing left to do.
            Phase::Review => return Ok(room),
            Phase::Writing => {}
            _ => {
                return Err(AppError::WrongPhase(
                    "No writing phase to end".to_string(),
                ))
            }
        }

        self.timers.cancel(room_code, TimerKind::WritingDeadline);
        room.settings.phase = Phase::Review;
        self.repository.update_room(&room).await?;

        info!(room_code = %room_code, "Writing ended early by host");
        self.emit_phase_changed(room_code, Phase::Review).await;
        Ok(room)
    }

    /// Accepts a player's question during the writing phase.
    #[instrument(skip(self, draft))]
    pub async fn submit_question(
        &self,
        room_code: &str,
        player_id: &str,
        draft: QuestionDraft,
    ) -> Result<(String, RoomModel), AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        if room.phase() != Phase::Writing {
            return Err(AppError::WrongPhase(
                "Questions can only be submitted during the writing phase".to_string(),
            ));
        }
        if !room.has_player(player_id) {
            return Err(AppError::NotFound("Player not in room".to_string()));
        }
        draft.validate().map_err(AppError::Validation)?;

        let question_id = identity::question_id();
        room.questions
            .insert(question_id.clone(), draft.into_question(player_id.to_string()));
        self.repository.update_room(&room).await?;

        debug!(
            room_code = %room_code,
            question_id = %question_id,
            author_id = %player_id,
            "Question submitted"
        );
        self.event_bus
            .emit(RoomEvent::QuestionSubmitted {
                room_code: room_code.to_string(),
                question_id: question_id.clone(),
                author_id: player_id.to_string(),
                question_count: room.questions.len(),
            })
            .await;

        Ok((question_id, room))
    }

    // ----- REVIEW -----

    /// Host removes a question during review. Deleting an unknown id is a
    /// no-op so a double-click cannot fail.
    #[instrument(skip(self))]
    pub async fn delete_question(
        &self,
        room_code: &str,
        host_id: &str,
        question_id: &str,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;
        if room.phase() != Phase::Review {
            return Err(AppError::WrongPhase(
                "Questions can only be deleted during review".to_string(),
            ));
        }

        if room.questions.remove(question_id).is_some() {
            self.repository.update_room(&room).await?;
            self.event_bus
                .emit(RoomEvent::QuestionDeleted {
                    room_code: room_code.to_string(),
                    question_id: question_id.to_string(),
                    question_count: room.questions.len(),
                })
                .await;
        }
        Ok(room)
    }

    // ----- QUIZ -----

    /// REVIEW -> QUIZ. Fixes the shuffled question order (truncated to
    /// `max_questions` when set) and starts the first question.
    #[instrument(skip(self))]
    pub async fn start_quiz(
        &self,
        room_code: &str,
        host_id: &str,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;
        if room.phase() != Phase::Review {
            return Err(AppError::WrongPhase(
                "The quiz can only start from review".to_string(),
            ));
        }
        if room.questions.is_empty() {
            return Err(AppError::Validation(
                "No questions to play".to_string(),
            ));
        }

        let ids: Vec<String> = room.questions.keys().cloned().collect();
        let mut order = scoring::shuffled(&ids);
        if let Some(max) = room.settings.max_questions {
            if order.len() > max {
                order.truncate(max);
            }
        }
        let total_questions = order.len();

        room.quiz = Some(QuizRun {
            current_question_index: 0,
            question_order: order,
            current_question_start_ms: now_ms(),
            showing_results: false,
        });
        room.settings.phase = Phase::Quiz;
        self.repository.update_room(&room).await?;

        info!(room_code = %room_code, total_questions, "Quiz started");
        self.emit_phase_changed(room_code, Phase::Quiz).await;
        self.event_bus
            .emit(RoomEvent::QuizStarted {
                room_code: room_code.to_string(),
                total_questions,
            })
            .await;

        self.schedule_question_deadline(room_code, room.settings.question_timer_seconds, 0);
        Ok(room)
    }

    /// Records a player's answer to the current question. First submission
    /// wins; later ones are rejected. The author's own answer is accepted
    /// (it shows in the distribution) but never scored.
    #[instrument(skip(self))]
    pub async fn submit_answer(
        &self,
        room_code: &str,
        player_id: &str,
        question_id: &str,
        answer_index: usize,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        if room.phase() != Phase::Quiz {
            return Err(AppError::WrongPhase(
                "Answers are only accepted during the quiz".to_string(),
            ));
        }
        let quiz = room
            .quiz
            .as_ref()
            .ok_or(AppError::Internal)?;
        if quiz.showing_results {
            return Err(AppError::WrongPhase(
                "Answers are closed for this question".to_string(),
            ));
        }
        if room.current_question_id() != Some(question_id) {
            return Err(AppError::Conflict(
                "Not the current question".to_string(),
            ));
        }
        if !room.has_player(player_id) {
            return Err(AppError::NotFound("Player not in room".to_string()));
        }
        let question = room
            .questions
            .get(question_id)
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
        if answer_index >= question.options.len() {
            return Err(AppError::Validation(
                "Answer index out of range".to_string(),
            ));
        }

        let question_answers = room.answers.entry(question_id.to_string()).or_default();
        if question_answers.contains_key(player_id) {
            return Err(AppError::Conflict(
                "Answer already submitted".to_string(),
            ));
        }
        question_answers.insert(
            player_id.to_string(),
            crate::room::models::Answer {
                answer_index,
                timestamp_ms: now_ms(),
            },
        );
        let answer_count = question_answers.len();
        self.repository.update_room(&room).await?;

        debug!(
            room_code = %room_code,
            question_id = %question_id,
            player_id = %player_id,
            answer_count,
            "Answer recorded"
        );
        self.event_bus
            .emit(RoomEvent::AnswerSubmitted {
                room_code: room_code.to_string(),
                question_id: question_id.to_string(),
                player_id: player_id.to_string(),
                answer_count,
            })
            .await;

        Ok(room)
    }

    /// Timer callback for the answering window. Resolves the question
    /// unless the quiz has already moved on (host force, or a stale timer
    /// that survived cancellation).
    #[instrument(skip(self))]
    pub async fn question_deadline_elapsed(
        &self,
        room_code: &str,
        expected_index: usize,
    ) {
        let _guard = self.locks.acquire(room_code).await;
        let Ok(Some(mut room)) = self.repository.get_room(room_code).await else {
            return;
        };
        if !Self::is_answering(&room, expected_index) {
            debug!(room_code = %room_code, expected_index, "Stale question deadline ignored");
            return;
        }

        if let Err(error) = self.resolve_current_question(room_code, &mut room).await {
            warn!(room_code = %room_code, %error, "Question resolution failed");
        }
    }

    /// Timer callback for the reveal delay. Advances unless the host
    /// already did.
    #[instrument(skip(self))]
    pub async fn auto_advance_elapsed(&self, room_code: &str, expected_index: usize) {
        let _guard = self.locks.acquire(room_code).await;
        let Ok(Some(mut room)) = self.repository.get_room(room_code).await else {
            return;
        };
        let showing = room
            .quiz
            .as_ref()
            .map(|quiz| {
                quiz.showing_results && quiz.current_question_index == expected_index
            })
            .unwrap_or(false);
        if room.phase() != Phase::Quiz || !showing {
            debug!(room_code = %room_code, expected_index, "Stale auto-advance ignored");
            return;
        }

        if let Err(error) = self.advance_question(room_code, &mut room).await {
            warn!(room_code = %room_code, %error, "Auto-advance failed");
        }
    }

    /// Host "next" action. While answering it forces resolution now; while
    /// results are showing it advances immediately and cancels the pending
    /// auto-advance.
    #[instrument(skip(self))]
    pub async fn force_next_question(
        &self,
        room_code: &str,
        host_id: &str,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;
        if room.phase() != Phase::Quiz {
            return Err(AppError::WrongPhase(
                "No quiz in progress".to_string(),
            ));
        }
        let showing = room
            .quiz
            .as_ref()
            .map(|quiz| quiz.showing_results)
            .ok_or(AppError::Internal)?;

        if showing {
            self.timers.cancel(room_code, TimerKind::AutoAdvance);
            self.advance_question(room_code, &mut room).await?;
        } else {
            self.timers.cancel(room_code, TimerKind::QuestionDeadline);
            self.resolve_current_question(room_code, &mut room).await?;
        }
        Ok(room)
    }

    // ----- RESULTS -----

    /// Advances the host-paced results reveal. Entering an award stage
    /// applies that winner's bonus exactly once; the persisted winner id is
    /// the guard against re-application. Advancing past the podium is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn advance_reveal_stage(
        &self,
        room_code: &str,
        host_id: &str,
    ) -> Result<RoomModel, AppError> {
        let _guard = self.locks.acquire(room_code).await;
        let mut room = self.load(room_code).await?;
        ensure_host(&room, host_id)?;
        if room.phase() != Phase::Results {
            return Err(AppError::WrongPhase(
                "The game is not at the results stage".to_string(),
            ));
        }

        let current = room
            .settings
            .reveal_stage
            .unwrap_or(RevealStage::RunningLeaderboard);
        let Some(next) = current.next() else {
            return Ok(room);
        };
        room.settings.reveal_stage = Some(next);

        let award_winner_id = match next {
            RevealStage::ProlificAuthor => Self::apply_prolific_bonus(&mut room),
            RevealStage::ChallengingAuthor => Self::apply_challenging_bonus(&mut room),
            _ => None,
        };

        self.repository.update_room(&room).await?;

        info!(room_code = %room_code, stage = %next, "Reveal stage advanced");
        self.event_bus
            .emit(RoomEvent::RevealAdvanced {
                room_code: room_code.to_string(),
                stage: next,
                award_winner_id,
            })
            .await;

        Ok(room)
    }

    /// Tears down a room: pending timers, stored state, lock, and event
    /// channel.
    #[instrument(skip(self))]
    pub async fn delete_room(&self, room_code: &str) -> Result<(), AppError> {
        self.timers.cancel_all_for_room(room_code);
        self.repository.delete_room(room_code).await?;
        self.locks.remove(room_code);
        self.event_bus
            .emit(RoomEvent::RoomDeleted {
                room_code: room_code.to_string(),
            })
            .await;
        self.event_bus.remove_room_channel(room_code).await;
        Ok(())
    }

    // ----- internals -----

    async fn load(&self, room_code: &str) -> Result<RoomModel, AppError> {
        self.repository
            .get_room(room_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found. Check the room code.".to_string()))
    }

    async fn emit_phase_changed(&self, room_code: &str, phase: Phase) {
        self.event_bus
            .emit(RoomEvent::PhaseChanged {
                room_code: room_code.to_string(),
                phase,
            })
            .await;
    }

    fn is_answering(room: &RoomModel, expected_index: usize) -> bool {
        room.phase() == Phase::Quiz
            && room
                .quiz
                .as_ref()
                .map(|quiz| {
                    !quiz.showing_results && quiz.current_question_index == expected_index
                })
                .unwrap_or(false)
    }

    fn schedule_question_deadline(
        &self,
        room_code: &str,
        timer_seconds: u32,
        expected_index: usize,
    ) {
        let Some(controller) = self.self_ref.upgrade() else {
            return;
        };
        let code = room_code.to_string();
        self.timers.schedule(
            room_code,
            TimerKind::QuestionDeadline,
            Duration::from_secs(timer_seconds as u64),
            async move {
                controller
                    .question_deadline_elapsed(&code, expected_index)
                    .await;
            },
        );
    }

    fn schedule_auto_advance(&self, room_code: &str, expected_index: usize) {
        let Some(controller) = self.self_ref.upgrade() else {
            return;
        };
        let code = room_code.to_string();
        self.timers.schedule(
            room_code,
            TimerKind::AutoAdvance,
            Duration::from_secs(REVEAL_DELAY_SECONDS),
            async move {
                controller.auto_advance_elapsed(&code, expected_index).await;
            },
        );
    }

    /// Scores the current question and applies the point deltas. Caller
    /// must hold the room lock and have verified the answering guards.
    async fn resolve_current_question(
        &self,
        room_code: &str,
        room: &mut RoomModel,
    ) -> Result<(), AppError> {
        let Some(question_id) = room.current_question_id().map(str::to_string) else {
            return Err(AppError::Internal);
        };
        let Some(question) = room.questions.get(&question_id).cloned() else {
            // The order references a question that no longer exists; skip it
            // rather than failing the whole quiz.
            warn!(room_code = %room_code, question_id = %question_id, "Current question missing, skipping");
            return self.advance_question(room_code, room).await;
        };

        let answers = room.answers_for(&question_id);
        let question_start_ms = room
            .quiz
            .as_ref()
            .ok_or(AppError::Internal)?
            .current_question_start_ms;
        let outcome = scoring::process_question_results(
            &answers,
            question.correct_index,
            &question.author_id,
            &room.players,
            question_start_ms,
            room.settings.question_timer_seconds,
        );

        for (player_id, result) in &outcome.player_results {
            // Kicked players may still appear in results; skip them.
            if let Some(player) = room.players.get_mut(player_id) {
                player.score += result.points;
                player.answering_score += result.points;
                player.streak = result.new_streak;
            }
        }
        if let Some(author) = room.players.get_mut(&question.author_id) {
            author.score += outcome.author_points;
            author.author_score += outcome.author_points;
        }

        let quiz = room.quiz.as_mut().ok_or(AppError::Internal)?;
        quiz.showing_results = true;
        let current_index = quiz.current_question_index;
        self.repository.update_room(room).await?;

        info!(
            room_code = %room_code,
            question_id = %question_id,
            author_points = outcome.author_points,
            "Question resolved"
        );
        self.event_bus
            .emit(RoomEvent::QuestionResolved {
                room_code: room_code.to_string(),
                question_id,
                outcome,
            })
            .await;

        self.schedule_auto_advance(room_code, current_index);
        Ok(())
    }

    /// Moves to the next question, or into RESULTS past the last one.
    /// Caller must hold the room lock.
    async fn advance_question(
        &self,
        room_code: &str,
        room: &mut RoomModel,
    ) -> Result<(), AppError> {
        let quiz = room.quiz.as_mut().ok_or(AppError::Internal)?;
        let next_index = quiz.current_question_index + 1;

        if next_index >= quiz.question_order.len() {
            self.timers.cancel_all_for_room(room_code);
            let awards = compute_awards(room);
            room.awards = Some(awards);
            room.settings.phase = Phase::Results;
            room.settings.reveal_stage = Some(RevealStage::RunningLeaderboard);
            self.repository.update_room(room).await?;

            info!(room_code = %room_code, "Quiz finished, entering results");
            self.emit_phase_changed(room_code, Phase::Results).await;
            return Ok(());
        }

        quiz.current_question_index = next_index;
        quiz.current_question_start_ms = now_ms();
        quiz.showing_results = false;
        self.repository.update_room(room).await?;

        debug!(room_code = %room_code, next_index, "Advanced to next question");
        self.event_bus
            .emit(RoomEvent::QuestionAdvanced {
                room_code: room_code.to_string(),
                question_index: next_index,
            })
            .await;

        self.schedule_question_deadline(
            room_code,
            room.settings.question_timer_seconds,
            next_index,
        );
        Ok(())
    }

    fn apply_prolific_bonus(room: &mut RoomModel) -> Option<String> {
        if room.settings.prolific_winner_id.is_some() {
            return None;
        }
        let winner = room.awards.as_ref()?.prolific.clone()?;
        if let Some(player) = room.players.get_mut(&winner) {
            player.score += AWARD_BONUS;
            player.author_score += AWARD_BONUS;
        }
        room.settings.prolific_winner_id = Some(winner.clone());
        Some(winner)
    }

    fn apply_challenging_bonus(room: &mut RoomModel) -> Option<String> {
        if room.settings.challenging_winner_id.is_some() {
            return None;
        }
        let winner = room.awards.as_ref()?.challenging.clone()?;
        if let Some(player) = room.players.get_mut(&winner) {
            player.score += AWARD_BONUS;
            player.author_score += AWARD_BONUS;
        }
        room.settings.challenging_winner_id = Some(winner.clone());
        Some(winner)
    }
}

/// Computes both award winners from the finished quiz.
///
/// Most prolific: most surviving questions, ties to the lowest author id.
/// Most challenging: lowest mean per-question correct fraction among
/// non-author respondents over the author's used questions, requiring the
/// mean be strictly positive (an author nobody ever answered correctly is
/// not a fair difficulty signal). Questions with zero non-author
/// respondents are excluded from the mean.
fn compute_awards(room: &RoomModel) -> AwardWinners {
    let mut counts: Vec<(&str, usize)> = room.question_count_by_author().into_iter().collect();
    counts.sort_by(|(a_id, a_count), (b_id, b_count)| {
        b_count.cmp(a_count).then_with(|| a_id.cmp(b_id))
    });
    let prolific = counts.first().map(|(id, _)| id.to_string());

    let mut fractions_by_author: HashMap<&str, Vec<f64>> = HashMap::new();
    if let Some(quiz) = room.quiz.as_ref() {
        for question_id in &quiz.question_order {
            let Some(question) = room.questions.get(question_id) else {
                continue;
            };
            let mut total = 0usize;
            let mut correct = 0usize;
            if let Some(answers) = room.answers.get(question_id) {
                for (player_id, answer) in answers {
                    if player_id == &question.author_id {
                        continue;
                    }
                    total += 1;
                    if answer.answer_index == question.correct_index {
                        correct += 1;
                    }
                }
            }
            if total == 0 {
                continue;
            }
            fractions_by_author
                .entry(question.author_id.as_str())
                .or_default()
                .push(correct as f64 / total as f64);
        }
    }

    let mut means: Vec<(String, f64)> = fractions_by_author
        .into_iter()
        .map(|(author, fractions)| {
            let mean = fractions.iter().sum::<f64>() / fractions.len() as f64;
            (author.to_string(), mean)
        })
        .filter(|(_, mean)| *mean > 0.0)
        .collect();
    means.sort_by(|(a_id, a_mean), (b_id, b_mean)| {
        a_mean
            .partial_cmp(b_mean)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_id.cmp(b_id))
    });
    let challenging = means.first().map(|(id, _)| id.clone());

    AwardWinners {
        prolific,
        challenging,
    }
}
