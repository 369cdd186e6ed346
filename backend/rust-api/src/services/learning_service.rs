use mongodb::Database;
use std::str::FromStr;
use validator::Validate;

use super::attempt_store::{AnswerOutcome, AttemptSnapshot, AttemptStore};
use super::content_service::ContentService;
use super::hearts_store::HeartsStore;
use super::progression_store::ProgressionStore;
use super::question_picker::pick_question_ids;
use crate::error::EngineError;
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, QUIZ_ATTEMPTS_TOTAL};
use crate::models::{
    AnswerSpec, AttemptPhase, AttemptProgress, CurrentQuestionResponse, FinishQuizResponse,
    HeartsSnapshot, HeartsState, LearningMapResponse, LessonModeRow, LessonOverviewResponse, Mode,
    ModeState, Question, QuestionView, QuizAttempt, SkillModeRow, SkillModesResponse, SkillRow,
    SkillState, StartQuizRequest, StartQuizResponse, SubmitAnswerRequest, SubmitAnswerResponse,
    SubmittedAnswer, UserProgressResponse, MODES, XP_PER_CORRECT_ANSWER,
};

const DEFAULT_QUESTION_COUNT: usize = 5;

/// Orchestrates the quiz flow: composes the content catalog, the
/// deterministic picker, the attempt store, hearts, and the progression
/// tracker. Also the boundary guard: canonical answers and explanations
/// only leave through answer-submission responses.
pub struct LearningService {
    content: ContentService,
    attempts: AttemptStore,
    hearts: HeartsStore,
    progression: ProgressionStore,
}

impl LearningService {
    pub fn new(mongo: Database) -> Self {
        Self {
            content: ContentService::new(mongo.clone()),
            attempts: AttemptStore::new(mongo.clone()),
            hearts: HeartsStore::new(mongo.clone()),
            progression: ProgressionStore::new(mongo),
        }
    }

    pub async fn start_quiz(
        &self,
        user_id: i64,
        req: &StartQuizRequest,
    ) -> Result<StartQuizResponse, EngineError> {
        req.validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let mode = match &req.mode {
            Some(raw) => Mode::from_str(raw).map_err(EngineError::Validation)?,
            None => Mode::Listening,
        };
        let count = req.count.map(|c| c as usize).unwrap_or(DEFAULT_QUESTION_COUNT);

        let lesson = self
            .content
            .lesson(&req.lesson_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("lesson not found".to_string()))?;

        let pool = self.content.questions_for_mode(mode).await?;
        if pool.is_empty() {
            return Err(EngineError::Validation(format!(
                "no questions available for mode: {}",
                mode
            )));
        }

        let question_ids = pick_question_ids(&lesson.id, mode, count, &pool)?;

        let first_question = self
            .content
            .question(&question_ids[0])
            .await?
            .ok_or_else(|| EngineError::NotFound("question not found".to_string()))?;

        let attempt = self
            .attempts
            .create(user_id, &lesson.unit_id, &lesson.id, mode, question_ids)
            .await?;

        let hearts = self.hearts.get(user_id).await?;
        QUIZ_ATTEMPTS_TOTAL.with_label_values(&["started"]).inc();

        Ok(StartQuizResponse {
            attempt_id: attempt.id,
            lesson_id: attempt.lesson_id,
            mode,
            current_question_index: 1,
            total_questions: attempt.total_questions as usize,
            hearts_remaining: hearts.current,
            question: QuestionView::sanitize(&first_question),
        })
    }

    /// Current question = first id in the fixed ordering without a recorded
    /// answer, recomputed on every call from the answered set.
    pub async fn current_question(
        &self,
        attempt_id: &str,
        user_id: i64,
    ) -> Result<CurrentQuestionResponse, EngineError> {
        let snapshot = self.attempts.find_for_user(attempt_id, user_id).await?;

        let question_id = snapshot
            .next_unanswered()
            .ok_or_else(|| EngineError::NotFound("no more questions".to_string()))?
            .to_string();

        let question = self
            .content
            .question(&question_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("question not found".to_string()))?;

        let index = snapshot
            .attempt
            .question_ids
            .iter()
            .position(|id| *id == question_id)
            .map(|p| p + 1)
            .unwrap_or(1);

        let hearts = self.hearts.get(user_id).await?;

        Ok(CurrentQuestionResponse {
            attempt_id: snapshot.attempt.id,
            current_question_index: index,
            total_questions: snapshot.attempt.question_ids.len(),
            hearts_remaining: hearts.current,
            question: QuestionView::sanitize(&question),
        })
    }

    pub async fn submit_answer(
        &self,
        attempt_id: &str,
        user_id: i64,
        req: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, EngineError> {
        let snapshot = self.attempts.find_for_user(attempt_id, user_id).await?;

        if snapshot.phase() == AttemptPhase::Finished {
            return Err(EngineError::InvalidState(
                "attempt is already finished".to_string(),
            ));
        }

        if !snapshot
            .attempt
            .question_ids
            .iter()
            .any(|id| *id == req.question_id)
        {
            return Err(EngineError::NotFound(
                "question is not part of this attempt".to_string(),
            ));
        }

        let question = self
            .content
            .question(&req.question_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("question not found".to_string()))?;

        let is_correct = check_answer(&question, &req.answer);

        let outcome = self
            .attempts
            .record_answer(&snapshot.attempt, &req.question_id, &req.answer, is_correct)
            .await?;

        // A replay re-derives correctness from the originally stored answer
        // and never moves counters or hearts
        let (is_correct, xp_earned, first_submission) = match &outcome {
            AnswerOutcome::Recorded => {
                let xp = if is_correct { XP_PER_CORRECT_ANSWER } else { 0 };
                (is_correct, xp, true)
            }
            AnswerOutcome::Replayed(existing) => {
                (check_answer(&question, &existing.answer), 0, false)
            }
        };

        if first_submission {
            ANSWERS_SUBMITTED_TOTAL
                .with_label_values(&[if is_correct { "true" } else { "false" }])
                .inc();
            if !is_correct {
                // Clamped at zero inside the store; no charge once depleted
                self.hearts.decrement_on_wrong(user_id).await?;
            }
        }

        let hearts = self.hearts.get_with_regen(user_id).await?;
        let out_of_hearts = hearts.current <= 0;

        // Re-read so the progress counters and the next question reflect
        // this submission (and any concurrent ones)
        let snapshot = self.attempts.find_for_user(attempt_id, user_id).await?;
        let next_question = self.preview_next(&snapshot).await?;

        tracing::info!(
            "Answer processed: attempt={} question={} correct={} replay={}",
            attempt_id,
            req.question_id,
            is_correct,
            !first_submission
        );

        Ok(SubmitAnswerResponse {
            attempt_id: snapshot.attempt.id.clone(),
            question_id: req.question_id.clone(),
            is_correct,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone().unwrap_or_else(|| {
                format!("The correct answer is \"{}\".", question.correct_answer)
            }),
            xp_earned,
            hearts_remaining: hearts.current,
            out_of_hearts,
            cooldown_seconds: out_of_hearts
                .then_some(hearts.regen.next_heart_in_seconds)
                .flatten(),
            progress: AttemptProgress {
                answered_count: snapshot.answered_count(),
                correct_count: snapshot.attempt.correct_count,
                total_questions: snapshot.attempt.question_ids.len(),
            },
            next_question,
        })
    }

    /// Idempotent: the first call seals the attempt and feeds the
    /// progression tracker exactly once; later calls return the same
    /// summary without reprocessing.
    pub async fn finish_quiz(
        &self,
        attempt_id: &str,
        user_id: i64,
    ) -> Result<FinishQuizResponse, EngineError> {
        // Ownership check happens before the seal so foreign attempt ids
        // fail NotFound instead of leaking through the idempotent path
        let snapshot = self.attempts.find_for_user(attempt_id, user_id).await?;

        let attempt = match self.attempts.seal(attempt_id).await? {
            Some(sealed) => {
                let accuracy = accuracy_of(&sealed);
                let outcome = self
                    .progression
                    .record_result(
                        user_id,
                        &sealed.unit_id,
                        &sealed.lesson_id,
                        sealed.mode,
                        accuracy,
                    )
                    .await?;
                if outcome.lesson_completed {
                    tracing::info!(
                        "User {} completed all modes of lesson {}",
                        user_id,
                        sealed.lesson_id
                    );
                }
                self.progression
                    .apply_finish(user_id, sealed.xp_earned)
                    .await?;

                QUIZ_ATTEMPTS_TOTAL.with_label_values(&["finished"]).inc();
                tracing::info!(
                    "Quiz finished: attempt={} user={} accuracy={:.2}",
                    attempt_id,
                    user_id,
                    accuracy
                );
                sealed
            }
            None => snapshot.attempt,
        };

        Ok(FinishQuizResponse {
            accuracy: accuracy_of(&attempt),
            attempt_id: attempt.id,
            lesson_id: attempt.lesson_id,
            correct_count: attempt.correct_count,
            total_questions: attempt.total_questions,
            xp_earned: attempt.xp_earned,
        })
    }

    pub async fn hearts(&self, user_id: i64) -> Result<HeartsState, EngineError> {
        self.hearts.get_with_regen(user_id).await
    }

    /// Learning map for the active unit.
    pub async fn map(&self, user_id: i64) -> Result<LearningMapResponse, EngineError> {
        let unit = self
            .content
            .active_unit()
            .await?
            .ok_or_else(|| EngineError::NotFound("no published units".to_string()))?;

        let skills = self.skill_rows(user_id, &unit.id).await?;

        Ok(LearningMapResponse {
            unit_id: unit.id,
            unit_title: unit.title,
            skills,
        })
    }

    pub async fn unit_skills(
        &self,
        user_id: i64,
        unit_id: &str,
    ) -> Result<Vec<SkillRow>, EngineError> {
        self.content
            .unit(unit_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("unit not found".to_string()))?;
        self.skill_rows(user_id, unit_id).await
    }

    async fn skill_rows(&self, user_id: i64, unit_id: &str) -> Result<Vec<SkillRow>, EngineError> {
        let lessons = self.content.lessons_for_unit(unit_id).await?;

        let mut rows = Vec::with_capacity(lessons.len());
        let mut prev_completed = MODES.len() as u64; // first lesson is never gated
        for (position, lesson) in lessons.iter().enumerate() {
            let completed = self.progression.completed_modes(user_id, &lesson.id).await?;

            let state = if completed >= MODES.len() as u64 {
                SkillState::Completed
            } else if position == 0 {
                SkillState::Current
            } else if prev_completed >= MODES.len() as u64 {
                SkillState::Available
            } else {
                SkillState::Locked
            };

            rows.push(SkillRow {
                skill_id: lesson.id.clone(),
                title: lesson.title.clone(),
                state,
                position,
                progress_percent: (completed as f64 / MODES.len() as f64) * 100.0,
            });
            prev_completed = completed;
        }
        Ok(rows)
    }

    /// Per-mode states for a lesson, with the lesson-level lock overriding
    /// stored states (completed rows excepted) and zeroing shown scores.
    pub async fn skill_modes(
        &self,
        user_id: i64,
        skill_id: &str,
    ) -> Result<SkillModesResponse, EngineError> {
        let lesson = self
            .content
            .lesson(skill_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("skill not found".to_string()))?;

        let locked = self.progression.is_lesson_locked(user_id, skill_id).await?;
        let rows = self.progression.modes(user_id, skill_id).await?;

        let modes = rows
            .into_iter()
            .map(|row| {
                let (state, best_score) = if locked {
                    (ModeState::Locked, 0.0)
                } else {
                    (row.state, row.best_score)
                };
                SkillModeRow {
                    mode: row.mode,
                    state: state.as_str().to_ascii_uppercase(),
                    best_score,
                }
            })
            .collect();

        Ok(SkillModesResponse {
            skill_id: lesson.id,
            skill_title: lesson.title,
            modes,
        })
    }

    /// Raw progression rows for a lesson (state, best score, timestamps).
    pub async fn lesson_modes(
        &self,
        user_id: i64,
        lesson_id: &str,
    ) -> Result<Vec<LessonModeRow>, EngineError> {
        let rows = self.progression.modes(user_id, lesson_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| LessonModeRow {
                mode: row.mode,
                state: row.state,
                best_score: row.best_score,
                completed_at: row.completed_at,
                last_attempt_at: row.last_attempt_at,
            })
            .collect())
    }

    /// Pre-quiz summary: how many questions, how much XP, hearts on hand.
    pub async fn lesson_overview(
        &self,
        user_id: i64,
        lesson_id: &str,
        mode: Option<&str>,
    ) -> Result<LessonOverviewResponse, EngineError> {
        let lesson = self
            .content
            .lesson(lesson_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("lesson not found".to_string()))?;

        let mode = match mode {
            Some(raw) => Mode::from_str(raw).map_err(EngineError::Validation)?,
            None => Mode::Listening,
        };

        let pool = self.content.questions_for_mode(mode).await?;
        let total_questions = if pool.is_empty() {
            0
        } else {
            pick_question_ids(&lesson.id, mode, DEFAULT_QUESTION_COUNT, &pool)?.len()
        };

        let hearts = self.hearts.get(user_id).await?;

        Ok(LessonOverviewResponse {
            lesson_id: lesson.id,
            lesson_title: lesson.title,
            description: lesson.description,
            mode,
            estimated_time_minutes: lesson.estimated_minutes,
            xp_reward: total_questions as i32 * XP_PER_CORRECT_ANSWER,
            total_questions,
            hearts: HeartsSnapshot {
                current: hearts.current,
                max: hearts.max,
            },
        })
    }

    pub async fn user_progress(&self, user_id: i64) -> Result<UserProgressResponse, EngineError> {
        self.progression.user_overview(user_id).await
    }

    async fn preview_next(
        &self,
        snapshot: &AttemptSnapshot,
    ) -> Result<Option<QuestionView>, EngineError> {
        let Some(next_id) = snapshot.next_unanswered() else {
            return Ok(None);
        };
        let question = self
            .content
            .question(next_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("question not found".to_string()))?;
        Ok(Some(QuestionView::sanitize(&question)))
    }
}

fn accuracy_of(attempt: &QuizAttempt) -> f64 {
    if attempt.total_questions > 0 {
        f64::from(attempt.correct_count) / f64::from(attempt.total_questions)
    } else {
        0.0
    }
}

/// Correctness by content type: exact match for choice questions, trimmed
/// match for free text honoring the per-question case-sensitivity flag.
/// Structured payloads compare through their canonical JSON encoding.
pub fn check_answer(question: &Question, submitted: &SubmittedAnswer) -> bool {
    let submitted = submitted.canonical_text();
    match &question.spec {
        AnswerSpec::Choice { .. } => submitted.as_ref() == question.correct_answer,
        AnswerSpec::FreeText { case_sensitive, .. } => {
            let submitted = submitted.trim();
            let correct = question.correct_answer.trim();
            if *case_sensitive {
                submitted == correct
            } else {
                submitted.to_lowercase() == correct.to_lowercase()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(correct: &str) -> Question {
        Question {
            id: "q-1".to_string(),
            mode: Mode::Reading,
            prompt: "pick".to_string(),
            spec: AnswerSpec::Choice {
                choices: vec!["táo".into(), "cam".into()],
            },
            correct_answer: correct.to_string(),
            explanation: None,
            hint: None,
        }
    }

    fn free_text(correct: &str, case_sensitive: bool) -> Question {
        Question {
            id: "q-2".to_string(),
            mode: Mode::Writing,
            prompt: "type".to_string(),
            spec: AnswerSpec::FreeText {
                case_sensitive,
                placeholder: None,
            },
            correct_answer: correct.to_string(),
            explanation: None,
            hint: None,
        }
    }

    fn text(value: &str) -> SubmittedAnswer {
        SubmittedAnswer::Text(value.to_string())
    }

    #[test]
    fn choice_answers_match_exactly() {
        let question = choice("táo");
        assert!(check_answer(&question, &text("táo")));
        assert!(!check_answer(&question, &text("Táo")));
        assert!(!check_answer(&question, &text(" táo ")));
    }

    #[test]
    fn free_text_trims_and_folds_case_by_default() {
        let question = free_text("táo", false);
        assert!(check_answer(&question, &text("  TÁO ")));
        assert!(check_answer(&question, &text("táo")));
        assert!(!check_answer(&question, &text("cam")));
    }

    #[test]
    fn case_sensitive_free_text_only_trims() {
        let question = free_text("Hanoi", true);
        assert!(check_answer(&question, &text(" Hanoi ")));
        assert!(!check_answer(&question, &text("hanoi")));
    }

    #[test]
    fn structured_payloads_compare_through_json() {
        let question = choice(r#"{"pair":["a","b"]}"#);
        let structured = SubmittedAnswer::Structured(serde_json::json!({"pair": ["a", "b"]}));
        assert!(check_answer(&question, &structured));

        let other = SubmittedAnswer::Structured(serde_json::json!({"pair": ["b", "a"]}));
        assert!(!check_answer(&question, &other));
    }

    #[test]
    fn accuracy_of_zero_question_attempt_is_zero() {
        let attempt = QuizAttempt {
            id: "a".to_string(),
            user_id: 1,
            unit_id: "u".to_string(),
            lesson_id: "l".to_string(),
            mode: Mode::Reading,
            started_at: chrono::Utc::now(),
            finished_at: None,
            question_ids: vec![],
            total_questions: 0,
            correct_count: 0,
            xp_earned: 0,
        };
        assert_eq!(accuracy_of(&attempt), 0.0);
    }
}
