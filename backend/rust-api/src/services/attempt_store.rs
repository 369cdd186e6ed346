use anyhow::anyhow;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReturnDocument;
use mongodb::Database;
use std::collections::HashSet;
use uuid::Uuid;

use super::is_duplicate_key;
use crate::error::EngineError;
use crate::models::{
    AttemptPhase, Mode, QuestionAttempt, QuizAttempt, SubmittedAnswer, XP_PER_CORRECT_ANSWER,
};
use crate::utils::time::bson_datetime;

/// Attempt row plus its answered set, re-derived from child rows on every
/// read. Never cached: concurrent reads must stay consistent with
/// concurrent writes.
pub struct AttemptSnapshot {
    pub attempt: QuizAttempt,
    pub answered: HashSet<String>,
}

impl AttemptSnapshot {
    pub fn answered_count(&self) -> usize {
        self.answered.len()
    }

    /// First id in the fixed ordering without a recorded answer.
    pub fn next_unanswered(&self) -> Option<&str> {
        self.attempt
            .question_ids
            .iter()
            .find(|id| !self.answered.contains(*id))
            .map(String::as_str)
    }

    pub fn phase(&self) -> AttemptPhase {
        AttemptPhase::derive(
            self.answered.len(),
            self.attempt.question_ids.len(),
            self.attempt.finished_at.is_some(),
        )
    }
}

pub enum AnswerOutcome {
    /// This call created the QuestionAttempt row and moved the counters.
    Recorded,
    /// A row already existed; nothing was written. Carries the original
    /// submission so correctness can be re-derived from content.
    Replayed(QuestionAttempt),
}

/// Durable store for quiz attempts and their per-question children.
pub struct AttemptStore {
    mongo: Database,
}

impl AttemptStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn attempts(&self) -> mongodb::Collection<QuizAttempt> {
        self.mongo.collection("quiz_attempts")
    }

    fn question_attempts(&self) -> mongodb::Collection<QuestionAttempt> {
        self.mongo.collection("question_attempts")
    }

    pub async fn create(
        &self,
        user_id: i64,
        unit_id: &str,
        lesson_id: &str,
        mode: Mode,
        question_ids: Vec<String>,
    ) -> Result<QuizAttempt, EngineError> {
        let attempt = QuizAttempt {
            id: Uuid::new_v4().to_string(),
            user_id,
            unit_id: unit_id.to_string(),
            lesson_id: lesson_id.to_string(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            total_questions: question_ids.len() as i32,
            question_ids,
            correct_count: 0,
            xp_earned: 0,
        };

        self.attempts().insert_one(&attempt).await?;

        tracing::info!(
            "Quiz attempt created: {} user={} lesson={} mode={}",
            attempt.id,
            user_id,
            lesson_id,
            mode
        );
        Ok(attempt)
    }

    /// Load an attempt the caller owns. A missing attempt and an ownership
    /// mismatch produce the same NotFound, so other users' attempt ids stay
    /// unobservable.
    pub async fn find_for_user(
        &self,
        attempt_id: &str,
        user_id: i64,
    ) -> Result<AttemptSnapshot, EngineError> {
        let attempt = self
            .attempts()
            .find_one(doc! { "_id": attempt_id, "user_id": user_id })
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz attempt not found".to_string()))?;

        let answered: Vec<QuestionAttempt> = self
            .question_attempts()
            .find(doc! { "attempt_id": attempt_id })
            .await?
            .try_collect()
            .await?;

        Ok(AttemptSnapshot {
            attempt,
            answered: answered.into_iter().map(|qa| qa.question_id).collect(),
        })
    }

    /// Append exactly one QuestionAttempt and move the counters, or detect
    /// that one already exists. The unique (attempt_id, question_id) index
    /// arbitrates concurrent submissions; the duplicate-key loser takes the
    /// replay path and writes nothing.
    pub async fn record_answer(
        &self,
        attempt: &QuizAttempt,
        question_id: &str,
        answer: &SubmittedAnswer,
        is_correct: bool,
    ) -> Result<AnswerOutcome, EngineError> {
        let record = QuestionAttempt {
            id: Uuid::new_v4().to_string(),
            attempt_id: attempt.id.clone(),
            user_id: attempt.user_id,
            question_id: question_id.to_string(),
            answer: answer.clone(),
            is_correct,
            answered_at: Utc::now(),
        };

        match self.question_attempts().insert_one(&record).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {
                let existing = self
                    .question_attempts()
                    .find_one(doc! { "attempt_id": &attempt.id, "question_id": question_id })
                    .await?
                    .ok_or_else(|| {
                        EngineError::Internal(anyhow!(
                            "duplicate answer row vanished for attempt {}",
                            attempt.id
                        ))
                    })?;
                return Ok(AnswerOutcome::Replayed(existing));
            }
            Err(e) => return Err(e.into()),
        }

        // Counters move only for the insert that won the uniqueness race
        let correct_inc: i32 = if is_correct { 1 } else { 0 };
        let xp_inc: i32 = if is_correct { XP_PER_CORRECT_ANSWER } else { 0 };
        self.attempts()
            .update_one(
                doc! { "_id": &attempt.id },
                doc! { "$inc": { "correct_count": correct_inc, "xp_earned": xp_inc } },
            )
            .await?;

        Ok(AnswerOutcome::Recorded)
    }

    /// Seal the attempt exactly once. Returns the sealed document when this
    /// call set `finished_at`, or None when the attempt was already sealed;
    /// the caller runs progression only on a win.
    pub async fn seal(&self, attempt_id: &str) -> Result<Option<QuizAttempt>, EngineError> {
        let sealed = self
            .attempts()
            .find_one_and_update(
                doc! { "_id": attempt_id, "finished_at": null },
                doc! { "$set": { "finished_at": bson_datetime(Utc::now())? } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(sealed)
    }
}
