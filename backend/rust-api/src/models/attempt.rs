use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::Validate;

use super::content::{Mode, QuestionView};

/// Fixed XP award per correct answer.
pub const XP_PER_CORRECT_ANSWER: i32 = 10;

/// One quiz session for a (user, lesson, mode) triple. `question_ids` is
/// fixed at creation and never mutates; the answered set lives in
/// `question_attempts` child rows and is re-derived on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: i64,
    pub unit_id: String,
    pub lesson_id: String,
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub question_ids: Vec<String>,
    pub total_questions: i32,
    pub correct_count: i32,
    pub xp_earned: i32,
}

/// Child record of a QuizAttempt. The unique (attempt_id, question_id) index
/// on this collection is what makes answer submission idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub attempt_id: String,
    pub user_id: i64,
    pub question_id: String,
    pub answer: SubmittedAnswer,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// A submitted answer is either plain text or an arbitrary structured
/// payload. The explicit tag keeps the correctness checker from sniffing
/// runtime shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubmittedAnswer {
    Text(String),
    Structured(serde_json::Value),
}

impl SubmittedAnswer {
    /// Canonical text used by the correctness checker. Structured payloads
    /// compare through their JSON encoding.
    pub fn canonical_text(&self) -> Cow<'_, str> {
        match self {
            SubmittedAnswer::Text(text) => Cow::Borrowed(text),
            SubmittedAnswer::Structured(value) => Cow::Owned(value.to_string()),
        }
    }
}

/// Lifecycle of an attempt, derived from counters rather than stored: the
/// answered set and `finished_at` are the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Created,
    InProgress,
    ReadyToFinish,
    Finished,
}

impl AttemptPhase {
    pub fn derive(answered: usize, total: usize, finished: bool) -> Self {
        if finished {
            AttemptPhase::Finished
        } else if answered == 0 {
            AttemptPhase::Created
        } else if answered < total {
            AttemptPhase::InProgress
        } else {
            AttemptPhase::ReadyToFinish
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartQuizRequest {
    pub lesson_id: String,
    /// Defaults to listening when omitted, matching the lesson entry flow.
    pub mode: Option<String>,
    #[validate(range(min = 1, max = 20))]
    pub count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StartQuizResponse {
    pub attempt_id: String,
    pub lesson_id: String,
    pub mode: Mode,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub hearts_remaining: i32,
    pub question: QuestionView,
}

#[derive(Debug, Serialize)]
pub struct CurrentQuestionResponse {
    pub attempt_id: String,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub hearts_remaining: i32,
    pub question: QuestionView,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    pub answer: SubmittedAnswer,
}

#[derive(Debug, Serialize)]
pub struct AttemptProgress {
    pub answered_count: usize,
    pub correct_count: i32,
    pub total_questions: usize,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub attempt_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    /// XP awarded by THIS call; 0 on an idempotent replay.
    pub xp_earned: i32,
    pub hearts_remaining: i32,
    pub out_of_hearts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<i64>,
    pub progress: AttemptProgress,
    /// Explicit "no next" signal: null once every question is answered.
    pub next_question: Option<QuestionView>,
}

#[derive(Debug, Serialize)]
pub struct FinishQuizResponse {
    pub attempt_id: String,
    pub lesson_id: String,
    pub correct_count: i32,
    pub total_questions: i32,
    pub accuracy: f64,
    pub xp_earned: i32,
}
