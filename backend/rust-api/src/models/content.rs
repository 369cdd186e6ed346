use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four practice modalities. Every question belongs to exactly one mode
/// and every quiz attempt runs in exactly one mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Listening,
    Speaking,
    Reading,
    Writing,
}

/// Fixed mode order used for progress rows and unlock sweeps.
pub const MODES: [Mode; 4] = [Mode::Listening, Mode::Speaking, Mode::Reading, Mode::Writing];

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Listening => "listening",
            Mode::Speaking => "speaking",
            Mode::Reading => "reading",
            Mode::Writing => "writing",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "listening" => Ok(Mode::Listening),
            "speaking" => Ok(Mode::Speaking),
            "reading" => Ok(Mode::Reading),
            "writing" => Ok(Mode::Writing),
            _ => Err(format!("Invalid mode: {}", value)),
        }
    }
}

/// How a question expects its answer: pick one of the listed choices, or
/// type free text. The checker dispatches on this tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum AnswerSpec {
    Choice {
        choices: Vec<String>,
    },
    FreeText {
        #[serde(default)]
        case_sensitive: bool,
        #[serde(default)]
        placeholder: Option<String>,
    },
}

/// A content-pool entry. Immutable from the engine's perspective; authored
/// and reordered by the (out-of-scope) admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub mode: Mode,
    pub prompt: String,
    pub spec: AnswerSpec,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub order: i32,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub unit_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: i32,
    #[serde(default)]
    pub published: bool,
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: i32,
}

fn default_estimated_minutes() -> i32 {
    5
}

/// Client-facing question payload. Never carries the canonical answer or the
/// explanation; those only cross the boundary in answer-submission
/// responses, after the answer for that question has been recorded.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub question_type: &'static str,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl QuestionView {
    /// Strip server-only fields before the question crosses the boundary.
    pub fn sanitize(question: &Question) -> Self {
        match &question.spec {
            AnswerSpec::Choice { choices } => QuestionView {
                id: question.id.clone(),
                question_type: match question.mode {
                    Mode::Listening => "LISTEN_AND_SELECT",
                    _ => "MCQ",
                },
                prompt: question.prompt.clone(),
                options: Some(choices.clone()),
                placeholder: None,
                case_sensitive: None,
                hint: question.hint.clone(),
            },
            AnswerSpec::FreeText {
                case_sensitive,
                placeholder,
            } => QuestionView {
                id: question.id.clone(),
                question_type: "TYPE_ANSWER",
                prompt: question.prompt.clone(),
                options: None,
                placeholder: Some(
                    placeholder
                        .clone()
                        .unwrap_or_else(|| "Type your answer here".to_string()),
                ),
                case_sensitive: Some(*case_sensitive),
                hint: question.hint.clone(),
            },
        }
    }
}
