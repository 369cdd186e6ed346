use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::content::Mode;

/// Accuracy at or above this marks a (user, lesson, mode) as completed.
pub const PASS_THRESHOLD: f64 = 0.7;

/// Per-mode progression state. Transitions are one-way:
/// locked -> available -> completed, never backward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModeState {
    Locked,
    Available,
    Completed,
}

impl ModeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeState::Locked => "locked",
            ModeState::Available => "available",
            ModeState::Completed => "completed",
        }
    }
}

impl FromStr for ModeState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "locked" => Ok(ModeState::Locked),
            "available" => Ok(ModeState::Available),
            "completed" => Ok(ModeState::Completed),
            _ => Err(format!("Invalid mode state: {}", value)),
        }
    }
}

/// Row per (user, lesson, mode): completion state and best accuracy so far.
/// `best_score` only ever increases; `state` never moves backward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetModeProgress {
    pub user_id: i64,
    pub lesson_id: String,
    pub mode: Mode,
    pub state: ModeState,
    pub best_score: f64,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Coarse per-unit mastery counter: +1 every time a lesson mode first
/// reaches the pass threshold. No further gating hangs off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitProgress {
    pub user_id: i64,
    pub unit_id: String,
    pub mastery: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgressDoc {
    pub user_id: i64,
    #[serde(default)]
    pub xp_total: i64,
    #[serde(default)]
    pub streak: i32,
    #[serde(default)]
    pub last_active_date: String,
}

/// Aggregate lesson state shown on the learning map.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillState {
    Locked,
    Available,
    Current,
    Completed,
}

#[derive(Debug, Serialize)]
pub struct SkillRow {
    pub skill_id: String,
    pub title: String,
    pub state: SkillState,
    pub position: usize,
    pub progress_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct LearningMapResponse {
    pub unit_id: String,
    pub unit_title: String,
    pub skills: Vec<SkillRow>,
}

#[derive(Debug, Serialize)]
pub struct SkillModeRow {
    pub mode: Mode,
    /// Uppercase on the wire (AVAILABLE | LOCKED | COMPLETED), matching the
    /// map view casing.
    pub state: String,
    pub best_score: f64,
}

#[derive(Debug, Serialize)]
pub struct SkillModesResponse {
    pub skill_id: String,
    pub skill_title: String,
    pub modes: Vec<SkillModeRow>,
}

#[derive(Debug, Serialize)]
pub struct LessonModeRow {
    pub mode: Mode,
    pub state: ModeState,
    pub best_score: f64,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LessonOverviewResponse {
    pub lesson_id: String,
    pub lesson_title: String,
    pub description: String,
    pub mode: Mode,
    pub estimated_time_minutes: i32,
    pub xp_reward: i32,
    pub total_questions: usize,
    pub hearts: HeartsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HeartsSnapshot {
    pub current: i32,
    pub max: i32,
}

#[derive(Debug, Serialize)]
pub struct UserProgressResponse {
    pub user_id: i64,
    pub xp_total: i64,
    pub streak: i32,
    pub last_active_date: String,
    /// unit_id -> mastery counter
    pub mastery: HashMap<String, i32>,
}
