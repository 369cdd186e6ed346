use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;
use std::collections::HashMap;

use super::is_duplicate_key;
use crate::error::EngineError;
use crate::metrics::LESSON_MODES_COMPLETED_TOTAL;
use crate::models::{
    LessonDoc, Mode, ModeState, PlanetModeProgress, UnitProgress, UserProgressDoc,
    UserProgressResponse, MODES, PASS_THRESHOLD,
};
use crate::utils::time::bson_datetime;

/// Outcome of folding one finished attempt into progression state.
pub struct QuizResultOutcome {
    /// This attempt was the first to push the mode over the pass threshold.
    pub newly_completed: bool,
    /// The lesson reached 4/4 completed modes with this attempt.
    pub lesson_completed: bool,
}

/// Per-(user, lesson, mode) completion state, per-unit mastery, and the
/// lesson unlock rule. Sole writer is the finish path of an attempt.
pub struct ProgressionStore {
    mongo: Database,
}

impl ProgressionStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn progress(&self) -> mongodb::Collection<PlanetModeProgress> {
        self.mongo.collection("planet_mode_progress")
    }

    fn unit_progress(&self) -> mongodb::Collection<UnitProgress> {
        self.mongo.collection("unit_progress")
    }

    fn user_progress(&self) -> mongodb::Collection<UserProgressDoc> {
        self.mongo.collection("user_progress")
    }

    fn lessons(&self) -> mongodb::Collection<LessonDoc> {
        self.mongo.collection("lessons")
    }

    /// A lesson is locked while the previous lesson (by order, same unit)
    /// has fewer than 4 completed modes. The first lesson in a unit is
    /// always unlocked; lessons unknown to the catalog default to unlocked.
    pub async fn is_lesson_locked(
        &self,
        user_id: i64,
        lesson_id: &str,
    ) -> Result<bool, EngineError> {
        let Some(lesson) = self.lessons().find_one(doc! { "_id": lesson_id }).await? else {
            return Ok(false);
        };

        let previous = self
            .lessons()
            .find_one(doc! {
                "unit_id": &lesson.unit_id,
                "order": lesson.order - 1,
                "published": true,
            })
            .await?;

        match previous {
            Some(prev) => {
                let completed = self.completed_modes(user_id, &prev.id).await?;
                Ok(completed < MODES.len() as u64)
            }
            None => Ok(false),
        }
    }

    pub async fn completed_modes(&self, user_id: i64, lesson_id: &str) -> Result<u64, EngineError> {
        let count = self
            .progress()
            .count_documents(doc! {
                "user_id": user_id,
                "lesson_id": lesson_id,
                "state": ModeState::Completed.as_str(),
            })
            .await?;
        Ok(count)
    }

    /// One row per (user, lesson, mode), lazily created. The stored state is
    /// overridden to locked in the returned view while the lesson itself is
    /// locked, except for completed rows, which never downgrade.
    pub async fn mode_progress(
        &self,
        user_id: i64,
        lesson_id: &str,
        mode: Mode,
    ) -> Result<PlanetModeProgress, EngineError> {
        let locked = self.is_lesson_locked(user_id, lesson_id).await?;

        let existing = self
            .progress()
            .find_one(doc! {
                "user_id": user_id,
                "lesson_id": lesson_id,
                "mode": mode.as_str(),
            })
            .await?;

        if let Some(mut row) = existing {
            if locked && row.state != ModeState::Completed {
                row.state = ModeState::Locked;
            }
            return Ok(row);
        }

        let fresh = PlanetModeProgress {
            user_id,
            lesson_id: lesson_id.to_string(),
            mode,
            state: if locked {
                ModeState::Locked
            } else {
                ModeState::Available
            },
            best_score: 0.0,
            completed_at: None,
            last_attempt_at: None,
        };

        match self.progress().insert_one(&fresh).await {
            Ok(_) => Ok(fresh),
            Err(e) if is_duplicate_key(&e) => {
                // Lost the lazy-init race; the winner's row is authoritative
                self.progress()
                    .find_one(doc! {
                        "user_id": user_id,
                        "lesson_id": lesson_id,
                        "mode": mode.as_str(),
                    })
                    .await?
                    .ok_or_else(|| {
                        EngineError::Internal(anyhow::anyhow!(
                            "progress row vanished for user {} lesson {}",
                            user_id,
                            lesson_id
                        ))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All four mode rows for a lesson, in fixed mode order.
    pub async fn modes(
        &self,
        user_id: i64,
        lesson_id: &str,
    ) -> Result<Vec<PlanetModeProgress>, EngineError> {
        let mut rows = Vec::with_capacity(MODES.len());
        for mode in MODES {
            rows.push(self.mode_progress(user_id, lesson_id, mode).await?);
        }
        Ok(rows)
    }

    /// Fold a finished attempt's accuracy into the mode row. `$max` keeps
    /// `best_score` monotone; the completion update is filtered on
    /// `state != completed` so the transition fires exactly once and never
    /// reverts. On a first completion the unit mastery counter moves, and a
    /// 4/4 lesson unlocks the next lesson's modes.
    pub async fn record_result(
        &self,
        user_id: i64,
        unit_id: &str,
        lesson_id: &str,
        mode: Mode,
        accuracy: f64,
    ) -> Result<QuizResultOutcome, EngineError> {
        // Ensure the row exists (also derives its initial locked/available state)
        self.mode_progress(user_id, lesson_id, mode).await?;

        let now = bson_datetime(Utc::now())?;
        let key = doc! {
            "user_id": user_id,
            "lesson_id": lesson_id,
            "mode": mode.as_str(),
        };

        self.progress()
            .update_one(
                key.clone(),
                doc! {
                    "$max": { "best_score": accuracy },
                    "$set": { "last_attempt_at": now.clone() },
                },
            )
            .await?;

        let mut newly_completed = false;
        if accuracy >= PASS_THRESHOLD {
            let mut completion_filter = key;
            completion_filter
                .insert("state", doc! { "$ne": ModeState::Completed.as_str() });
            let result = self
                .progress()
                .update_one(
                    completion_filter,
                    doc! { "$set": {
                        "state": ModeState::Completed.as_str(),
                        "completed_at": now,
                    }},
                )
                .await?;
            newly_completed = result.modified_count == 1;
        }

        let mut lesson_completed = false;
        if newly_completed {
            LESSON_MODES_COMPLETED_TOTAL.inc();
            tracing::info!(
                "User {} completed {} mode of lesson {} (accuracy {:.2})",
                user_id,
                mode,
                lesson_id,
                accuracy
            );

            self.increment_mastery(user_id, unit_id).await?;

            if self.completed_modes(user_id, lesson_id).await? >= MODES.len() as u64 {
                lesson_completed = true;
                self.unlock_next_lesson(user_id, lesson_id).await?;
            }
        }

        Ok(QuizResultOutcome {
            newly_completed,
            lesson_completed,
        })
    }

    /// Flip the next lesson's locked modes to available. Rows are created
    /// when missing; completed rows are never touched.
    async fn unlock_next_lesson(&self, user_id: i64, lesson_id: &str) -> Result<(), EngineError> {
        let Some(lesson) = self.lessons().find_one(doc! { "_id": lesson_id }).await? else {
            return Ok(());
        };

        let next = self
            .lessons()
            .find_one(doc! {
                "unit_id": &lesson.unit_id,
                "order": lesson.order + 1,
                "published": true,
            })
            .await?;

        let Some(next) = next else {
            return Ok(());
        };

        for mode in MODES {
            let key = doc! {
                "user_id": user_id,
                "lesson_id": &next.id,
                "mode": mode.as_str(),
            };

            self.progress()
                .update_one(
                    key.clone(),
                    doc! { "$setOnInsert": {
                        "state": ModeState::Available.as_str(),
                        "best_score": 0.0,
                        "completed_at": null,
                        "last_attempt_at": null,
                    }},
                )
                .upsert(true)
                .await?;

            let mut locked_filter = key;
            locked_filter.insert("state", ModeState::Locked.as_str());
            self.progress()
                .update_one(
                    locked_filter,
                    doc! { "$set": { "state": ModeState::Available.as_str() } },
                )
                .await?;
        }

        tracing::info!(
            "Unlocked lesson {} for user {} after completing {}",
            next.id,
            user_id,
            lesson_id
        );
        Ok(())
    }

    async fn increment_mastery(&self, user_id: i64, unit_id: &str) -> Result<(), EngineError> {
        self.unit_progress()
            .update_one(
                doc! { "user_id": user_id, "unit_id": unit_id },
                doc! { "$inc": { "mastery": 1 } },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    /// Credit finish-time XP and bump the daily streak at most once per
    /// calendar day.
    pub async fn apply_finish(&self, user_id: i64, xp_earned: i32) -> Result<(), EngineError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();

        self.user_progress()
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$inc": { "xp_total": i64::from(xp_earned) },
                    "$setOnInsert": { "streak": 0, "last_active_date": "" },
                },
            )
            .upsert(true)
            .await?;

        self.user_progress()
            .update_one(
                doc! { "user_id": user_id, "last_active_date": { "$ne": &today } },
                doc! { "$inc": { "streak": 1 }, "$set": { "last_active_date": &today } },
            )
            .await?;

        Ok(())
    }

    /// Aggregate view: XP, streak, and the per-unit mastery map.
    pub async fn user_overview(&self, user_id: i64) -> Result<UserProgressResponse, EngineError> {
        let progress = self
            .user_progress()
            .find_one(doc! { "user_id": user_id })
            .await?
            .unwrap_or(UserProgressDoc {
                user_id,
                xp_total: 0,
                streak: 0,
                last_active_date: String::new(),
            });

        let units: Vec<UnitProgress> = self
            .unit_progress()
            .find(doc! { "user_id": user_id })
            .await?
            .try_collect()
            .await?;

        let mastery: HashMap<String, i32> = units
            .into_iter()
            .map(|up| (up.unit_id, up.mastery))
            .collect();

        Ok(UserProgressResponse {
            user_id,
            xp_total: progress.xp_total,
            streak: progress.streak,
            last_active_date: progress.last_active_date,
            mastery,
        })
    }
}
