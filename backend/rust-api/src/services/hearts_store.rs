use anyhow::anyhow;
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;

use super::is_duplicate_key;
use crate::error::EngineError;
use crate::metrics::HEARTS_DEPLETED_TOTAL;
use crate::models::hearts::{fold_regen, seconds_until_next_heart};
use crate::models::{HeartsState, RegenInfo, UserHearts, SECONDS_PER_HEART};
use crate::utils::time::bson_datetime;

/// Durable per-user hearts counter. All mutations are single conditional
/// updates keyed on `user_id`, so two concurrent wrong answers can never
/// both spend the same heart or drive the counter negative.
pub struct HeartsStore {
    mongo: Database,
}

impl HeartsStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> mongodb::Collection<UserHearts> {
        self.mongo.collection("user_hearts")
    }

    /// Current hearts, lazily initialized to full on first access and with
    /// elapsed regeneration folded in.
    pub async fn get(&self, user_id: i64) -> Result<UserHearts, EngineError> {
        let collection = self.collection();

        for _ in 0..2 {
            let existing = collection.find_one(doc! { "user_id": user_id }).await?;

            let Some(row) = existing else {
                let fresh = UserHearts::full(user_id, Utc::now());
                match collection.insert_one(&fresh).await {
                    Ok(_) => return Ok(fresh),
                    // Lost the init race; loop around and read the winner
                    Err(e) if is_duplicate_key(&e) => continue,
                    Err(e) => return Err(e.into()),
                }
            };

            let now = Utc::now();
            let (current, anchor) = fold_regen(row.current, row.max, row.last_refill_at, now);
            if current == row.current && anchor == row.last_refill_at {
                return Ok(row);
            }

            // CAS on the previous clock anchor so two concurrent folds can
            // never credit the same interval twice
            let updated = collection
                .update_one(
                    doc! {
                        "user_id": user_id,
                        "current": row.current,
                        "last_refill_at": bson_datetime(row.last_refill_at)?,
                    },
                    doc! { "$set": {
                        "current": current,
                        "last_refill_at": bson_datetime(anchor)?,
                    }},
                )
                .await?;

            if updated.modified_count == 1 {
                return Ok(UserHearts {
                    current,
                    last_refill_at: anchor,
                    ..row
                });
            }
            // Another instance moved the row; retry once
        }

        self.read(user_id).await
    }

    /// Spend one heart after a wrong answer. No-op at zero; the `$gt: 0`
    /// filter is the clamp, so the counter stays inside [0, max] under any
    /// interleaving.
    pub async fn decrement_on_wrong(&self, user_id: i64) -> Result<UserHearts, EngineError> {
        let snapshot = self.get(user_id).await?;
        if snapshot.current <= 0 {
            return Ok(snapshot);
        }

        let collection = self.collection();

        if snapshot.current >= snapshot.max {
            // Spending from full starts the regeneration clock
            let result = collection
                .update_one(
                    doc! { "user_id": user_id, "current": snapshot.max },
                    doc! {
                        "$inc": { "current": -1 },
                        "$set": { "last_refill_at": bson_datetime(Utc::now())? },
                    },
                )
                .await?;
            if result.modified_count == 1 {
                return self.finish_decrement(user_id).await;
            }
            // Raced with another spend; fall through to the clamped path
        }

        collection
            .update_one(
                doc! { "user_id": user_id, "current": { "$gt": 0 } },
                doc! { "$inc": { "current": -1 } },
            )
            .await?;

        self.finish_decrement(user_id).await
    }

    async fn finish_decrement(&self, user_id: i64) -> Result<UserHearts, EngineError> {
        let row = self.read(user_id).await?;
        if row.current == 0 {
            HEARTS_DEPLETED_TOTAL.inc();
            tracing::info!("User {} is out of hearts", user_id);
        }
        Ok(row)
    }

    /// Hearts plus the regeneration countdown for the client.
    pub async fn get_with_regen(&self, user_id: i64) -> Result<HeartsState, EngineError> {
        let row = self.get(user_id).await?;
        let next_heart_in_seconds =
            seconds_until_next_heart(row.current, row.max, row.last_refill_at, Utc::now());

        Ok(HeartsState {
            current: row.current,
            max: row.max,
            regen: RegenInfo {
                seconds_per_heart: SECONDS_PER_HEART,
                next_heart_in_seconds,
            },
        })
    }

    async fn read(&self, user_id: i64) -> Result<UserHearts, EngineError> {
        self.collection()
            .find_one(doc! { "user_id": user_id })
            .await?
            .ok_or_else(|| {
                EngineError::Internal(anyhow!("hearts row missing for user {}", user_id))
            })
    }
}
