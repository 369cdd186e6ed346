use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;

use crate::error::EngineError;
use crate::metrics::track_db_operation;
use crate::models::{LessonDoc, Mode, Question, UnitDoc};

/// Read-only view of the administered content catalog (units, lessons,
/// question pool). The engine never writes here.
pub struct ContentService {
    mongo: Database,
}

impl ContentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn questions(&self) -> mongodb::Collection<Question> {
        self.mongo.collection("questions")
    }

    fn lessons(&self) -> mongodb::Collection<LessonDoc> {
        self.mongo.collection("lessons")
    }

    fn units(&self) -> mongodb::Collection<UnitDoc> {
        self.mongo.collection("units")
    }

    pub async fn question(&self, question_id: &str) -> Result<Option<Question>, EngineError> {
        let collection = self.questions();
        let found = track_db_operation("find_one", "questions", async move {
            collection
                .find_one(doc! { "_id": question_id })
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(found)
    }

    /// Pool for one mode in stable id order. The picker's determinism
    /// depends on this ordering never changing for an unchanged pool.
    pub async fn questions_for_mode(&self, mode: Mode) -> Result<Vec<Question>, EngineError> {
        let collection = self.questions();
        let pool = track_db_operation("find", "questions", async move {
            let cursor = collection
                .find(doc! { "mode": mode.as_str() })
                .sort(doc! { "_id": 1 })
                .await?;
            cursor
                .try_collect::<Vec<_>>()
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(pool)
    }

    pub async fn lesson(&self, lesson_id: &str) -> Result<Option<LessonDoc>, EngineError> {
        let collection = self.lessons();
        let found = track_db_operation("find_one", "lessons", async move {
            collection
                .find_one(doc! { "_id": lesson_id })
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(found)
    }

    pub async fn lessons_for_unit(&self, unit_id: &str) -> Result<Vec<LessonDoc>, EngineError> {
        let collection = self.lessons();
        let lessons = track_db_operation("find", "lessons", async move {
            let cursor = collection
                .find(doc! { "unit_id": unit_id, "published": true })
                .sort(doc! { "order": 1 })
                .await?;
            cursor
                .try_collect::<Vec<_>>()
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(lessons)
    }

    pub async fn unit(&self, unit_id: &str) -> Result<Option<UnitDoc>, EngineError> {
        let collection = self.units();
        let found = track_db_operation("find_one", "units", async move {
            collection
                .find_one(doc! { "_id": unit_id })
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(found)
    }

    /// First published unit by order: the unit the learning map opens on.
    pub async fn active_unit(&self) -> Result<Option<UnitDoc>, EngineError> {
        let collection = self.units();
        let found = track_db_operation("find_one", "units", async move {
            collection
                .find_one(doc! { "published": true })
                .sort(doc! { "order": 1 })
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;
        Ok(found)
    }
}
