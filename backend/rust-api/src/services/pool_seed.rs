use anyhow::{Context, Result};
use mongodb::bson::doc;
use mongodb::Database;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use super::is_duplicate_key;
use crate::config::Config;
use crate::models::{LessonDoc, Question, UnitDoc};

#[derive(Debug, Deserialize)]
pub struct ContentSeed {
    #[serde(default)]
    pub units: Vec<UnitDoc>,
    #[serde(default)]
    pub lessons: Vec<LessonDoc>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Load the content catalog from a JSON seed file on startup. Skipped when
/// no file is configured or the question pool already has entries, so a
/// running deployment never gets its administered content overwritten.
pub async fn bootstrap(config: &Config, mongo: &Database) -> Result<()> {
    let path = match &config.content_seed_file {
        Some(path) if !path.is_empty() => {
            tracing::info!("Found content seed file path: {}", path);
            Path::new(path)
        }
        _ => {
            tracing::debug!("No content seed file configured, skipping bootstrap");
            return Ok(());
        }
    };

    if !path.exists() {
        tracing::warn!(
            "Content seed file {} not found, skipping bootstrap",
            path.display()
        );
        return Ok(());
    }

    let questions = mongo.collection::<Question>("questions");
    let existing = questions
        .count_documents(doc! {})
        .await
        .context("Failed to count questions collection")?;
    if existing > 0 {
        tracing::info!(
            "Question pool already has {} entries, skipping content seed",
            existing
        );
        return Ok(());
    }

    let contents = fs::read_to_string(path)
        .await
        .context("Failed to read content seed file")?;
    let seed: ContentSeed =
        serde_json::from_str(&contents).context("Failed to deserialize content seed payload")?;

    if !seed.units.is_empty() {
        insert_ignoring_duplicates(&mongo.collection::<UnitDoc>("units"), &seed.units).await?;
    }
    if !seed.lessons.is_empty() {
        insert_ignoring_duplicates(&mongo.collection::<LessonDoc>("lessons"), &seed.lessons)
            .await?;
    }
    if !seed.questions.is_empty() {
        insert_ignoring_duplicates(&questions, &seed.questions).await?;
    }

    tracing::info!(
        "Content seeded: {} units, {} lessons, {} questions",
        seed.units.len(),
        seed.lessons.len(),
        seed.questions.len()
    );
    Ok(())
}

/// Insert one by one, ignoring duplicate-key errors so concurrent instances
/// can bootstrap against the same database.
async fn insert_ignoring_duplicates<T>(
    collection: &mongodb::Collection<T>,
    items: &[T],
) -> Result<()>
where
    T: serde::Serialize + Send + Sync,
{
    for item in items {
        match collection.insert_one(item).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
