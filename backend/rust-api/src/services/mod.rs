use crate::config::Config;
use mongodb::{bson::doc, options::IndexOptions, Client as MongoClient, Database, IndexModel};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        // Create ConnectionManager with longer timeout
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        // Test connection
        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        ensure_indexes(&mongo).await?;

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

/// Unique indexes the engine's invariants lean on. The
/// (attempt_id, question_id) index is load-bearing: it is what arbitrates
/// concurrent submissions for the same question, not application locking.
async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    let unique = |keys: mongodb::bson::Document| {
        IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build()
    };

    mongo
        .collection::<mongodb::bson::Document>("question_attempts")
        .create_index(unique(doc! { "attempt_id": 1, "question_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("planet_mode_progress")
        .create_index(unique(doc! { "user_id": 1, "lesson_id": 1, "mode": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("unit_progress")
        .create_index(unique(doc! { "user_id": 1, "unit_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("user_hearts")
        .create_index(unique(doc! { "user_id": 1 }))
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("user_progress")
        .create_index(unique(doc! { "user_id": 1 }))
        .await?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

/// MongoDB duplicate-key write error (code 11000). Losing this race is the
/// idempotent path for answer submission and lazy-init upserts.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == 11000
    )
}

pub mod attempt_store;
pub mod content_service;
pub mod hearts_store;
pub mod learning_service;
pub mod pool_seed;
pub mod progression_store;
pub mod question_picker;
