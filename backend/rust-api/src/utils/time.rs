use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson};

/// Encode a chrono timestamp exactly the way serde stores it on our
/// documents, so `$set` values and struct fields round-trip identically.
pub fn bson_datetime(dt: DateTime<Utc>) -> Result<Bson, bson::ser::Error> {
    bson::to_bson(&dt)
}
