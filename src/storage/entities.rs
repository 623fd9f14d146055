use chrono::Duration;
use chrono::Utc;

use chrono::DateTime;
use serde::Deserialize;
use serde::Serialize;

use std::sync::Arc;

/// A finished deep work session as stored on the disk. Records are written
/// as one JSON line each into the day file of their start date and are never
/// mutated afterwards.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct SessionEntity {
    pub category: Arc<str>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "duration_ser")]
    pub duration: Duration,
}

impl SessionEntity {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        let duration = Duration::seconds(s);
        Ok(duration)
    }
}

/// A user defined label sessions are grouped under. Categories live in a
/// single JSON file and keep their creation order.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct CategoryEntity {
    pub name: Arc<str>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}
