use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered scan root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub id: String,
    pub path: String,
    pub added_at: DateTime<Utc>,
}
