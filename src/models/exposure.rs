use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SegmentKey;

/// Viewer used when no authenticated user exists.
pub const ANONYMOUS_VIEWER: &str = "anonymous";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureRecord {
    pub id: String,
    pub song_id: String,
    pub key: SegmentKey,
    pub viewer_id: String,
    pub view_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
