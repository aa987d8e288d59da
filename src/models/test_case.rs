use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::TestStatus;

/// One ingestion run; owns every module parsed from its directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub name: String,
    pub status: TestStatus,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}
