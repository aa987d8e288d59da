use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub id: i64,
    pub module_id: i64,
    pub name: String,
    pub space_id: i64,
}
