use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub block_id: i64,
    pub paddr: i64,
    pub size: i64,
    pub vaddr: i64,
}
