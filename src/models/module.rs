use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub test_case_id: i64,
    pub name: String,
    pub address_space_base: Option<i64>,
}
