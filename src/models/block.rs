use serde::{Deserialize, Serialize};

/// Descriptor fields of a memory block, shared by parsed drafts and stored rows.
///
/// Required fields are plain values; everything optional in the source
/// document stays `None` rather than collapsing to a sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAttributes {
    pub access: String,
    pub align: i64,
    pub cache_policy: String,
    pub content_type: Option<String>,
    pub init_file: Option<String>,
    pub init_stage: Option<String>,
    pub init_type: Option<String>,
    pub is_contiguous: bool,
    pub is_shadow: bool,
    pub is_shareable: bool,
    pub is_system: bool,
    pub no_shadow: bool,
    pub paddr: Option<i64>,
    pub vaddr: i64,
    pub size: Option<i64>,
    pub shadow_offset: Option<i64>,
    pub shadow_scale: Option<i64>,
    pub shadow_type: Option<String>,
    pub safety_zone_before: i64,
    pub safety_zone_before_unmapped: bool,
    pub safety_zone_after: i64,
    pub safety_zone_after_unmapped: bool,
}

/// A stored block. `partition_id` is `None` for module-level blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: i64,
    pub module_id: i64,
    pub partition_id: Option<i64>,
    pub name: String,
    #[serde(flatten)]
    pub attributes: BlockAttributes,
}
