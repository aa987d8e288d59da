//! Hierarchical decomposer: one parsed document → candidate entity graph.
//!
//! Walks the untyped [`Node`] tree with explicit typed extractors. Nothing
//! here touches storage; the result is a [`ModuleDraft`] that the store
//! persists in document order.

use serde::Serialize;
use thiserror::Error;

use super::parser::Node;
use crate::models::BlockAttributes;

pub const DEFAULT_MODULE_NAME: &str = "default_module";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{entity}: missing required field '{field}'")]
    MissingField { field: &'static str, entity: String },

    #[error("{entity}: field '{field}' must be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        entity: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{context}: expected a mapping, found {found}")]
    NotAMapping { context: String, found: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDraft {
    pub paddr: i64,
    pub size: i64,
    pub vaddr: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockDraft {
    pub name: String,
    pub attributes: BlockAttributes,
    pub regions: Vec<RegionDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionDraft {
    pub name: String,
    pub space_id: i64,
    pub blocks: Vec<BlockDraft>,
}

/// Candidate graph for one file, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDraft {
    pub name: String,
    pub address_space_base: Option<i64>,
    /// Module-level blocks (no partition).
    pub blocks: Vec<BlockDraft>,
    pub partitions: Vec<PartitionDraft>,
}

impl ModuleDraft {
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Blocks at module level plus those inside partitions.
    pub fn block_count(&self) -> usize {
        self.blocks.len() + self.partitions.iter().map(|p| p.blocks.len()).sum::<usize>()
    }

    pub fn region_count(&self) -> usize {
        self.all_blocks().map(|b| b.regions.len()).sum()
    }

    fn all_blocks(&self) -> impl Iterator<Item = &BlockDraft> {
        self.blocks
            .iter()
            .chain(self.partitions.iter().flat_map(|p| p.blocks.iter()))
    }
}

/// Decompose a parsed document into a module graph.
pub fn decompose(root: &Node) -> Result<ModuleDraft, SchemaError> {
    let module = Fields::of(root, "module".into())?;

    let name = module
        .optional_string("module_name")?
        .unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string());
    let address_space_base = module.optional_int("address_space_base")?;

    let blocks = match module.optional_mapping("kernel_memory_blocks")? {
        Some(entries) => decompose_blocks(entries)?,
        None => Vec::new(),
    };

    let partitions = match module.optional_sequence("partitions")? {
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| decompose_partition(index, item))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ModuleDraft {
        name,
        address_space_base,
        blocks,
        partitions,
    })
}

fn decompose_partition(index: usize, node: &Node) -> Result<PartitionDraft, SchemaError> {
    let partition = Fields::of(node, format!("partition #{index}"))?;

    let name = partition.required_string("part_name")?;
    let space_id = partition.required_int("space_id")?;
    let blocks = match partition.optional_mapping("memory_blocks")? {
        Some(entries) => decompose_blocks(entries)?,
        None => Vec::new(),
    };

    Ok(PartitionDraft {
        name,
        space_id,
        blocks,
    })
}

fn decompose_blocks(entries: &[(String, Node)]) -> Result<Vec<BlockDraft>, SchemaError> {
    entries
        .iter()
        .map(|(name, fields)| decompose_block(name, fields))
        .collect()
}

fn decompose_block(name: &str, node: &Node) -> Result<BlockDraft, SchemaError> {
    let entity = format!("block '{name}'");
    let block = Fields::of(node, entity.clone())?;

    let attributes = BlockAttributes {
        access: block.required_string("access")?,
        align: block.required_int("align")?,
        cache_policy: block.required_string("cache_policy")?,
        content_type: block.optional_string("content_type")?,
        init_file: block.optional_string("init_file")?,
        init_stage: block.optional_string("init_stage")?,
        init_type: block.optional_string("init_type")?,
        is_contiguous: block.required_bool("is_contiguous")?,
        is_shadow: block.required_bool("is_shadow")?,
        is_shareable: block.required_bool("is_shareable")?,
        is_system: block.required_bool("is_system")?,
        no_shadow: block.required_bool("no_shadow")?,
        paddr: block.optional_int("paddr")?,
        vaddr: block.required_int("vaddr")?,
        size: block.optional_int("size")?,
        shadow_offset: block.optional_int("shadow_offset")?,
        shadow_scale: block.optional_int("shadow_scale")?,
        shadow_type: block.optional_string("shadow_type")?,
        safety_zone_before: block.required_int("safety_zone_before")?,
        safety_zone_before_unmapped: block.required_bool("safety_zone_before_unmapped")?,
        safety_zone_after: block.required_int("safety_zone_after")?,
        safety_zone_after_unmapped: block.required_bool("safety_zone_after_unmapped")?,
    };

    let regions = match block.optional_sequence("regions")? {
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| decompose_region(&entity, index, item))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(BlockDraft {
        name: name.to_string(),
        attributes,
        regions,
    })
}

fn decompose_region(block: &str, index: usize, node: &Node) -> Result<RegionDraft, SchemaError> {
    let region = Fields::of(node, format!("{block} region #{index}"))?;
    Ok(RegionDraft {
        paddr: region.required_int("paddr")?,
        size: region.required_int("size")?,
        vaddr: region.required_int("vaddr")?,
    })
}

/// Typed field access over one mapping node, labelled with its entity.
struct Fields<'a> {
    entries: &'a [(String, Node)],
    entity: String,
}

impl<'a> Fields<'a> {
    fn of(node: &'a Node, entity: String) -> Result<Self, SchemaError> {
        match node {
            Node::Mapping(entries) => Ok(Self { entries, entity }),
            other => Err(SchemaError::NotAMapping {
                context: entity,
                found: other.type_name(),
            }),
        }
    }

    /// Present and non-null value for `key`. Null counts as absent.
    fn value(&self, key: &str) -> Option<&'a Node> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    }

    fn missing(&self, field: &'static str) -> SchemaError {
        SchemaError::MissingField {
            field,
            entity: self.entity.clone(),
        }
    }

    fn wrong_type(&self, field: &'static str, expected: &'static str, found: &Node) -> SchemaError {
        SchemaError::WrongType {
            field,
            entity: self.entity.clone(),
            expected,
            found: found.type_name(),
        }
    }

    fn optional_int(&self, field: &'static str) -> Result<Option<i64>, SchemaError> {
        self.value(field)
            .map(|node| as_int(node).ok_or_else(|| self.wrong_type(field, "an integer", node)))
            .transpose()
    }

    fn required_int(&self, field: &'static str) -> Result<i64, SchemaError> {
        self.optional_int(field)?.ok_or_else(|| self.missing(field))
    }

    fn required_bool(&self, field: &'static str) -> Result<bool, SchemaError> {
        match self.value(field) {
            Some(node) => as_bool(node).ok_or_else(|| self.wrong_type(field, "a boolean", node)),
            None => Err(self.missing(field)),
        }
    }

    fn optional_string(&self, field: &'static str) -> Result<Option<String>, SchemaError> {
        self.value(field)
            .map(|node| match node {
                Node::String(s) => Ok(s.clone()),
                Node::Integer(i) => Ok(i.to_string()),
                other => Err(self.wrong_type(field, "a string", other)),
            })
            .transpose()
    }

    fn required_string(&self, field: &'static str) -> Result<String, SchemaError> {
        self.optional_string(field)?.ok_or_else(|| self.missing(field))
    }

    fn optional_mapping(&self, field: &'static str) -> Result<Option<&'a [(String, Node)]>, SchemaError> {
        match self.value(field) {
            Some(Node::Mapping(entries)) => Ok(Some(entries.as_slice())),
            Some(other) => Err(self.wrong_type(field, "a mapping", other)),
            None => Ok(None),
        }
    }

    fn optional_sequence(&self, field: &'static str) -> Result<Option<&'a [Node]>, SchemaError> {
        match self.value(field) {
            Some(Node::Sequence(items)) => Ok(Some(items.as_slice())),
            Some(other) => Err(self.wrong_type(field, "a sequence", other)),
            None => Ok(None),
        }
    }
}

/// Integers, or strings holding a decimal or `0x` hex integer.
fn as_int(node: &Node) -> Option<i64> {
    match node {
        Node::Integer(i) => Some(*i),
        Node::String(s) => parse_int_str(s),
        _ => None,
    }
}

fn parse_int_str(raw: &str) -> Option<i64> {
    let s = raw.trim().replace('_', "");
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s.as_str())),
    };

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<i64>().ok()?
        }
        None => return None,
    };

    Some(if negative { -magnitude } else { magnitude })
}

fn as_bool(node: &Node) -> Option<bool> {
    match node {
        Node::Bool(b) => Some(*b),
        Node::String(s) => parse_bool_str(s),
        _ => None,
    }
}

/// YAML 1.1 boolean spellings a YAML 1.2 parser hands back as strings.
fn parse_bool_str(raw: &str) -> Option<bool> {
    match raw {
        "yes" | "Yes" | "YES" | "on" | "On" | "ON" | "true" | "True" | "TRUE" => Some(true),
        "no" | "No" | "NO" | "off" | "Off" | "OFF" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingest::format::InputFormat;
    use crate::pipeline::ingest::parser::parse_document;

    const B1_FIELDS: &str = r#"access: "rw"
    align: 4
    cache_policy: "wb"
    is_contiguous: true
    is_shadow: false
    is_shareable: false
    is_system: false
    no_shadow: true
    vaddr: 1024
    safety_zone_before: 0
    safety_zone_before_unmapped: false
    safety_zone_after: 0
    safety_zone_after_unmapped: false"#;

    fn yaml(text: &str) -> Node {
        parse_document(text.as_bytes(), InputFormat::Yaml).unwrap()
    }

    fn block_yaml(extra: &str) -> String {
        format!("kernel_memory_blocks:\n  b1:\n    {B1_FIELDS}\n{extra}")
    }

    #[test]
    fn module_level_block_with_region() {
        let doc = yaml(&format!(
            "module_name: m1\nkernel_memory_blocks:\n  b1:\n    {B1_FIELDS}\n    regions:\n      - {{paddr: 1024, size: 256, vaddr: 1024}}\n"
        ));
        let draft = decompose(&doc).unwrap();

        assert_eq!(draft.name, "m1");
        assert_eq!(draft.address_space_base, None);
        assert_eq!(draft.blocks.len(), 1);
        assert!(draft.partitions.is_empty());

        let b1 = &draft.blocks[0];
        assert_eq!(b1.name, "b1");
        assert_eq!(b1.attributes.access, "rw");
        assert_eq!(b1.attributes.align, 4);
        assert!(b1.attributes.no_shadow);
        assert_eq!(b1.attributes.paddr, None);
        assert_eq!(b1.attributes.size, None);
        assert_eq!(b1.regions, vec![RegionDraft { paddr: 1024, size: 256, vaddr: 1024 }]);
    }

    #[test]
    fn partition_owns_its_blocks() {
        let doc = yaml(&format!(
            "module_name: m1\npartitions:\n  - part_name: p1\n    space_id: 7\n    memory_blocks:\n      b2:\n        {}\n",
            B1_FIELDS.replace("\n    ", "\n        ")
        ));
        let draft = decompose(&doc).unwrap();

        assert!(draft.blocks.is_empty());
        assert_eq!(draft.partitions.len(), 1);
        let p1 = &draft.partitions[0];
        assert_eq!((p1.name.as_str(), p1.space_id), ("p1", 7));
        assert_eq!(p1.blocks.len(), 1);
        assert_eq!(p1.blocks[0].name, "b2");
        assert_eq!(draft.block_count(), 1);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let draft = decompose(&yaml("{}")).unwrap();
        assert_eq!(draft.name, DEFAULT_MODULE_NAME);
        assert_eq!(draft.block_count(), 0);
        assert_eq!(draft.partition_count(), 0);
        assert_eq!(draft.region_count(), 0);
    }

    #[test]
    fn null_collections_are_empty() {
        let draft = decompose(&yaml(
            "module_name: ~\nkernel_memory_blocks: ~\npartitions: ~\n",
        ))
        .unwrap();
        assert_eq!(draft.name, DEFAULT_MODULE_NAME);
        assert!(draft.blocks.is_empty());
        assert!(draft.partitions.is_empty());
    }

    #[test]
    fn missing_vaddr_names_field_and_block() {
        let doc = yaml(&block_yaml("").replace("    vaddr: 1024\n", ""));
        let err = decompose(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                field: "vaddr",
                entity: "block 'b1'".into()
            }
        );
    }

    #[test]
    fn null_required_field_counts_as_missing() {
        let doc = yaml(&block_yaml("").replace("align: 4", "align: ~"));
        assert!(matches!(
            decompose(&doc),
            Err(SchemaError::MissingField { field: "align", .. })
        ));
    }

    #[test]
    fn every_required_block_field_enforced() {
        for field in [
            "access",
            "align",
            "cache_policy",
            "is_contiguous",
            "is_shadow",
            "is_shareable",
            "is_system",
            "no_shadow",
            "vaddr",
            "safety_zone_before_unmapped",
            "safety_zone_after_unmapped",
        ] {
            let text: String = block_yaml("")
                .lines()
                .filter(|line| !line.trim_start().starts_with(&format!("{field}:")))
                .map(|line| format!("{line}\n"))
                .collect();
            match decompose(&yaml(&text)) {
                Err(SchemaError::MissingField { field: f, .. }) => assert_eq!(f, field),
                other => panic!("{field}: expected MissingField, got {other:?}"),
            }
        }
    }

    #[test]
    fn safety_zone_sizes_required() {
        let text = block_yaml("").replace("    safety_zone_after: 0\n", "");
        assert!(matches!(
            decompose(&yaml(&text)),
            Err(SchemaError::MissingField { field: "safety_zone_after", .. })
        ));
    }

    #[test]
    fn region_missing_field_names_region() {
        let doc = yaml(&format!(
            "kernel_memory_blocks:\n  b1:\n    {B1_FIELDS}\n    regions:\n      - {{paddr: 0, size: 16, vaddr: 0}}\n      - {{paddr: 0, vaddr: 0}}\n"
        ));
        let err = decompose(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                field: "size",
                entity: "block 'b1' region #1".into()
            }
        );
    }

    #[test]
    fn partition_missing_space_id() {
        let err = decompose(&yaml("partitions:\n  - part_name: p1\n")).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                field: "space_id",
                entity: "partition #0".into()
            }
        );
    }

    #[test]
    fn root_must_be_mapping() {
        let err = decompose(&yaml("- a\n- b\n")).unwrap_err();
        assert!(matches!(err, SchemaError::NotAMapping { found: "sequence", .. }));
        assert!(matches!(
            decompose(&Node::Null),
            Err(SchemaError::NotAMapping { found: "null", .. })
        ));
    }

    #[test]
    fn block_fields_must_be_mapping() {
        let err = decompose(&yaml("kernel_memory_blocks:\n  b1: 12\n")).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NotAMapping {
                context: "block 'b1'".into(),
                found: "integer"
            }
        );
    }

    #[test]
    fn wrong_collection_types_rejected() {
        assert!(matches!(
            decompose(&yaml("partitions: {p1: 1}\n")),
            Err(SchemaError::WrongType { field: "partitions", expected: "a sequence", .. })
        ));
        assert!(matches!(
            decompose(&yaml("kernel_memory_blocks: [a]\n")),
            Err(SchemaError::WrongType { field: "kernel_memory_blocks", .. })
        ));
    }

    #[test]
    fn module_name_must_be_string() {
        assert!(matches!(
            decompose(&yaml("module_name: [m1]\n")),
            Err(SchemaError::WrongType { field: "module_name", .. })
        ));
    }

    #[test]
    fn yaml_1_1_booleans_accepted() {
        let doc = yaml(
            &block_yaml("")
                .replace("is_contiguous: true", "is_contiguous: yes")
                .replace("is_system: false", "is_system: On")
                .replace("no_shadow: true", "no_shadow: NO"),
        );
        let attrs = &decompose(&doc).unwrap().blocks[0].attributes;
        assert!(attrs.is_contiguous);
        assert!(attrs.is_system);
        assert!(!attrs.no_shadow);

        let doc = yaml(&block_yaml("").replace("is_system: false", "is_system: maybe"));
        assert!(matches!(
            decompose(&doc),
            Err(SchemaError::WrongType { field: "is_system", found: "string", .. })
        ));
        let doc = yaml(&block_yaml("").replace("is_system: false", "is_system: yEs"));
        assert!(decompose(&doc).is_err(), "mixed case is not a YAML 1.1 boolean");
    }

    #[test]
    fn optional_field_with_wrong_type_rejected() {
        let doc = yaml(&block_yaml("    size: [1]\n"));
        assert!(matches!(
            decompose(&doc),
            Err(SchemaError::WrongType { field: "size", .. })
        ));
    }

    #[test]
    fn quoted_hex_and_decimal_integers_accepted() {
        let doc = yaml(&format!(
            "address_space_base: \"0x8000_0000\"\n{}",
            block_yaml("    paddr: \"0x1000\"\n    size: \"4096\"\n    shadow_offset: -16\n")
        ));
        let draft = decompose(&doc).unwrap();
        assert_eq!(draft.address_space_base, Some(0x8000_0000));
        let attrs = &draft.blocks[0].attributes;
        assert_eq!(attrs.paddr, Some(0x1000));
        assert_eq!(attrs.size, Some(4096));
        assert_eq!(attrs.shadow_offset, Some(-16));
    }

    #[test]
    fn non_numeric_string_is_wrong_type() {
        let doc = yaml(&block_yaml("").replace("vaddr: 1024", "vaddr: \"high\""));
        assert!(matches!(
            decompose(&doc),
            Err(SchemaError::WrongType { field: "vaddr", expected: "an integer", .. })
        ));
    }

    #[test]
    fn integer_strings_fields_rendered() {
        let doc = yaml(&block_yaml("").replace("access: \"rw\"", "access: 7"));
        let draft = decompose(&doc).unwrap();
        assert_eq!(draft.blocks[0].attributes.access, "7");
    }

    #[test]
    fn tagged_blocks_decompose_like_plain_ones() {
        let doc = yaml(&format!(
            "kernel_memory_blocks:\n  b1: !JetMemoryBlock\n    {B1_FIELDS}\n"
        ));
        let draft = decompose(&doc).unwrap();
        assert_eq!(draft.blocks[0].name, "b1");
    }

    #[test]
    fn document_order_preserved() {
        let doc = yaml(&format!(
            "kernel_memory_blocks:\n  zeta:\n    {B1_FIELDS}\n  alpha:\n    {B1_FIELDS}\n"
        ));
        let names: Vec<_> = decompose(&doc)
            .unwrap()
            .blocks
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[test]
    fn counts_span_partitions() {
        let draft = ModuleDraft {
            name: "m".into(),
            address_space_base: None,
            blocks: vec![BlockDraft {
                name: "a".into(),
                attributes: decompose(&yaml(&block_yaml(""))).unwrap().blocks[0]
                    .attributes
                    .clone(),
                regions: vec![RegionDraft { paddr: 0, size: 1, vaddr: 0 }],
            }],
            partitions: vec![PartitionDraft {
                name: "p".into(),
                space_id: 1,
                blocks: vec![],
            }],
        };
        assert_eq!(draft.block_count(), 1);
        assert_eq!(draft.partition_count(), 1);
        assert_eq!(draft.region_count(), 1);
    }

    #[test]
    fn int_string_parsing() {
        assert_eq!(parse_int_str("42"), Some(42));
        assert_eq!(parse_int_str(" 0X1f "), Some(31));
        assert_eq!(parse_int_str("-0x10"), Some(-16));
        assert_eq!(parse_int_str("1_000"), Some(1000));
        assert_eq!(parse_int_str(""), None);
        assert_eq!(parse_int_str("0x"), None);
        assert_eq!(parse_int_str("12abc"), None);
        assert_eq!(parse_int_str("0xFFFFFFFFFFFFFFFF"), None);
    }
}
