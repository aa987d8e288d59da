use std::path::Path;

use serde::{Deserialize, Serialize};

/// Input document formats the ingest pipeline understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Yaml,
    Json,
    Unsupported,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the document format from the file name suffix alone.
///
/// `.yaml`/`.yml` → YAML, `.json` → JSON, anything else is unsupported.
/// Suffixes compare case-insensitively; contents are never inspected.
pub fn detect_format(filename: &str) -> InputFormat {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("yaml") | Some("yml") => InputFormat::Yaml,
        Some("json") => InputFormat::Json,
        _ => InputFormat::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_suffixes() {
        assert_eq!(detect_format("layout.yaml"), InputFormat::Yaml);
        assert_eq!(detect_format("layout.yml"), InputFormat::Yaml);
        assert_eq!(detect_format("nested/dir/layout.yml"), InputFormat::Yaml);
    }

    #[test]
    fn json_suffix() {
        assert_eq!(detect_format("layout.json"), InputFormat::Json);
    }

    #[test]
    fn suffix_case_ignored() {
        assert_eq!(detect_format("LAYOUT.YAML"), InputFormat::Yaml);
        assert_eq!(detect_format("Layout.Json"), InputFormat::Json);
    }

    #[test]
    fn everything_else_unsupported() {
        for name in ["layout.txt", "layout", "yaml", ".yaml.bak", "layout.jsonl", "layout.yaml~", ""] {
            assert_eq!(detect_format(name), InputFormat::Unsupported, "name={name:?}");
        }
    }

    #[test]
    fn hidden_yaml_file_has_no_extension() {
        // Path::extension treats ".yaml" as a stem, not a suffix.
        assert_eq!(detect_format(".yaml"), InputFormat::Unsupported);
    }

    #[test]
    fn supported_flag() {
        assert!(InputFormat::Yaml.is_supported());
        assert!(InputFormat::Json.is_supported());
        assert!(!InputFormat::Unsupported.is_supported());
    }
}
