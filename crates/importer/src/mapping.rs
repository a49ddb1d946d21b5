//! Mapping documents
//!
//! Declarative header→field mappings, loaded from YAML. Version 1 only.
//! Unknown keys anywhere in the document are a load error; a typo in a
//! mapping must not silently drop a column.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::cell::CellType;
use crate::error::{ImportError, Result};

/// Natural keys the upsert lookup understands.
const KNOWN_NATURAL_KEYS: &[&str] = &["serial", "name", "mgmt_ip", "vlan_id"];

/// Subtype tables a sheet may target.
const KNOWN_SUBTYPES: &[&str] = &["switch_details", "vlan_details"];

/// The only defined computed function.
const FN_CIDR_FROM: &str = "cidr_from";

/// The built-in mapping shipped with the importer.
const BUILTIN_MAPPING: &str = include_str!("../mappings/default.yaml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDoc {
    pub version: u32,
    #[serde(default)]
    pub default_fields: HashMap<String, String>,
    pub sheets: HashMap<String, SheetMapping>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetMapping {
    pub asset_type: String,
    /// Ordered; the first key whose value is present and matches an existing
    /// asset decides that the row is an update.
    pub natural_key: Vec<String>,
    /// field → alternative header spellings
    #[serde(default)]
    pub aliases: HashMap<String, Vec<String>>,
    /// HEADER → column spec
    pub columns: HashMap<String, ColumnSpec>,
    #[serde(default)]
    pub computed: HashMap<String, ComputedSpec>,
    #[serde(default)]
    pub subtype: Option<String>,
    /// subtype field → source field in the parsed row
    #[serde(default)]
    pub subtype_fields: HashMap<String, String>,
    /// Literal asset-field overrides applied to every row
    #[serde(default)]
    pub to_asset: HashMap<String, serde_yaml::Value>,
}

/// One declared column. The YAML shape is `{ field: name, type: INT? }`;
/// a trailing `?` marks the column optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawColumn")]
pub struct ColumnSpec {
    pub field: String,
    pub ty: CellType,
    pub optional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawColumn {
    field: String,
    #[serde(rename = "type")]
    ty: String,
}

impl TryFrom<RawColumn> for ColumnSpec {
    type Error = String;

    fn try_from(raw: RawColumn) -> std::result::Result<Self, String> {
        let (name, optional) = match raw.ty.strip_suffix('?') {
            Some(name) => (name, true),
            None => (raw.ty.as_str(), false),
        };
        let ty = CellType::parse(name).ok_or_else(|| format!("unknown column type: {}", name))?;
        Ok(ColumnSpec {
            field: raw.field,
            ty,
            optional,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputedSpec {
    #[serde(rename = "fn")]
    pub func: String,
    pub args: Vec<String>,
}

impl MappingDoc {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: MappingDoc = serde_yaml::from_str(yaml)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load a mapping from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ImportError::Mapping(format!("cannot read mapping: {}", e)))?;
        Self::from_yaml(&yaml)
    }

    /// The default mapping compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_MAPPING).expect("built-in mapping must parse")
    }

    fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ImportError::Mapping(format!(
                "unsupported mapping version: {}",
                self.version
            )));
        }
        for (name, sheet) in &self.sheets {
            if sheet.asset_type.trim().is_empty() {
                return Err(ImportError::Mapping(format!(
                    "sheet {}: asset_type is required",
                    name
                )));
            }
            if sheet.natural_key.is_empty() {
                return Err(ImportError::Mapping(format!(
                    "sheet {}: natural_key must not be empty",
                    name
                )));
            }
            for key in &sheet.natural_key {
                if !KNOWN_NATURAL_KEYS.contains(&key.as_str()) {
                    return Err(ImportError::Mapping(format!(
                        "sheet {}: unsupported natural key: {}",
                        name, key
                    )));
                }
            }
            if let Some(subtype) = &sheet.subtype {
                if !KNOWN_SUBTYPES.contains(&subtype.as_str()) {
                    return Err(ImportError::Mapping(format!(
                        "sheet {}: unknown subtype table: {}",
                        name, subtype
                    )));
                }
            }
            for (target, spec) in &sheet.computed {
                if spec.func != FN_CIDR_FROM {
                    return Err(ImportError::Mapping(format!(
                        "sheet {}: unknown computed fn for {}: {}",
                        name, target, spec.func
                    )));
                }
                if spec.args.len() != 2 {
                    return Err(ImportError::Mapping(format!(
                        "sheet {}: {} takes exactly two args",
                        name, FN_CIDR_FROM
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SheetMapping {
    /// Headers that may stand in for a declared column, canonical name first.
    pub fn header_candidates<'a>(&'a self, header: &'a str, field: &str) -> Vec<&'a str> {
        let mut candidates = vec![header];
        if let Some(aliases) = self.aliases.get(field) {
            candidates.extend(aliases.iter().map(String::as_str));
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_mapping_parses() {
        let doc = MappingDoc::builtin();
        assert_eq!(doc.version, 1);
        assert!(doc.sheets.contains_key("Switches"));
        assert!(doc.sheets.contains_key("VLANs"));

        let switches = &doc.sheets["Switches"];
        assert_eq!(switches.asset_type, "switch");
        assert_eq!(switches.subtype.as_deref(), Some("switch_details"));
        assert_eq!(switches.natural_key[0], "serial");
    }

    #[test]
    fn test_optional_marker() {
        let doc = MappingDoc::from_yaml(
            r#"
version: 1
sheets:
  Devices:
    asset_type: device
    natural_key: [serial]
    columns:
      SERIAL: { field: serial, type: TEXT }
      NOTES: { field: notes, type: TEXT? }
"#,
        )
        .unwrap();
        let sheet = &doc.sheets["Devices"];
        assert!(!sheet.columns["SERIAL"].optional);
        assert!(sheet.columns["NOTES"].optional);
    }

    #[test]
    fn test_unknown_mapping_key_rejected() {
        let err = MappingDoc::from_yaml(
            r#"
version: 1
sheets:
  Devices:
    asset_type: device
    natural_key: [serial]
    colums:
      SERIAL: { field: serial, type: TEXT }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Mapping(_)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = MappingDoc::from_yaml(
            r#"
version: 1
sheets:
  Devices:
    asset_type: device
    natural_key: [serial]
    columns:
      SERIAL: { field: serial, type: UUID }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Mapping(_)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let err = MappingDoc::from_yaml("version: 2\nsheets: {}\n").unwrap_err();
        assert!(matches!(err, ImportError::Mapping(_)));
    }

    #[test]
    fn test_unknown_natural_key_rejected() {
        let err = MappingDoc::from_yaml(
            r#"
version: 1
sheets:
  Devices:
    asset_type: device
    natural_key: [hostname]
    columns:
      NAME: { field: name, type: TEXT }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Mapping(_)));
    }

    #[test]
    fn test_unknown_computed_fn_rejected() {
        let err = MappingDoc::from_yaml(
            r#"
version: 1
sheets:
  Devices:
    asset_type: device
    natural_key: [name]
    columns:
      NAME: { field: name, type: TEXT }
    computed:
      subnet: { fn: concat, args: [a, b] }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::Mapping(_)));
    }
}
