use indexmap::IndexMap;
use serde::Deserialize;

/// A per-provider declarative rewrite table for the Compatibility Mapper stage.
///
/// Loaded once at startup as part of the configuration snapshot and
/// immutable thereafter, mirroring the teacher's `HeaderRule` system
/// (`synapse_core::headers`) generalised from HTTP header rewriting to
/// JSON body field-path rewriting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingTable {
    /// When true, this provider is fully compatible with the core shape:
    /// `mapRequest`/`mapResponse` must return the input unchanged.
    #[serde(default)]
    pub pass_through: bool,
    /// Field rules applied in declaration order for requests
    #[serde(default)]
    pub request_fields: Vec<FieldRule>,
    /// Field rules applied in declaration order for responses
    #[serde(default)]
    pub response_fields: Vec<FieldRule>,
    /// Unknown source fields not named by any rule: drop or preserve
    #[serde(default)]
    pub preserve_unknown_fields: bool,
}

/// One `{ source-field -> target-field, transform, default }` rule.
///
/// Dotted paths are permitted on both sides, e.g. `parameters.temperature`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRule {
    /// Dotted source field path in the core shape
    pub source: String,
    /// Dotted target field path in the provider's wire shape
    pub target: String,
    /// Whether the source field must resolve
    #[serde(default)]
    pub required: bool,
    /// Value to use when the source is absent and not required
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Named transform to apply to the value before writing it
    #[serde(default)]
    pub transform: Option<Transform>,
}

/// The closed set of transforms the Compatibility Mapper knows how to run.
///
/// An unknown transform name is a configuration-load-time failure, not a
/// runtime one — the mapping table is data, not code.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Look up the value in a declared key -> value table, with a default
    /// for unmatched keys
    Mapping {
        table: IndexMap<String, serde_json::Value>,
        #[serde(default)]
        default: Option<serde_json::Value>,
    },
    /// Apply a string operation
    StringTransform { op: StringOp },
    /// For each element of an array value, apply a per-field sub-mapping
    ArrayTransform { fields: Vec<FieldRule> },
}

/// String operations available to `string_transform` rules
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StringOp {
    Prefix { value: String },
    Suffix { value: String },
    RegexReplace { pattern: String, replacement: String },
    Uppercase,
    Lowercase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_pass_through_table() {
        let toml = r#"
            pass_through = true
        "#;
        let table: MappingTable = toml::from_str(toml).unwrap();
        assert!(table.pass_through);
        assert!(table.request_fields.is_empty());
    }

    #[test]
    fn deserializes_field_rule_with_mapping_transform() {
        let toml = r#"
            [[request_fields]]
            source = "model"
            target = "model"
            required = true

            [request_fields.transform]
            kind = "mapping"
            [request_fields.transform.table]
            "gpt-3.5-turbo" = "qwen-turbo"
        "#;
        let table: MappingTable = toml::from_str(toml).unwrap();
        assert_eq!(table.request_fields.len(), 1);
        assert!(matches!(
            table.request_fields[0].transform,
            Some(Transform::Mapping { .. })
        ));
    }
}
