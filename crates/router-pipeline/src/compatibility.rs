//! Stage: Compatibility Mapper (spec.md §4.5).
//!
//! Executes a provider's declarative [`router_config::MappingTable`]
//! against a request or response body, read and written as plain JSON so
//! the rules stay pure data rather than code, mirroring the teacher's
//! `synapse_core::headers::apply_header_rules` generalised from HTTP
//! header rewriting to JSON body field-path rewriting.

use router_config::{FieldRule, MappingTable, StringOp, Transform};
use router_core::CoreError;
use serde_json::Value;

/// Apply `table`'s request-side rules to `request`, producing the shape a
/// provider expects on the wire.
///
/// Pass-through providers return the input unchanged (spec.md §4.5
/// "Pass-through mode").
///
/// # Errors
///
/// Returns `CoreError::InvalidRequest` if a required source field is
/// absent.
pub fn map_request(request: &Value, table: &MappingTable) -> Result<Value, CoreError> {
    if table.pass_through {
        return Ok(request.clone());
    }
    apply_rules(request, &table.request_fields, table.preserve_unknown_fields)
}

/// Apply `table`'s response-side rules to `response`, un-mapping a
/// provider's wire shape back toward the core response shape.
///
/// # Errors
///
/// Returns `CoreError::InvalidRequest` if a required source field is
/// absent.
pub fn map_response(response: &Value, table: &MappingTable) -> Result<Value, CoreError> {
    if table.pass_through {
        return Ok(response.clone());
    }
    apply_rules(response, &table.response_fields, table.preserve_unknown_fields)
}

fn apply_rules(input: &Value, rules: &[FieldRule], preserve_unknown: bool) -> Result<Value, CoreError> {
    let mut output = if preserve_unknown { input.clone() } else { Value::Object(serde_json::Map::new()) };

    for rule in rules {
        apply_one_rule(input, &mut output, rule)?;
    }

    Ok(output)
}

fn apply_one_rule(input: &Value, output: &mut Value, rule: &FieldRule) -> Result<(), CoreError> {
    let value = get_path(input, &rule.source);

    let resolved = match value {
        Some(v) => Some(apply_transform(v, rule.transform.as_ref())?),
        None if rule.required => {
            return Err(CoreError::InvalidRequest(format!(
                "required field '{}' is absent from the request",
                rule.source
            )));
        }
        None => rule.default.clone(),
    };

    if let Some(v) = resolved {
        set_path(output, &rule.target, v);
    }

    Ok(())
}

fn apply_transform(value: Value, transform: Option<&Transform>) -> Result<Value, CoreError> {
    let Some(transform) = transform else { return Ok(value) };

    match transform {
        Transform::Mapping { table, default } => {
            let key = value.as_str().map(str::to_owned).unwrap_or_else(|| value.to_string());
            Ok(table.get(&key).cloned().or_else(|| default.clone()).unwrap_or(value))
        }
        Transform::StringTransform { op } => {
            let Some(text) = value.as_str() else { return Ok(value) };
            Ok(Value::String(apply_string_op(text, op)))
        }
        Transform::ArrayTransform { fields } => {
            let Value::Array(items) = value else { return Ok(value) };
            let mut mapped = Vec::with_capacity(items.len());
            for item in &items {
                let mut element = Value::Object(serde_json::Map::new());
                for field in fields {
                    apply_one_rule(item, &mut element, field)?;
                }
                mapped.push(element);
            }
            Ok(Value::Array(mapped))
        }
    }
}

fn apply_string_op(text: &str, op: &StringOp) -> String {
    match op {
        StringOp::Prefix { value } => format!("{value}{text}"),
        StringOp::Suffix { value } => format!("{text}{value}"),
        StringOp::RegexReplace { pattern, replacement } => regex::Regex::new(pattern)
            .map(|re| re.replace_all(text, replacement.as_str()).into_owned())
            .unwrap_or_else(|_| text.to_owned()),
        StringOp::Uppercase => text.to_uppercase(),
        StringOp::Lowercase => text.to_lowercase(),
    }
}

/// Read a dotted path (e.g. `parameters.temperature`) out of a JSON value.
fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// Write a dotted path into a JSON value, creating intermediate objects as needed.
fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let map = current.as_object_mut().expect("just coerced to object");

        if segments.peek().is_none() {
            map.insert(segment.to_owned(), value);
            return;
        }

        current = map.entry(segment.to_owned()).or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn pass_through_returns_input_unchanged() {
        let table = MappingTable { pass_through: true, ..Default::default() };
        let input = serde_json::json!({"model": "gpt-4"});
        assert_eq!(map_request(&input, &table).unwrap(), input);
    }

    #[test]
    fn renames_a_field_with_dotted_target() {
        let table = MappingTable {
            request_fields: vec![FieldRule {
                source: "messages".into(),
                target: "input.messages".into(),
                required: true,
                default: None,
                transform: None,
            }],
            ..Default::default()
        };
        let input = serde_json::json!({"messages": ["hi"]});
        let mapped = map_request(&input, &table).unwrap();
        assert_eq!(mapped["input"]["messages"], serde_json::json!(["hi"]));
    }

    #[test]
    fn missing_required_field_fails() {
        let table = MappingTable {
            request_fields: vec![FieldRule {
                source: "model".into(),
                target: "model".into(),
                required: true,
                default: None,
                transform: None,
            }],
            ..Default::default()
        };
        let input = serde_json::json!({});
        assert!(matches!(map_request(&input, &table), Err(CoreError::InvalidRequest(_))));
    }

    #[test]
    fn missing_optional_field_uses_default() {
        let table = MappingTable {
            request_fields: vec![FieldRule {
                source: "top_p".into(),
                target: "top_p".into(),
                required: false,
                default: Some(serde_json::json!(1.0)),
                transform: None,
            }],
            ..Default::default()
        };
        let mapped = map_request(&serde_json::json!({}), &table).unwrap();
        assert_eq!(mapped["top_p"], serde_json::json!(1.0));
    }

    #[test]
    fn mapping_transform_renames_model_id() {
        let mut lookup = IndexMap::new();
        lookup.insert("gpt-3.5-turbo".to_owned(), serde_json::json!("qwen-turbo"));
        let table = MappingTable {
            request_fields: vec![FieldRule {
                source: "model".into(),
                target: "model".into(),
                required: true,
                default: None,
                transform: Some(Transform::Mapping { table: lookup, default: None }),
            }],
            ..Default::default()
        };
        let mapped = map_request(&serde_json::json!({"model": "gpt-3.5-turbo"}), &table).unwrap();
        assert_eq!(mapped["model"], serde_json::json!("qwen-turbo"));
    }

    #[test]
    fn unknown_fields_dropped_unless_preserved() {
        let table = MappingTable {
            request_fields: vec![FieldRule {
                source: "model".into(),
                target: "model".into(),
                required: true,
                default: None,
                transform: None,
            }],
            preserve_unknown_fields: false,
            ..Default::default()
        };
        let mapped = map_request(&serde_json::json!({"model": "m", "extra": 1}), &table).unwrap();
        assert!(mapped.get("extra").is_none());
    }

    #[test]
    fn unknown_fields_preserved_when_configured() {
        let table = MappingTable {
            request_fields: vec![FieldRule {
                source: "model".into(),
                target: "model".into(),
                required: true,
                default: None,
                transform: None,
            }],
            preserve_unknown_fields: true,
            ..Default::default()
        };
        let mapped = map_request(&serde_json::json!({"model": "m", "extra": 1}), &table).unwrap();
        assert_eq!(mapped["extra"], serde_json::json!(1));
    }
}
