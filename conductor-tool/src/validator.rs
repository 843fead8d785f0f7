//! Tool parameter validator (§4.6).

use conductor_protocol::{ToolParam, ValidationIssue};
use serde_json::{Map, Value};

/// Validate and default-fill `params` against `declared`. On success,
/// returns the params object with defaults filled in for absent optional
/// parameters. Unknown parameters are rejected unless `lenient` is set.
pub fn validate(declared: &[ToolParam], params: &Value, lenient: bool) -> Result<Value, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let input = params.as_object().cloned().unwrap_or_default();
    let mut filled = Map::new();

    for param in declared {
        match input.get(&param.name) {
            Some(value) => {
                if !param.param_type.matches(value) {
                    issues.push(
                        ValidationIssue::new(
                            "type_mismatch",
                            format!("parameter {} expected {:?}", param.name, param.param_type),
                            format!("params.{}", param.name),
                        )
                        .with_meta(serde_json::json!({"expected": param.param_type})),
                    );
                    continue;
                }
                if let Some(allowed) = &param.enum_values {
                    if !allowed.contains(value) {
                        issues.push(
                            ValidationIssue::new(
                                "invalid_enum_value",
                                format!("parameter {} is not one of the allowed values", param.name),
                                format!("params.{}", param.name),
                            )
                            .with_meta(serde_json::json!({"allowed": allowed})),
                        );
                        continue;
                    }
                }
                filled.insert(param.name.clone(), value.clone());
            }
            None if param.required => {
                issues.push(ValidationIssue::new(
                    "missing_required",
                    format!("missing required parameter: {}", param.name),
                    format!("params.{}", param.name),
                ));
            }
            None => {
                if let Some(default) = &param.default {
                    filled.insert(param.name.clone(), default.clone());
                }
            }
        }
    }

    if !lenient {
        let declared_names: std::collections::HashSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
        for key in input.keys() {
            if !declared_names.contains(key.as_str()) {
                issues.push(ValidationIssue::new(
                    "unknown_parameter",
                    format!("unknown parameter: {key}"),
                    format!("params.{key}"),
                ));
            }
        }
    }

    if issues.is_empty() {
        Ok(Value::Object(filled))
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_protocol::ToolParamType;

    fn param(name: &str, ty: ToolParamType, required: bool) -> ToolParam {
        ToolParam { name: name.into(), param_type: ty, required, default: None, enum_values: None }
    }

    #[test]
    fn fills_defaults_for_absent_optional() {
        let declared = vec![ToolParam {
            name: "limit".into(),
            param_type: ToolParamType::Number,
            required: false,
            default: Some(serde_json::json!(10)),
            enum_values: None,
        }];
        let filled = validate(&declared, &serde_json::json!({}), false).unwrap();
        assert_eq!(filled["limit"], serde_json::json!(10));
    }

    #[test]
    fn rejects_missing_required() {
        let declared = vec![param("query", ToolParamType::String, true)];
        let err = validate(&declared, &serde_json::json!({}), false).unwrap_err();
        assert_eq!(err[0].code, "missing_required");
    }

    #[test]
    fn rejects_type_mismatch() {
        let declared = vec![param("query", ToolParamType::String, true)];
        let err = validate(&declared, &serde_json::json!({"query": 5}), false).unwrap_err();
        assert_eq!(err[0].code, "type_mismatch");
    }

    #[test]
    fn rejects_unknown_parameter_unless_lenient() {
        let declared = vec![param("query", ToolParamType::String, true)];
        let params = serde_json::json!({"query": "hi", "extra": 1});
        assert!(validate(&declared, &params, false).is_err());
        assert!(validate(&declared, &params, true).is_ok());
    }

    #[test]
    fn rejects_invalid_enum_value() {
        let declared = vec![ToolParam {
            name: "mode".into(),
            param_type: ToolParamType::String,
            required: true,
            default: None,
            enum_values: Some(vec![serde_json::json!("fast"), serde_json::json!("slow")]),
        }];
        let err = validate(&declared, &serde_json::json!({"mode": "turbo"}), false).unwrap_err();
        assert_eq!(err[0].code, "invalid_enum_value");
    }
}
