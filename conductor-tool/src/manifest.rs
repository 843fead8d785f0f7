//! Tool manifest parser (§6 "Tool manifest format").
//!
//! A line-oriented key-value format with nested blocks — the
//! implementation-free equivalent of a YAML manifest. One manifest file
//! describes one tool.

use crate::error::ManifestError;
use conductor_protocol::{ToolEntryKind, ToolParam, ToolParamType, ToolStatus};
use std::collections::HashSet;

/// The closed set of top-level manifest keys. Anything else is rejected.
const KNOWN_TOP_LEVEL_KEYS: &[&str] =
    &["name", "version", "description", "category", "tags", "parameter", "returns", "entry", "concurrency"];

/// A parsed tool manifest, prior to being assigned an id and registered.
#[derive(Debug, Clone)]
pub struct ToolManifest {
    /// Unique tool name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Closed-set category tag.
    pub category: String,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Declared parameters.
    pub parameters: Vec<ToolParam>,
    /// Free-form return schema, as a JSON value.
    pub returns: serde_json::Value,
    /// How the tool is invoked.
    pub entry: ToolEntryKind,
    /// Per-tool concurrency ceiling override, if any.
    pub concurrency: Option<usize>,
}

/// Parse one manifest document.
///
/// Block syntax: a bare `key:` line followed by more-indented `field: value`
/// lines opens a block; `parameter:` blocks may repeat. Unknown top-level
/// keys are a hard error (§6 "Unknown top-level keys → validation error").
pub fn parse(source: &str) -> Result<ToolManifest, ManifestError> {
    let lines: Vec<Line> = source
        .lines()
        .enumerate()
        .filter_map(|(n, raw)| {
            let trimmed = raw.trim_end();
            if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
                return None;
            }
            let indent = raw.len() - raw.trim_start().len();
            Some(Line { number: n + 1, indent, text: trimmed.trim().to_string() })
        })
        .collect();

    let mut name = None;
    let mut version = None;
    let mut description = None;
    let mut category = None;
    let mut tags = Vec::new();
    let mut parameters = Vec::new();
    let mut returns = serde_json::Value::Null;
    let mut entry = None;
    let mut concurrency = None;

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if line.indent != 0 {
            return Err(ManifestError::Parse(line.number, "unexpected indentation at top level".into()));
        }
        let (key, inline_value) = split_key_value(&line.text);
        if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
            return Err(ManifestError::UnknownKey(key));
        }

        match key.as_str() {
            "name" => name = Some(require_value(&line, inline_value)?),
            "version" => version = Some(require_value(&line, inline_value)?),
            "description" => description = Some(require_value(&line, inline_value)?),
            "category" => category = Some(require_value(&line, inline_value)?),
            "tags" => {
                tags = require_value(&line, inline_value)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "parameter" => {
                let (block, consumed) = collect_block(&lines, i + 1, line.indent);
                parameters.push(parse_parameter(&block, line.number)?);
                i += consumed;
            }
            "returns" => {
                let (block, consumed) = collect_block(&lines, i + 1, line.indent);
                returns = block_to_json(&block);
                i += consumed;
            }
            "entry" => {
                let (block, consumed) = collect_block(&lines, i + 1, line.indent);
                entry = Some(parse_entry(&block, line.number)?);
                i += consumed;
            }
            "concurrency" => {
                let raw = require_value(&line, inline_value)?;
                concurrency = Some(
                    raw.parse::<usize>()
                        .map_err(|_| ManifestError::Parse(line.number, format!("invalid concurrency value: {raw}")))?,
                );
            }
            _ => unreachable!("filtered by KNOWN_TOP_LEVEL_KEYS"),
        }
        i += 1;
    }

    Ok(ToolManifest {
        name: name.ok_or(ManifestError::MissingField("name"))?,
        version: version.ok_or(ManifestError::MissingField("version"))?,
        description: description.ok_or(ManifestError::MissingField("description"))?,
        category: category.ok_or(ManifestError::MissingField("category"))?,
        tags,
        parameters,
        returns,
        entry: entry.ok_or(ManifestError::MissingField("entry"))?,
        concurrency,
    })
}

struct Line {
    number: usize,
    indent: usize,
    text: String,
}

fn split_key_value(text: &str) -> (String, Option<String>) {
    match text.split_once(':') {
        Some((k, v)) if !v.trim().is_empty() => (k.trim().to_string(), Some(v.trim().to_string())),
        Some((k, _)) => (k.trim().to_string(), None),
        None => (text.trim().to_string(), None),
    }
}

fn require_value(line: &Line, inline: Option<String>) -> Result<String, ManifestError> {
    inline.ok_or_else(|| ManifestError::Parse(line.number, format!("expected a value on line: {}", line.text)))
}

/// Collect the contiguous run of lines more indented than `parent_indent`,
/// starting at `start`. Returns the block and how many lines were consumed.
fn collect_block(lines: &[Line], start: usize, parent_indent: usize) -> (Vec<(String, String)>, usize) {
    let mut block = Vec::new();
    let mut consumed = 0;
    for line in &lines[start..] {
        if line.indent <= parent_indent {
            break;
        }
        let (k, v) = split_key_value(&line.text);
        block.push((k, v.unwrap_or_default()));
        consumed += 1;
    }
    (block, consumed)
}

fn block_to_json(block: &[(String, String)]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> =
        block.iter().map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone()))).collect();
    serde_json::Value::Object(map)
}

fn parse_parameter(block: &[(String, String)], line_number: usize) -> Result<ToolParam, ManifestError> {
    let get = |key: &str| block.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    let name = get("name").ok_or(ManifestError::MissingField("parameter.name"))?;
    let param_type = match get("type").ok_or(ManifestError::MissingField("parameter.type"))?.as_str() {
        "string" => ToolParamType::String,
        "number" => ToolParamType::Number,
        "boolean" => ToolParamType::Boolean,
        "object" => ToolParamType::Object,
        "array" => ToolParamType::Array,
        other => return Err(ManifestError::Parse(line_number, format!("unknown parameter type: {other}"))),
    };
    let required = get("required").map(|v| v == "true").unwrap_or(false);
    let default = get("default").map(|v| infer_scalar(&v));
    let enum_values = get("enum").map(|v| v.split(',').map(|s| infer_scalar(s.trim())).collect());
    Ok(ToolParam { name, param_type, required, default, enum_values })
}

fn infer_scalar(raw: &str) -> serde_json::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return serde_json::Value::Bool(b);
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return serde_json::Value::Number(num);
        }
    }
    serde_json::Value::String(raw.to_string())
}

fn parse_entry(block: &[(String, String)], line_number: usize) -> Result<ToolEntryKind, ManifestError> {
    let get = |key: &str| block.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    let entry_type = get("type").ok_or(ManifestError::MissingField("entry.type"))?;
    match entry_type.as_str() {
        "builtin" => Ok(ToolEntryKind::Builtin {
            handler: get("handler").ok_or(ManifestError::MissingField("entry.handler"))?,
        }),
        "http" => Ok(ToolEntryKind::Http { url: get("url").ok_or(ManifestError::MissingField("entry.url"))? }),
        "script-a" => Ok(ToolEntryKind::ScriptA {
            handler: get("handler").ok_or(ManifestError::MissingField("entry.handler"))?,
        }),
        "script-b" => Ok(ToolEntryKind::ScriptB {
            handler: get("handler").ok_or(ManifestError::MissingField("entry.handler"))?,
        }),
        other => Err(ManifestError::Parse(line_number, format!("unknown entry type: {other}"))),
    }
}

/// Initial status assigned to every freshly loaded manifest.
pub fn initial_status() -> ToolStatus {
    ToolStatus::Draft
}

/// Validate that tag values are free of duplicates (defensive; the
/// manifest format allows a comma list but not repeats).
pub fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: web_search
version: 1.0.0
description: Searches the web
category: search
tags: web, search
parameter:
  name: query
  type: string
  required: true
parameter:
  name: limit
  type: number
  required: false
  default: 10
returns:
  type: object
entry:
  type: http
  url: https://example.com/search
concurrency: 4
"#;

    #[test]
    fn parses_full_manifest() {
        let manifest = parse(SAMPLE).unwrap();
        assert_eq!(manifest.name, "web_search");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.tags, vec!["web", "search"]);
        assert_eq!(manifest.parameters.len(), 2);
        assert_eq!(manifest.parameters[0].name, "query");
        assert!(manifest.parameters[0].required);
        assert_eq!(manifest.parameters[1].default, Some(serde_json::json!(10.0)));
        assert!(matches!(manifest.entry, ToolEntryKind::Http { .. }));
        assert_eq!(manifest.concurrency, Some(4));
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let source = "name: x\nversion: 1.0.0\ndescription: d\ncategory: c\nbogus: 1\nentry:\n  type: builtin\n  handler: h\n";
        let err = parse(source).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownKey(k) if k == "bogus"));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let source = "name: x\nversion: 1.0.0\ndescription: d\ncategory: c\nentry:\n  type: builtin\n";
        let err = parse(source).unwrap_err();
        assert!(matches!(err, ManifestError::MissingField("entry.handler")));
    }
}
