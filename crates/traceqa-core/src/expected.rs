use crate::error::{CoreError, CoreResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// question -> answer
pub type QaMap = BTreeMap<String, String>;

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// Reads a query->answer object or an array of `{query, answer}` objects.
/// Pairs with a blank or non-string side are dropped; nothing left is an
/// error.
pub fn qa_map_from_value(value: &Value) -> CoreResult<QaMap> {
    let mut pairs = QaMap::new();
    match value {
        Value::Object(obj) => {
            for (query, answer) in obj {
                if query.trim().is_empty() {
                    continue;
                }
                if let Some(answer) = non_blank(Some(answer)) {
                    pairs.insert(query.clone(), answer.to_string());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if let (Some(query), Some(answer)) =
                    (non_blank(item.get("query")), non_blank(item.get("answer")))
                {
                    pairs.insert(query.to_string(), answer.to_string());
                }
            }
        }
        _ => {
            return Err(CoreError::validation(
                "expected an object of query -> answer or an array of {query, answer} pairs",
            ))
        }
    }

    if pairs.is_empty() {
        return Err(CoreError::validation("no valid QA pairs found"));
    }
    Ok(pairs)
}

pub fn parse_qa_map(raw: &str) -> CoreResult<QaMap> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| CoreError::validation(format!("invalid JSON file: {err}")))?;
    qa_map_from_value(&value)
}

/// Expected answers for an evaluation run: the uploaded override when one is
/// given, otherwise the default map. The override is fully validated before
/// it replaces anything.
pub fn resolve_expected(default: &QaMap, override_raw: Option<&str>) -> CoreResult<QaMap> {
    match override_raw {
        Some(raw) => parse_qa_map(raw),
        None => Ok(default.clone()),
    }
}
