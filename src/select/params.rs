//! Parameter aggregation for tuning-exploration views: collect every
//! distinct value a parameter takes across a batch's outputs, most-varied
//! first. A parameter with a single observed value carries no signal for
//! sensitivity analysis and lands at the end.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::Output;

#[derive(Debug, Clone, Serialize)]
pub struct ParamSummary {
    pub name: String,
    pub values: Vec<Value>,
}

/// Flatten a JSON tree into dot-joined leaf paths. Arrays and scalars are
/// leaves; only objects recurse.
pub fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&path, nested, out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), value.clone());
            }
        }
    }
}

/// Merge an output's tuning parameters with the nested objects of its
/// configuration. String configuration tokens carry no parameters;
/// tuning values win over configuration values on key collision.
pub fn merged_params(output: &Output) -> BTreeMap<String, Value> {
    let mut params = BTreeMap::new();
    match &output.configuration {
        Value::Array(items) => {
            for item in items {
                if item.is_object() {
                    flatten_into("", item, &mut params);
                }
            }
        }
        Value::Object(_) => flatten_into("", &output.configuration, &mut params),
        _ => {}
    }
    flatten_into("", &output.extra_parameters, &mut params);
    params
}

/// Distinct-value sets per parameter across all outputs, ordered by
/// descending cardinality (name ascending as the tie-break). Distinctness
/// is by canonical JSON serialization.
pub fn aggregate_parameters<'a, I>(outputs: I) -> Vec<ParamSummary>
where
    I: IntoIterator<Item = &'a Output>,
{
    let mut observed: BTreeMap<String, (BTreeSet<String>, Vec<Value>)> = BTreeMap::new();
    for output in outputs {
        for (name, value) in merged_params(output) {
            let (seen, values) = observed.entry(name).or_default();
            if seen.insert(value.to_string()) {
                values.push(value);
            }
        }
    }

    let mut summaries: Vec<ParamSummary> = observed
        .into_iter()
        .map(|(name, (_, values))| ParamSummary { name, values })
        .collect();
    summaries.sort_by(|a, b| {
        b.values
            .len()
            .cmp(&a.values.len())
            .then_with(|| a.name.cmp(&b.name))
    });
    summaries
}
