//! Output filtering and sorting: the filtered/sorted `OutputView` lists
//! every comparison table and plot consumes.

use serde_json::Value;
use std::cmp::Ordering;

use crate::model::{Batch, Output, OutputView, SortOrder};
use crate::select::params::merged_params;

/// Build the derived view of every output in a batch. Raw outputs stay
/// untouched; derived fields live only on the views.
pub fn build_views(batch: &Batch) -> Vec<OutputView> {
    batch.outputs.values().map(to_view).collect()
}

fn to_view(output: &Output) -> OutputView {
    OutputView {
        id: output.id.clone(),
        test_input_path: output.test_input_path.clone(),
        configuration: output.configuration.clone(),
        configurations_str: serialize_configuration(&output.configuration),
        params: merged_params(output),
        metrics: output.metrics.clone(),
        is_pending: output.is_pending,
        is_failed: output.is_failed,
        output_dir_url: output.output_dir_url.clone(),
        reference_id: None,
        reference_mismatch: false,
    }
}

fn serialize_configuration(configuration: &Value) -> String {
    match configuration {
        Value::Null => String::new(),
        Value::String(token) => token.clone(),
        other => other.to_string(),
    }
}

/// Keep the outputs whose haystack (input path + serialized configuration
/// + serialized parameters) contains the filter, case-insensitively. The
/// empty filter keeps everything.
pub fn filter_views(views: Vec<OutputView>, filter: &str) -> Vec<OutputView> {
    if filter.is_empty() {
        return views;
    }
    let needle = filter.to_lowercase();
    views
        .into_iter()
        .filter(|view| haystack(view).contains(&needle))
        .collect()
}

fn haystack(view: &OutputView) -> String {
    let params_str = serde_json::to_string(&view.params).unwrap_or_default();
    format!(
        "{} {} {}",
        view.test_input_path, view.configurations_str, params_str
    )
    .to_lowercase()
}

/// The comparison key for one output, in priority order: metric value →
/// flattened parameter (dot-joined path) → top-level field → the output
/// id as a stable fallback. `None` (explicit nulls, NaN metrics) sorts
/// to the end regardless of direction.
#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Number(f64),
    Text(String),
}

fn sort_key(view: &OutputView, sort_by: &str) -> Option<SortValue> {
    if let Some(value) = view.metrics.get(sort_by) {
        if value.is_nan() {
            return None;
        }
        return Some(SortValue::Number(*value));
    }
    if let Some(value) = view.params.get(sort_by) {
        return json_sort_value(value);
    }
    match sort_by {
        "id" => Some(SortValue::Text(view.id.clone())),
        "test_input_path" => Some(SortValue::Text(view.test_input_path.clone())),
        "configuration" | "configurations_str" => {
            Some(SortValue::Text(view.configurations_str.clone()))
        }
        "is_pending" => Some(SortValue::Number(u8::from(view.is_pending).into())),
        "is_failed" => Some(SortValue::Number(u8::from(view.is_failed).into())),
        _ => Some(SortValue::Text(view.id.clone())),
    }
}

fn json_sort_value(value: &Value) -> Option<SortValue> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(SortValue::Number(n.as_f64().unwrap_or(0.0))),
        Value::Bool(b) => Some(SortValue::Number(u8::from(*b).into())),
        Value::String(s) => Some(SortValue::Text(s.clone())),
        other => Some(SortValue::Text(other.to_string())),
    }
}

fn compare_values(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Number(x), SortValue::Number(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
        (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
    }
}

/// Stable sort by the resolved key. The order flag reverses key
/// comparison only; missing keys stay at the end either way.
pub fn sort_views(views: Vec<OutputView>, sort_by: &str, order: SortOrder) -> Vec<OutputView> {
    let mut decorated: Vec<(Option<SortValue>, OutputView)> = views
        .into_iter()
        .map(|view| (sort_key(&view, sort_by), view))
        .collect();

    decorated.sort_by(|(a, _), (b, _)| match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = compare_values(a, b);
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        }
    });

    decorated.into_iter().map(|(_, view)| view).collect()
}
