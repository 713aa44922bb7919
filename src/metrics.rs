//! Metric defaulting: fills missing descriptor fields once, at the store
//! boundary, so no consumer re-derives defaults ad hoc.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::{Metric, MetricCatalog, MetricCatalogPayload, PartialMetric};

/// Fill in defaults for every metric descriptor and drop private entries.
///
/// For each entry: `key` is the map key; `label` defaults to `key`;
/// `short_label` defaults to `label`; `scale` to `1.0`; `suffix` to `""`;
/// `smaller_is_better` to `true`, with the string `"false"` coercing to
/// `false` case-insensitively. Keys starting with `.` are private and
/// removed. Pure and idempotent.
pub fn fill_metric_defaults(raw: BTreeMap<String, PartialMetric>) -> BTreeMap<String, Metric> {
    raw.into_iter()
        .filter(|(key, _)| !key.starts_with('.'))
        .map(|(key, partial)| {
            let label = partial.label.unwrap_or_else(|| key.clone());
            let short_label = partial.short_label.unwrap_or_else(|| label.clone());
            let metric = Metric {
                key: key.clone(),
                label,
                short_label,
                scale: partial.scale.unwrap_or(1.0),
                suffix: partial.suffix.unwrap_or_default(),
                smaller_is_better: coerce_smaller_is_better(partial.smaller_is_better.as_ref()),
                target: partial.target,
            };
            (key, metric)
        })
        .collect()
}

/// Normalize a full metric catalog payload.
pub fn catalog_from_payload(payload: MetricCatalogPayload) -> MetricCatalog {
    MetricCatalog {
        available_metrics: fill_metric_defaults(payload.available_metrics),
        main_metrics: payload.main_metrics,
        default_metric: payload.default_metric,
    }
}

/// `smaller_is_better` arrives as a bool, a string, or not at all. Only
/// JSON `false` and the string `"false"` (any case) mean false.
fn coerce_smaller_is_better(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.eq_ignore_ascii_case("false"),
        _ => true,
    }
}

impl From<Metric> for PartialMetric {
    fn from(metric: Metric) -> Self {
        PartialMetric {
            label: Some(metric.label),
            short_label: Some(metric.short_label),
            scale: Some(metric.scale),
            suffix: Some(metric.suffix),
            smaller_is_better: Some(Value::Bool(metric.smaller_is_better)),
            target: metric.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, Value)]) -> BTreeMap<String, PartialMetric> {
        entries
            .iter()
            .map(|(key, value)| {
                let partial: PartialMetric = serde_json::from_value(value.clone()).unwrap();
                (key.to_string(), partial)
            })
            .collect()
    }

    #[test]
    fn test_empty_descriptor_gets_all_defaults() {
        let result = fill_metric_defaults(raw(&[("latency", serde_json::json!({}))]));
        let metric = &result["latency"];
        assert_eq!(metric.key, "latency");
        assert_eq!(metric.label, "latency");
        assert_eq!(metric.short_label, "latency");
        assert_eq!(metric.scale, 1.0);
        assert_eq!(metric.suffix, "");
        assert!(metric.smaller_is_better);
        assert!(metric.target.is_none());
    }

    #[test]
    fn test_short_label_defaults_to_label() {
        let result = fill_metric_defaults(raw(&[(
            "latency",
            serde_json::json!({"label": "Latency (ms)"}),
        )]));
        assert_eq!(result["latency"].short_label, "Latency (ms)");
    }

    #[test]
    fn test_explicit_fields_kept() {
        let result = fill_metric_defaults(raw(&[(
            "psnr",
            serde_json::json!({
                "label": "PSNR",
                "short_label": "psnr",
                "scale": 2.0,
                "suffix": "dB",
                "smaller_is_better": false,
                "target": 40.0
            }),
        )]));
        let metric = &result["psnr"];
        assert_eq!(metric.label, "PSNR");
        assert_eq!(metric.short_label, "psnr");
        assert_eq!(metric.scale, 2.0);
        assert_eq!(metric.suffix, "dB");
        assert!(!metric.smaller_is_better);
        assert_eq!(metric.target, Some(40.0));
    }

    #[test]
    fn test_smaller_is_better_string_coercion() {
        let result = fill_metric_defaults(raw(&[
            ("a", serde_json::json!({"smaller_is_better": "false"})),
            ("b", serde_json::json!({"smaller_is_better": "FALSE"})),
            ("c", serde_json::json!({"smaller_is_better": "true"})),
            ("d", serde_json::json!({"smaller_is_better": null})),
        ]));
        assert!(!result["a"].smaller_is_better);
        assert!(!result["b"].smaller_is_better);
        assert!(result["c"].smaller_is_better);
        assert!(result["d"].smaller_is_better);
    }

    #[test]
    fn test_private_keys_removed() {
        let result = fill_metric_defaults(raw(&[
            (".internal", serde_json::json!({})),
            ("public", serde_json::json!({})),
        ]));
        assert!(!result.contains_key(".internal"));
        assert!(result.contains_key("public"));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let once = fill_metric_defaults(raw(&[
            ("latency", serde_json::json!({"label": "Latency"})),
            ("psnr", serde_json::json!({"smaller_is_better": "false", "suffix": "dB"})),
        ]));
        let back: BTreeMap<String, PartialMetric> = once
            .clone()
            .into_iter()
            .map(|(key, metric)| (key, metric.into()))
            .collect();
        let twice = fill_metric_defaults(back);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_catalog_conversion_keeps_ordering_fields() {
        let payload: MetricCatalogPayload = serde_json::from_value(serde_json::json!({
            "available_metrics": {"x": {}, ".hidden": {}},
            "main_metrics": ["x"],
            "default_metric": "x"
        }))
        .unwrap();
        let catalog = catalog_from_payload(payload);
        assert_eq!(catalog.main_metrics, vec!["x"]);
        assert_eq!(catalog.default_metric.as_deref(), Some("x"));
        assert!(!catalog.available_metrics.contains_key(".hidden"));
    }
}
