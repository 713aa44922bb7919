//! Batch resolution: turn a requested batch label into an actual batch,
//! with the fallback chain the dashboard relies on when a label is
//! missing.

use crate::model::{Batch, Commit};

/// Resolve a requested label against a commit's batches.
///
/// `None` when the commit or its batch map is absent/empty. When the
/// commit has exactly one batch, or the requested label is not present:
/// fall back to `"default"` if that batch exists with outputs, else the
/// first batch in enumeration order. Otherwise the requested label wins.
pub fn resolve_batch<'a>(commit: Option<&'a Commit>, requested: &str) -> Option<&'a Batch> {
    let batches = &commit?.batches;
    if batches.is_empty() {
        return None;
    }

    let needs_fallback = batches.len() == 1 || !batches.contains_key(requested);
    let label = if needs_fallback {
        match batches.get("default") {
            Some(batch) if !batch.outputs.is_empty() => "default",
            _ => batches.keys().next()?.as_str(),
        }
    } else {
        requested
    };
    batches.get(label)
}

/// Resolve the new and reference selections independently, returning
/// owned copies. Copy-construction on read means that even when both
/// sides resolve to the same underlying batch id, filtering or sorting
/// one side can never contaminate the other.
pub fn resolve_batch_pair(
    new_commit: Option<&Commit>,
    new_label: &str,
    reference_commit: Option<&Commit>,
    reference_label: &str,
) -> (Batch, Batch) {
    let new_batch = resolve_batch(new_commit, new_label)
        .cloned()
        .unwrap_or_else(|| Batch::empty(new_label));
    let reference_batch = resolve_batch(reference_commit, reference_label)
        .cloned()
        .unwrap_or_else(|| Batch::empty(reference_label));
    (new_batch, reference_batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Output;
    use std::collections::BTreeMap;

    fn batch(id: &str, label: &str, output_ids: &[&str]) -> Batch {
        let mut b = Batch::empty(label);
        b.id = id.to_string();
        for oid in output_ids {
            b.outputs.insert(
                oid.to_string(),
                Output {
                    id: oid.to_string(),
                    test_input_path: format!("{oid}.jpg"),
                    configuration: serde_json::Value::Null,
                    extra_parameters: serde_json::Value::Null,
                    metrics: BTreeMap::new(),
                    is_pending: false,
                    is_failed: false,
                    output_dir_url: None,
                },
            );
        }
        b
    }

    fn commit(batches: Vec<Batch>) -> Commit {
        Commit {
            id: "c1".to_string(),
            branch: None,
            config_override: None,
            metrics_override: None,
            batches: batches.into_iter().map(|b| (b.label.clone(), b)).collect(),
        }
    }

    #[test]
    fn test_absent_commit_resolves_to_none() {
        assert!(resolve_batch(None, "default").is_none());
    }

    #[test]
    fn test_empty_batches_resolve_to_none() {
        let c = commit(vec![]);
        assert!(resolve_batch(Some(&c), "default").is_none());
    }

    #[test]
    fn test_requested_label_present() {
        let c = commit(vec![
            batch("b1", "default", &["o1"]),
            batch("b2", "experiment", &["o2"]),
        ]);
        assert_eq!(resolve_batch(Some(&c), "experiment").unwrap().id, "b2");
    }

    #[test]
    fn test_missing_label_falls_back_to_default() {
        let c = commit(vec![batch("b1", "default", &["o1"])]);
        assert_eq!(resolve_batch(Some(&c), "experiment-X").unwrap().label, "default");
    }

    #[test]
    fn test_missing_label_and_empty_default_falls_back_to_first() {
        let c = commit(vec![
            batch("b1", "archive", &["o1"]),
            batch("b2", "default", &[]),
        ]);
        // "default" exists but has no outputs, so enumeration order decides
        assert_eq!(resolve_batch(Some(&c), "missing").unwrap().label, "archive");
    }

    #[test]
    fn test_missing_label_no_default_falls_back_to_first() {
        let c = commit(vec![
            batch("b1", "alpha", &["o1"]),
            batch("b2", "beta", &["o2"]),
        ]);
        assert_eq!(resolve_batch(Some(&c), "missing").unwrap().label, "alpha");
    }

    #[test]
    fn test_sole_batch_always_wins() {
        let c = commit(vec![batch("b1", "nightly", &["o1"])]);
        assert_eq!(resolve_batch(Some(&c), "nightly").unwrap().label, "nightly");
        assert_eq!(resolve_batch(Some(&c), "anything").unwrap().label, "nightly");
    }

    #[test]
    fn test_pair_clone_independence() {
        let c = commit(vec![batch("b1", "default", &["o1", "o2"])]);
        let (new_batch, mut reference_batch) =
            resolve_batch_pair(Some(&c), "default", Some(&c), "default");
        assert_eq!(new_batch.id, reference_batch.id);

        reference_batch.outputs.clear();
        assert_eq!(new_batch.outputs.len(), 2);
        assert_eq!(c.batches["default"].outputs.len(), 2);
    }

    #[test]
    fn test_pair_absent_sides_get_empty_batches() {
        let (new_batch, reference_batch) = resolve_batch_pair(None, "default", None, "other");
        assert!(new_batch.outputs.is_empty());
        assert_eq!(new_batch.label, "default");
        assert_eq!(reference_batch.label, "other");
    }
}
