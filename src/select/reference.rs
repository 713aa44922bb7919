//! Reference matching: pair each "new" output with its counterpart in the
//! reference batch by input/configuration identity, flagging ambiguous or
//! approximate pairings so views can warn instead of silently diffing
//! unrelated results.

use crate::model::OutputView;

/// Attach reference ids to every new view. Candidates are the *filtered*
/// reference views: a counterpart hidden by the current filter is treated
/// as absent.
pub fn attach_references(new_views: &mut [OutputView], reference_views: &[OutputView]) {
    for view in new_views.iter_mut() {
        let (reference_id, mismatch) = match_reference(view, reference_views);
        view.reference_id = reference_id;
        view.reference_mismatch = mismatch;
    }
}

/// Identity is the (`test_input_path`, `configuration`) tuple, compared by
/// equality. A unique exact hit is a clean match. Several exact hits take
/// the first candidate with the mismatch flag set; no exact hit falls back
/// to the first same-input candidate, also flagged. Nothing at all leaves
/// `reference_id` empty without a flag — absence is not a wrong pairing.
pub fn match_reference(
    view: &OutputView,
    candidates: &[OutputView],
) -> (Option<String>, bool) {
    let mut exact = candidates.iter().filter(|c| {
        c.test_input_path == view.test_input_path && c.configuration == view.configuration
    });

    match (exact.next(), exact.next()) {
        (Some(only), None) => (Some(only.id.clone()), false),
        (Some(first), Some(_)) => (Some(first.id.clone()), true),
        (None, _) => {
            let same_input = candidates
                .iter()
                .find(|c| c.test_input_path == view.test_input_path);
            match same_input {
                Some(candidate) => (Some(candidate.id.clone()), true),
                None => (None, false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn view(id: &str, input: &str, configuration: serde_json::Value) -> OutputView {
        OutputView {
            id: id.to_string(),
            test_input_path: input.to_string(),
            configuration,
            configurations_str: String::new(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            is_pending: false,
            is_failed: false,
            output_dir_url: None,
            reference_id: None,
            reference_mismatch: false,
        }
    }

    #[test]
    fn test_unique_exact_match() {
        let new = view("o1", "a.jpg", json!("base"));
        let refs = vec![view("o2", "a.jpg", json!("base")), view("o3", "b.jpg", json!("base"))];
        let (id, mismatch) = match_reference(&new, &refs);
        assert_eq!(id.as_deref(), Some("o2"));
        assert!(!mismatch);
    }

    #[test]
    fn test_ambiguous_exact_match_is_flagged() {
        let new = view("o1", "a.jpg", json!("base"));
        let refs = vec![view("r1", "a.jpg", json!("base")), view("r2", "a.jpg", json!("base"))];
        let (id, mismatch) = match_reference(&new, &refs);
        assert_eq!(id.as_deref(), Some("r1"));
        assert!(mismatch);
    }

    #[test]
    fn test_same_input_different_configuration_is_flagged() {
        let new = view("o1", "a.jpg", json!("tuned"));
        let refs = vec![view("r1", "a.jpg", json!("base"))];
        let (id, mismatch) = match_reference(&new, &refs);
        assert_eq!(id.as_deref(), Some("r1"));
        assert!(mismatch);
    }

    #[test]
    fn test_no_candidate_at_all() {
        let new = view("o1", "a.jpg", json!("base"));
        let refs = vec![view("r1", "z.jpg", json!("base"))];
        let (id, mismatch) = match_reference(&new, &refs);
        assert!(id.is_none());
        assert!(!mismatch);
    }

    #[test]
    fn test_attach_walks_every_view() {
        let mut new_views = vec![
            view("o1", "a.jpg", json!("base")),
            view("o2", "b.jpg", json!("base")),
        ];
        let refs = vec![view("r1", "a.jpg", json!("base"))];
        attach_references(&mut new_views, &refs);
        assert_eq!(new_views[0].reference_id.as_deref(), Some("r1"));
        assert!(!new_views[0].reference_mismatch);
        assert!(new_views[1].reference_id.is_none());
    }

    #[test]
    fn test_structured_configuration_identity() {
        let new = view("o1", "a.jpg", json!(["base", {"gain": 2}]));
        let refs = vec![
            view("r1", "a.jpg", json!(["base", {"gain": 4}])),
            view("r2", "a.jpg", json!(["base", {"gain": 2}])),
        ];
        let (id, mismatch) = match_reference(&new, &refs);
        assert_eq!(id.as_deref(), Some("r2"));
        assert!(!mismatch);
    }
}
