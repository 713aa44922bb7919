//! The derived-state selection pipeline: pure functions from store
//! snapshots to the view models the display layer consumes. Nothing here
//! caches or mutates raw data; every call returns fresh derived values.

pub mod batches;
pub mod outputs;
pub mod params;
pub mod reference;

use serde::Serialize;

use crate::model::{
    Batch, Commit, MetricCatalog, OutputView, ProjectData, Selection, SortOrder,
};
use params::ParamSummary;

#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub id: String,
    pub label: String,
    pub valid_outputs: u32,
    pub running_outputs: u32,
    pub pending_outputs: u32,
    pub failed_outputs: u32,
    pub outputs: Vec<OutputView>,
}

impl BatchView {
    fn assemble(batch: &Batch, outputs: Vec<OutputView>) -> Self {
        Self {
            id: batch.id.clone(),
            label: batch.label.clone(),
            valid_outputs: batch.valid_outputs,
            running_outputs: batch.running_outputs,
            pending_outputs: batch.pending_outputs,
            failed_outputs: batch.failed_outputs,
            outputs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareView {
    pub new_commit_id: Option<String>,
    pub reference_commit_id: Option<String>,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub new_batch: BatchView,
    pub reference_batch: BatchView,
}

#[derive(Debug, Clone, Serialize)]
pub struct TuningView {
    pub commit_id: Option<String>,
    pub batch_label: String,
    /// Most-varied parameters first; single-valued ones trail and are
    /// typically hidden by sensitivity plots.
    pub parameters: Vec<ParamSummary>,
}

/// Assemble the comparison view model: resolve both batch selections,
/// filter and sort each side, then pair new outputs with their reference
/// counterparts (matching runs over the filtered reference set only).
pub fn select_compare_view(
    new_commit: Option<&Commit>,
    reference_commit: Option<&Commit>,
    selection: &Selection,
) -> CompareView {
    let (new_batch, reference_batch) = batches::resolve_batch_pair(
        new_commit,
        &selection.new_batch,
        reference_commit,
        &selection.reference_batch,
    );

    let reference_views = outputs::sort_views(
        outputs::filter_views(
            outputs::build_views(&reference_batch),
            &selection.filter_reference,
        ),
        &selection.sort_by,
        selection.sort_order,
    );
    let mut new_views = outputs::sort_views(
        outputs::filter_views(outputs::build_views(&new_batch), &selection.filter_new),
        &selection.sort_by,
        selection.sort_order,
    );
    reference::attach_references(&mut new_views, &reference_views);

    CompareView {
        new_commit_id: new_commit.map(|c| c.id.clone()),
        reference_commit_id: reference_commit.map(|c| c.id.clone()),
        sort_by: selection.sort_by.clone(),
        sort_order: selection.sort_order,
        new_batch: BatchView::assemble(&new_batch, new_views),
        reference_batch: BatchView::assemble(&reference_batch, reference_views),
    }
}

/// Aggregate the tuning parameters of the selected new batch.
pub fn select_tuning_view(new_commit: Option<&Commit>, selection: &Selection) -> TuningView {
    let batch = batches::resolve_batch(new_commit, &selection.new_batch)
        .cloned()
        .unwrap_or_else(|| Batch::empty(&selection.new_batch));
    TuningView {
        commit_id: new_commit.map(|c| c.id.clone()),
        batch_label: batch.label.clone(),
        parameters: params::aggregate_parameters(batch.outputs.values()),
    }
}

/// Effective metric catalog for a commit: the commit-level override when
/// present, else the project catalog.
pub fn select_metric_catalog(
    project_data: Option<&ProjectData>,
    commit: Option<&Commit>,
) -> MetricCatalog {
    if let Some(catalog) = commit.and_then(|c| c.metrics_override.as_ref()) {
        return catalog.clone();
    }
    project_data
        .map(|data| data.metrics.clone())
        .unwrap_or_default()
}
