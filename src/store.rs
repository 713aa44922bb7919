//! The application store: normalized slices mutated only through
//! serialized dispatch of a closed `Action` enum, with broadcast change
//! notification and an explicit lifecycle (`new`, `dispatch`,
//! `subscribe`, `teardown`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::config::STORE_EVENT_CHANNEL_SIZE;
use crate::metrics::catalog_from_payload;
use crate::model::{
    Batch, BatchRole, Commit, CommitPayload, CommitSummary, FetchError, ProjectData,
    ProjectPayload, Selection, SortOrder, UserSettings,
};
use crate::tuning::{SubmissionRecord, TuningForm};

pub type SharedStore = Arc<Store>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slice {
    Projects,
    Commits,
    Selected,
    Tuning,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreEvent {
    pub slice: Slice,
    pub project: Option<String>,
}

// ---------------------------------------------------------------------------
// Slices

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectsSlice {
    pub entries: BTreeMap<String, ProjectEntry>,
    pub error: Option<FetchError>,
    pub last_fetched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub data: Option<ProjectData>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub branches_error: Option<FetchError>,
    #[serde(default)]
    pub commit_list: Vec<CommitSummary>,
    #[serde(default)]
    pub commit_list_error: Option<FetchError>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitsSlice {
    /// project → commit id → entry
    pub entries: BTreeMap<String, BTreeMap<String, CommitEntry>>,
}

impl CommitsSlice {
    pub fn get(&self, project: &str, id: &str) -> Option<&CommitEntry> {
        self.entries.get(project)?.get(id)
    }

    pub fn commit(&self, project: &str, id: &str) -> Option<&Commit> {
        self.get(project, id)?.commit.as_ref()
    }
}

/// Fetched commit data plus the fetch bookkeeping. `issued_epoch` /
/// `applied_epoch` guard against a stale in-flight response overwriting a
/// newer one: only an outcome newer than everything already applied lands.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitEntry {
    pub commit: Option<Commit>,
    pub error: Option<FetchError>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub issued_epoch: u64,
    pub applied_epoch: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectedSlice {
    pub entries: BTreeMap<String, Selection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningSlice {
    pub forms: BTreeMap<String, TuningForm>,
    #[serde(default)]
    pub submissions: Vec<SubmissionRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSlice {
    pub settings: UserSettings,
}

/// The whole normalized state. `projects`, `tuning`, and `user` are
/// persisted between runs; `selected` and `commits` are transient.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppState {
    pub projects: ProjectsSlice,
    pub commits: CommitsSlice,
    pub selected: SelectedSlice,
    pub tuning: TuningSlice,
    pub user: UserSlice,
}

// ---------------------------------------------------------------------------
// Actions

#[derive(Debug)]
pub enum Action {
    ProjectsLoaded {
        projects: BTreeMap<String, ProjectPayload>,
    },
    ProjectsLoadFailed {
        error: String,
    },
    BranchesLoaded {
        project: String,
        branches: Vec<String>,
    },
    BranchesLoadFailed {
        project: String,
        error: String,
    },
    CommitListLoaded {
        project: String,
        commits: Vec<CommitSummary>,
    },
    CommitListLoadFailed {
        project: String,
        error: String,
    },
    CommitLoaded {
        project: String,
        epoch: u64,
        payload: CommitPayload,
    },
    CommitLoadFailed {
        project: String,
        id: String,
        epoch: u64,
        error: String,
    },
    CommitSelected {
        project: String,
        role: BatchRole,
        id: Option<String>,
    },
    BatchSelected {
        project: String,
        role: BatchRole,
        label: String,
    },
    FilterChanged {
        project: String,
        role: BatchRole,
        filter: String,
    },
    SortChanged {
        project: String,
        sort_by: String,
        sort_order: SortOrder,
    },
    MetricsSelected {
        project: String,
        keys: Vec<String>,
    },
    ViewSelected {
        project: String,
        view: Option<String>,
    },
    TuningFormUpdated {
        project: String,
        form: TuningForm,
    },
    BatchSubmitted {
        record: SubmissionRecord,
    },
    UserUpdated {
        settings: UserSettings,
    },
}

// ---------------------------------------------------------------------------
// Store

pub struct Store {
    state: RwLock<AppState>,
    event_tx: broadcast::Sender<StoreEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (event_tx, _) = broadcast::channel(STORE_EVENT_CHANNEL_SIZE);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state: RwLock::new(initial),
            event_tx,
            shutdown_tx,
        }
    }

    /// Apply one action through the reducer and notify subscribers.
    pub async fn dispatch(&self, action: Action) {
        let event = {
            let mut state = self.state.write().await;
            reduce(&mut state, action)
        };
        if let Some(event) = event {
            let _ = self.event_tx.send(event);
        }
    }

    /// Read the state without cloning it.
    pub async fn with_state<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Owned snapshot, for selectors that outlive the lock.
    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every background subscriber (poller, persistence) to stop.
    pub fn teardown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Issue a fetch epoch for a commit. The matching `CommitLoaded` /
    /// `CommitLoadFailed` must carry it back; the reducer drops outcomes
    /// older than the last applied one.
    pub async fn begin_commit_fetch(&self, project: &str, id: &str) -> u64 {
        let mut state = self.state.write().await;
        let entry = state
            .commits
            .entries
            .entry(project.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        entry.issued_epoch += 1;
        entry.issued_epoch
    }

    /// Commits whose batches still report pending outputs, for the poller.
    pub async fn pending_commits(&self) -> Vec<(String, String)> {
        self.with_state(|state| {
            let mut pending = Vec::new();
            for (project, commits) in &state.commits.entries {
                for (id, entry) in commits {
                    if entry
                        .commit
                        .as_ref()
                        .is_some_and(|c| c.has_pending_outputs())
                    {
                        pending.push((project.clone(), id.clone()));
                    }
                }
            }
            pending
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Reducer

fn selection_mut<'a>(state: &'a mut AppState, project: &str) -> &'a mut Selection {
    state
        .selected
        .entries
        .entry(project.to_string())
        .or_default()
}

fn project_mut<'a>(state: &'a mut AppState, project: &str) -> &'a mut ProjectEntry {
    state
        .projects
        .entries
        .entry(project.to_string())
        .or_default()
}

fn commit_entry_mut<'a>(state: &'a mut AppState, project: &str, id: &str) -> &'a mut CommitEntry {
    state
        .commits
        .entries
        .entry(project.to_string())
        .or_default()
        .entry(id.to_string())
        .or_default()
}

fn commit_from_payload(payload: CommitPayload) -> Commit {
    let (config_override, metrics_override) = match payload.data {
        Some(data) => (
            data.qatools_config,
            data.qatools_metrics.map(catalog_from_payload),
        ),
        None => (None, None),
    };
    let batches = payload
        .batches
        .into_iter()
        .map(|(label, batch)| {
            let batch = Batch::from_payload(&label, batch);
            (label, batch)
        })
        .collect();
    Commit {
        id: payload.id,
        branch: payload.branch,
        config_override,
        metrics_override,
        batches,
    }
}

/// The single exhaustive state transition. Failed fetches record their
/// error next to the data they failed to refresh; previously fetched data
/// is never discarded.
fn reduce(state: &mut AppState, action: Action) -> Option<StoreEvent> {
    match action {
        Action::ProjectsLoaded { projects } => {
            for (id, payload) in projects {
                let entry = project_mut(state, &id);
                entry.data = Some(ProjectData {
                    config: payload.data.qatools_config,
                    metrics: catalog_from_payload(payload.data.qatools_metrics),
                });
            }
            state.projects.error = None;
            state.projects.last_fetched = Some(Utc::now());
            Some(StoreEvent {
                slice: Slice::Projects,
                project: None,
            })
        }
        Action::ProjectsLoadFailed { error } => {
            state.projects.error = Some(FetchError::new(error));
            Some(StoreEvent {
                slice: Slice::Projects,
                project: None,
            })
        }
        Action::BranchesLoaded { project, branches } => {
            let entry = project_mut(state, &project);
            entry.branches = branches;
            entry.branches_error = None;
            Some(StoreEvent {
                slice: Slice::Projects,
                project: Some(project),
            })
        }
        Action::BranchesLoadFailed { project, error } => {
            project_mut(state, &project).branches_error = Some(FetchError::new(error));
            Some(StoreEvent {
                slice: Slice::Projects,
                project: Some(project),
            })
        }
        Action::CommitListLoaded { project, commits } => {
            let entry = project_mut(state, &project);
            entry.commit_list = commits;
            entry.commit_list_error = None;
            Some(StoreEvent {
                slice: Slice::Projects,
                project: Some(project),
            })
        }
        Action::CommitListLoadFailed { project, error } => {
            project_mut(state, &project).commit_list_error = Some(FetchError::new(error));
            Some(StoreEvent {
                slice: Slice::Projects,
                project: Some(project),
            })
        }
        Action::CommitLoaded {
            project,
            epoch,
            payload,
        } => {
            let entry = commit_entry_mut(state, &project, &payload.id);
            if epoch <= entry.applied_epoch {
                debug!(
                    commit = %payload.id,
                    epoch,
                    applied = entry.applied_epoch,
                    "Dropping stale commit response"
                );
                return None;
            }
            entry.commit = Some(commit_from_payload(payload));
            entry.error = None;
            entry.last_fetched = Some(Utc::now());
            entry.applied_epoch = epoch;
            Some(StoreEvent {
                slice: Slice::Commits,
                project: Some(project),
            })
        }
        Action::CommitLoadFailed {
            project,
            id,
            epoch,
            error,
        } => {
            let entry = commit_entry_mut(state, &project, &id);
            if epoch <= entry.applied_epoch {
                debug!(commit = %id, epoch, "Dropping stale commit fetch error");
                return None;
            }
            // Keep whatever was fetched before; only record the failure.
            entry.error = Some(FetchError::new(error));
            entry.applied_epoch = epoch;
            Some(StoreEvent {
                slice: Slice::Commits,
                project: Some(project),
            })
        }
        Action::CommitSelected { project, role, id } => {
            let selection = selection_mut(state, &project);
            match role {
                BatchRole::New => selection.new_commit_id = id,
                BatchRole::Reference => selection.reference_commit_id = id,
            }
            Some(StoreEvent {
                slice: Slice::Selected,
                project: Some(project),
            })
        }
        Action::BatchSelected {
            project,
            role,
            label,
        } => {
            let selection = selection_mut(state, &project);
            match role {
                BatchRole::New => selection.new_batch = label,
                BatchRole::Reference => selection.reference_batch = label,
            }
            Some(StoreEvent {
                slice: Slice::Selected,
                project: Some(project),
            })
        }
        Action::FilterChanged {
            project,
            role,
            filter,
        } => {
            let selection = selection_mut(state, &project);
            match role {
                BatchRole::New => selection.filter_new = filter,
                BatchRole::Reference => selection.filter_reference = filter,
            }
            Some(StoreEvent {
                slice: Slice::Selected,
                project: Some(project),
            })
        }
        Action::SortChanged {
            project,
            sort_by,
            sort_order,
        } => {
            let selection = selection_mut(state, &project);
            selection.sort_by = sort_by;
            selection.sort_order = sort_order;
            Some(StoreEvent {
                slice: Slice::Selected,
                project: Some(project),
            })
        }
        Action::MetricsSelected { project, keys } => {
            selection_mut(state, &project).selected_metrics = keys;
            Some(StoreEvent {
                slice: Slice::Selected,
                project: Some(project),
            })
        }
        Action::ViewSelected { project, view } => {
            selection_mut(state, &project).selected_view = view;
            Some(StoreEvent {
                slice: Slice::Selected,
                project: Some(project),
            })
        }
        Action::TuningFormUpdated { project, form } => {
            state.tuning.forms.insert(project.clone(), form);
            Some(StoreEvent {
                slice: Slice::Tuning,
                project: Some(project),
            })
        }
        Action::BatchSubmitted { record } => {
            let project = record.project.clone();
            state.tuning.submissions.push(record);
            Some(StoreEvent {
                slice: Slice::Tuning,
                project: Some(project),
            })
        }
        Action::UserUpdated { settings } => {
            state.user.settings = settings;
            Some(StoreEvent {
                slice: Slice::User,
                project: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit_payload(id: &str, pending: u32) -> CommitPayload {
        serde_json::from_value(json!({
            "id": id,
            "batches": {
                "default": {"id": format!("b-{id}"), "pending_outputs": pending}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_emits_event() {
        let store = Store::new(AppState::default());
        let mut rx = store.subscribe();
        store
            .dispatch(Action::ProjectsLoadFailed {
                error: "connection refused".to_string(),
            })
            .await;
        let event = rx.try_recv().unwrap();
        assert_eq!(event.slice, Slice::Projects);
    }

    #[tokio::test]
    async fn test_projects_load_failure_keeps_entries() {
        let store = Store::new(AppState::default());
        let projects: BTreeMap<String, ProjectPayload> = serde_json::from_value(json!({
            "team/sub": {"data": {"qatools_metrics": {"available_metrics": {"x": {}}}}}
        }))
        .unwrap();
        store.dispatch(Action::ProjectsLoaded { projects }).await;
        store
            .dispatch(Action::ProjectsLoadFailed {
                error: "timeout".to_string(),
            })
            .await;

        store
            .with_state(|state| {
                assert!(state.projects.entries.contains_key("team/sub"));
                assert_eq!(state.projects.error.as_ref().unwrap().message, "timeout");
            })
            .await;
    }

    #[tokio::test]
    async fn test_metric_defaulting_applied_at_store_boundary() {
        let store = Store::new(AppState::default());
        let projects: BTreeMap<String, ProjectPayload> = serde_json::from_value(json!({
            "p": {"data": {"qatools_metrics": {"available_metrics": {
                ".private": {},
                "latency": {"smaller_is_better": "false"}
            }}}}
        }))
        .unwrap();
        store.dispatch(Action::ProjectsLoaded { projects }).await;

        store
            .with_state(|state| {
                let metrics = &state.projects.entries["p"].data.as_ref().unwrap().metrics;
                assert!(!metrics.available_metrics.contains_key(".private"));
                let latency = &metrics.available_metrics["latency"];
                assert_eq!(latency.label, "latency");
                assert!(!latency.smaller_is_better);
            })
            .await;
    }

    #[tokio::test]
    async fn test_commit_epoch_guard_drops_stale_response() {
        let store = Store::new(AppState::default());
        let first = store.begin_commit_fetch("p", "c1").await;
        let second = store.begin_commit_fetch("p", "c1").await;
        assert!(second > first);

        // Later fetch lands first.
        store
            .dispatch(Action::CommitLoaded {
                project: "p".to_string(),
                epoch: second,
                payload: commit_payload("c1", 2),
            })
            .await;
        // Stale response for the earlier fetch must be dropped.
        store
            .dispatch(Action::CommitLoaded {
                project: "p".to_string(),
                epoch: first,
                payload: commit_payload("c1", 0),
            })
            .await;

        store
            .with_state(|state| {
                let entry = state.commits.get("p", "c1").unwrap();
                assert_eq!(entry.applied_epoch, second);
                let commit = entry.commit.as_ref().unwrap();
                assert_eq!(commit.batches["default"].pending_outputs, 2);
            })
            .await;
    }

    #[tokio::test]
    async fn test_commit_fetch_failure_keeps_stale_data() {
        let store = Store::new(AppState::default());
        let first = store.begin_commit_fetch("p", "c1").await;
        store
            .dispatch(Action::CommitLoaded {
                project: "p".to_string(),
                epoch: first,
                payload: commit_payload("c1", 1),
            })
            .await;

        let second = store.begin_commit_fetch("p", "c1").await;
        store
            .dispatch(Action::CommitLoadFailed {
                project: "p".to_string(),
                id: "c1".to_string(),
                epoch: second,
                error: "502".to_string(),
            })
            .await;

        store
            .with_state(|state| {
                let entry = state.commits.get("p", "c1").unwrap();
                assert!(entry.commit.is_some());
                assert_eq!(entry.error.as_ref().unwrap().message, "502");
            })
            .await;
    }

    #[tokio::test]
    async fn test_selection_defaults_then_updates() {
        let store = Store::new(AppState::default());
        store
            .dispatch(Action::SortChanged {
                project: "p".to_string(),
                sort_by: "x".to_string(),
                sort_order: SortOrder::Descending,
            })
            .await;
        store
            .dispatch(Action::FilterChanged {
                project: "p".to_string(),
                role: BatchRole::Reference,
                filter: "night".to_string(),
            })
            .await;

        store
            .with_state(|state| {
                let selection = &state.selected.entries["p"];
                assert_eq!(selection.sort_by, "x");
                assert_eq!(selection.sort_order, SortOrder::Descending);
                assert_eq!(selection.filter_reference, "night");
                // untouched fields keep their defaults
                assert_eq!(selection.new_batch, "default");
                assert_eq!(selection.filter_new, "");
            })
            .await;
    }

    #[tokio::test]
    async fn test_pending_commits_scan() {
        let store = Store::new(AppState::default());
        let epoch = store.begin_commit_fetch("p", "c1").await;
        store
            .dispatch(Action::CommitLoaded {
                project: "p".to_string(),
                epoch,
                payload: commit_payload("c1", 3),
            })
            .await;
        let epoch = store.begin_commit_fetch("p", "c2").await;
        store
            .dispatch(Action::CommitLoaded {
                project: "p".to_string(),
                epoch,
                payload: commit_payload("c2", 0),
            })
            .await;

        let pending = store.pending_commits().await;
        assert_eq!(pending, vec![("p".to_string(), "c1".to_string())]);
    }

    #[tokio::test]
    async fn test_teardown_reaches_subscribers() {
        let store = Store::new(AppState::default());
        let mut rx = store.subscribe_shutdown();
        store.teardown();
        assert!(rx.try_recv().is_ok());
    }
}
