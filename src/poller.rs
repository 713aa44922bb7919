//! Background refresh: while any tracked commit still has pending
//! outputs, its detail is re-fetched on a fixed interval. Failed polls
//! record the error and wait for the next tick. Also home to the
//! fetch-and-dispatch helpers the route handlers share.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, CommitListQuery};
use crate::store::{Action, SharedStore};

/// Spawn the commit poller task. Stops when the store tears down.
pub fn spawn_commit_poller(
    store: SharedStore,
    client: Arc<ApiClient>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown = store.subscribe_shutdown();
    tokio::spawn(async move {
        info!("Commit poller started ({}s interval)", interval_secs);
        let interval = Duration::from_secs(interval_secs);

        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.recv() => {
                    info!("Commit poller stopping");
                    break;
                }
            }

            let pending = store.pending_commits().await;
            if pending.is_empty() {
                continue;
            }

            debug!(count = pending.len(), "Refreshing commits with pending outputs");
            for (project, id) in pending {
                refresh_commit(&store, &client, &project, &id, None, None).await;
            }
        }
    })
}

/// Fetch one commit detail and dispatch the outcome. The epoch issued
/// before the request travels with the result, so a response that was
/// superseded while in flight is dropped by the reducer.
pub async fn refresh_commit(
    store: &SharedStore,
    client: &ApiClient,
    project: &str,
    id: &str,
    branch: Option<&str>,
    batch: Option<&str>,
) {
    let epoch = store.begin_commit_fetch(project, id).await;
    match client.commit(project, Some(id), branch, batch).await {
        Ok(payload) => {
            store
                .dispatch(Action::CommitLoaded {
                    project: project.to_string(),
                    epoch,
                    payload,
                })
                .await;
        }
        Err(e) => {
            warn!(project, commit = id, error = %e, "Commit fetch failed");
            store
                .dispatch(Action::CommitLoadFailed {
                    project: project.to_string(),
                    id: id.to_string(),
                    epoch,
                    error: e.to_string(),
                })
                .await;
        }
    }
}

pub async fn refresh_projects(store: &SharedStore, client: &ApiClient) {
    match client.projects().await {
        Ok(projects) => store.dispatch(Action::ProjectsLoaded { projects }).await,
        Err(e) => {
            warn!(error = %e, "Project list fetch failed");
            store
                .dispatch(Action::ProjectsLoadFailed {
                    error: e.to_string(),
                })
                .await;
        }
    }
}

pub async fn refresh_branches(store: &SharedStore, client: &ApiClient, project: &str) {
    match client.branches(project).await {
        Ok(branches) => {
            store
                .dispatch(Action::BranchesLoaded {
                    project: project.to_string(),
                    branches,
                })
                .await;
        }
        Err(e) => {
            warn!(project, error = %e, "Branch list fetch failed");
            store
                .dispatch(Action::BranchesLoadFailed {
                    project: project.to_string(),
                    error: e.to_string(),
                })
                .await;
        }
    }
}

pub async fn refresh_commit_list(
    store: &SharedStore,
    client: &ApiClient,
    project: &str,
    branch: Option<&str>,
    query: &CommitListQuery,
) {
    match client.commits(project, branch, query).await {
        Ok(commits) => {
            store
                .dispatch(Action::CommitListLoaded {
                    project: project.to_string(),
                    commits,
                })
                .await;
        }
        Err(e) => {
            warn!(project, error = %e, "Commit list fetch failed");
            store
                .dispatch(Action::CommitListLoadFailed {
                    project: project.to_string(),
                    error: e.to_string(),
                })
                .await;
        }
    }
}
