use std::sync::Arc;
use std::time::Duration;

use qa_dashboard::model::UserSettings;
use qa_dashboard::persist::{
    self, KvStorage, SqliteStorage, KEY_PROJECTS, KEY_TUNING, KEY_USER,
};
use qa_dashboard::store::{Action, AppState, Store};
use qa_dashboard::tuning::TuningForm;

#[tokio::test]
async fn test_persistence_task_writes_on_user_change() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::open(&dir.path().join("kv.db")).unwrap());
    let store = Arc::new(Store::new(AppState::default()));
    let handle = persist::spawn_persistence(store.clone(), storage.clone());

    store
        .dispatch(Action::UserUpdated {
            settings: UserSettings {
                name: Some("ada".to_string()),
            },
        })
        .await;

    // Give the subscriber task a moment to observe the event.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let saved = storage.load(KEY_USER).unwrap().expect("user slice saved");
    assert!(saved.contains("ada"));

    store.teardown();
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_selection_changes_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::open(&dir.path().join("kv.db")).unwrap());
    let store = Arc::new(Store::new(AppState::default()));
    let handle = persist::spawn_persistence(store.clone(), storage.clone());

    store
        .dispatch(Action::FilterChanged {
            project: "p".to_string(),
            role: qa_dashboard::model::BatchRole::New,
            filter: "night".to_string(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A selection-only change writes nothing at all.
    assert!(storage.load(KEY_PROJECTS).unwrap().is_none());
    assert!(storage.load("selected").unwrap().is_none());

    store.teardown();
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_hydrate_restores_tuning_forms_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kv.db");

    {
        let storage = Arc::new(SqliteStorage::open(&db_path).unwrap());
        let store = Arc::new(Store::new(AppState::default()));
        let handle = persist::spawn_persistence(store.clone(), storage);

        let form = TuningForm {
            batch_label: "exp-gain".to_string(),
            ..TuningForm::default()
        };
        store
            .dispatch(Action::TuningFormUpdated {
                project: "team/sub".to_string(),
                form,
            })
            .await;
        store.teardown();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    let storage = SqliteStorage::open(&db_path).unwrap();
    assert!(storage.load(KEY_TUNING).unwrap().is_some());
    let state = persist::hydrate(&storage);
    assert_eq!(state.tuning.forms["team/sub"].batch_label, "exp-gain");
    // transient slices come back empty
    assert!(state.selected.entries.is_empty());
    assert!(state.commits.entries.is_empty());
}
