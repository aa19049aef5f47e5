use super::*;
use crate::Error;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn test_store() -> (DocumentStore, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(
        temp_dir.path().join("data/tasks.json"),
        temp_dir.path().join("data/keys.json"),
    );
    (store, temp_dir)
}

fn mapping(value: serde_json::Value) -> Mapping {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[tokio::test]
async fn load_of_never_saved_document_is_empty() {
    let (store, _dir) = test_store();

    assert!(store.load(Document::Tasks).await.unwrap().is_empty());
    assert!(store.load(Document::Keys).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_then_load_round_trips_nested_documents() {
    let (store, _dir) = test_store();

    let data = mapping(json!({
        "abc": {
            "status": "waiting",
            "nested": {"list": [1, 2, {"deep": null}], "flag": true},
            "ratio": 0.5
        },
        "xyz": {}
    }));

    store.save(Document::Tasks, data.clone()).await.unwrap();
    let loaded = store.load(Document::Tasks).await.unwrap();

    assert_eq!(loaded, data);
}

#[tokio::test]
async fn save_of_empty_mapping_round_trips() {
    let (store, _dir) = test_store();

    store
        .save(Document::Keys, mapping(json!({"a": {"key": "k"}})))
        .await
        .unwrap();
    store.save(Document::Keys, Mapping::new()).await.unwrap();

    assert!(store.load(Document::Keys).await.unwrap().is_empty());
}

#[tokio::test]
async fn documents_are_independent() {
    let (store, _dir) = test_store();

    store
        .save(Document::Tasks, mapping(json!({"t": 1})))
        .await
        .unwrap();

    assert!(store.load(Document::Keys).await.unwrap().is_empty());
    assert_eq!(store.load(Document::Tasks).await.unwrap().len(), 1);
}

#[tokio::test]
async fn saved_file_is_pretty_printed_with_four_spaces() {
    let (store, _dir) = test_store();

    store
        .save(Document::Tasks, mapping(json!({"abc": {"status": "waiting"}})))
        .await
        .unwrap();

    let text = std::fs::read_to_string(store.path(Document::Tasks)).unwrap();
    assert!(text.contains("\n    \"abc\": {\n        \"status\": \"waiting\"\n    }"));
}

#[tokio::test]
async fn shorter_save_leaves_no_trailing_bytes() {
    let (store, _dir) = test_store();

    store
        .save(
            Document::Tasks,
            mapping(json!({"long-key-number-one": "x".repeat(512)})),
        )
        .await
        .unwrap();
    store
        .save(Document::Tasks, mapping(json!({"k": "v"})))
        .await
        .unwrap();

    let loaded = store.load(Document::Tasks).await.unwrap();
    assert_eq!(loaded, mapping(json!({"k": "v"})));
}

#[tokio::test]
async fn malformed_content_is_reported_as_corruption() {
    let (store, _dir) = test_store();
    let path = store.path(Document::Tasks).to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();

    let err = store.load(Document::Tasks).await.unwrap_err();
    match err {
        Error::Store(StoreError::Corrupted { document, .. }) => assert_eq!(document, "tasks"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_object_document_is_reported_as_corruption() {
    let (store, _dir) = test_store();
    let path = store.path(Document::Keys).to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[1, 2, 3]").unwrap();

    let err = store.load(Document::Keys).await.unwrap_err();
    assert!(err.to_string().contains("expected a JSON object, found an array"));
}

#[tokio::test]
async fn zero_length_file_is_empty_document() {
    let (store, _dir) = test_store();
    let path = store.path(Document::Tasks).to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "").unwrap();

    assert!(store.load(Document::Tasks).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_persists_mutation_and_returns_value() {
    let (store, _dir) = test_store();

    let len = store
        .update(Document::Tasks, |tasks| {
            tasks.insert("a".into(), json!(1));
            tasks.insert("b".into(), json!(2));
            Ok(tasks.len())
        })
        .await
        .unwrap();

    assert_eq!(len, 2);
    assert_eq!(
        store.load(Document::Tasks).await.unwrap(),
        mapping(json!({"a": 1, "b": 2}))
    );
}

#[tokio::test]
async fn failed_update_leaves_document_untouched() {
    let (store, _dir) = test_store();
    store
        .save(Document::Keys, mapping(json!({"alice": {"key": "k"}})))
        .await
        .unwrap();

    let result: crate::Result<()> = store
        .update(Document::Keys, |keys| {
            keys.clear();
            Err(Error::Validation("rejected".into()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(store.load(Document::Keys).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_refuses_to_overwrite_corrupted_document() {
    let (store, _dir) = test_store();
    let path = store.path(Document::Tasks).to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "garbage").unwrap();

    let result = store
        .update(Document::Tasks, |tasks| {
            tasks.insert("a".into(), json!(1));
            Ok(())
        })
        .await;

    assert!(matches!(
        result,
        Err(Error::Store(StoreError::Corrupted { .. }))
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_never_lose_writes() {
    let (store, _dir) = test_store();
    let store = Arc::new(store);
    let writers = 64;

    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update(Document::Tasks, move |tasks| {
                        tasks.insert(format!("task-{i}"), json!({"n": i}));
                        Ok(())
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let tasks = store.load(Document::Tasks).await.unwrap();
    assert_eq!(tasks.len(), writers);
    for i in 0..writers {
        assert_eq!(tasks[&format!("task-{i}")]["n"], i);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_partial_writes() {
    let (store, _dir) = test_store();
    let store = Arc::new(store);
    let payload = "x".repeat(64 * 1024);
    store
        .save(Document::Tasks, mapping(json!({"blob": payload.clone()})))
        .await
        .unwrap();

    let writer = {
        let store = store.clone();
        let payload = payload.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                store
                    .save(Document::Tasks, mapping(json!({"blob": payload.clone()})))
                    .await
                    .unwrap();
            }
        })
    };

    for _ in 0..20 {
        let loaded = store.load(Document::Tasks).await.unwrap();
        assert_eq!(loaded["blob"].as_str().map(str::len), Some(payload.len()));
    }

    writer.await.unwrap();
}
