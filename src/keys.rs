//! API key registry
//!
//! Keys live in the `keys` document as `name -> {key, permissions}`. The
//! registry resolves a presented credential to its name and answers
//! permission questions for the auth middleware.

use crate::error::{Error, Result, StoreError};
use crate::store::{Document, DocumentStore, Mapping};
use crate::types::KeyRecord;
use crate::utils::{API_KEY_LENGTH, random_alphanumeric};

/// Reads and manages [`KeyRecord`]s
#[derive(Clone, Debug)]
pub struct KeyRegistry {
    store: DocumentStore,
}

impl KeyRegistry {
    /// Create a registry over `store`
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// The whole `keys` document, as persisted
    pub async fn list(&self) -> Result<Mapping> {
        self.store.load(Document::Keys).await
    }

    /// One key record by name
    pub async fn get(&self, name: &str) -> Result<KeyRecord> {
        let mut keys = self.list().await?;
        let value = keys
            .remove(name)
            .ok_or_else(|| Error::NotFound("Key".into()))?;
        decode(name, value)
    }

    /// Generate a new key for `name`, replacing any existing record
    pub async fn create(&self, name: &str, permissions: Vec<String>) -> Result<String> {
        let key = random_alphanumeric(API_KEY_LENGTH);
        let record = KeyRecord {
            key: key.clone(),
            permissions,
            extra: Default::default(),
        };
        let value = serde_json::to_value(&record)?;

        let owned_name = name.to_string();
        let replaced = self
            .store
            .update(Document::Keys, move |keys| {
                Ok(keys.insert(owned_name, value).is_some())
            })
            .await?;

        tracing::info!(key_name = %name, replaced, "API key created");
        Ok(key)
    }

    /// Remove a key; `false` if no such name exists
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let owned_name = name.to_string();
        let removed = self
            .store
            .update(Document::Keys, move |keys| {
                Ok(keys.remove(&owned_name).is_some())
            })
            .await?;

        if removed {
            tracing::info!(key_name = %name, "API key deleted");
        }
        Ok(removed)
    }

    /// Name owning `api_key`, if any
    ///
    /// Every stored key is compared in constant time; records that are not
    /// well formed are skipped.
    pub async fn resolve(&self, api_key: &str) -> Result<Option<String>> {
        let keys = self.list().await?;
        let mut found = None;
        for (name, value) in &keys {
            let Some(stored) = value.get("key").and_then(|k| k.as_str()) else {
                continue;
            };
            if constant_time_eq(stored.as_bytes(), api_key.as_bytes()) && found.is_none() {
                found = Some(name.clone());
            }
        }
        Ok(found)
    }

    /// Install `key` under `name` with `permissions` unless an identical
    /// record is already present
    pub async fn ensure(&self, name: &str, key: &str, permissions: &[&str]) -> Result<()> {
        let record = KeyRecord {
            key: key.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            extra: Default::default(),
        };

        let owned_name = name.to_string();
        let installed = self
            .store
            .update(Document::Keys, move |keys| {
                let current = keys
                    .get(&owned_name)
                    .and_then(|v| serde_json::from_value::<KeyRecord>(v.clone()).ok());
                if let Some(current) = current
                    && current.key == record.key
                    && current.grants_all(&record.permissions)
                {
                    return Ok(false);
                }
                keys.insert(owned_name, serde_json::to_value(&record)?);
                Ok(true)
            })
            .await?;

        if installed {
            tracing::info!(key_name = %name, "bootstrap API key installed");
        }
        Ok(())
    }

    /// Whether `name` exists and holds every permission in `required`
    pub async fn has_permissions<S: AsRef<str>>(&self, name: &str, required: &[S]) -> Result<bool> {
        match self.get(name).await {
            Ok(record) => Ok(record.grants_all(required)),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn decode(name: &str, value: serde_json::Value) -> Result<KeyRecord> {
    serde_json::from_value(value).map_err(|e| {
        StoreError::Corrupted {
            document: Document::Keys.name().to_string(),
            reason: format!("key {name}: {e}"),
        }
        .into()
    })
}

/// Byte comparison whose duration does not depend on where the inputs differ
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::permissions;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry() -> (KeyRegistry, DocumentStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("tasks.json"), dir.path().join("keys.json"));
        (KeyRegistry::new(store.clone()), store, dir)
    }

    #[tokio::test]
    async fn create_then_resolve_and_get() {
        let (keys, _store, _dir) = registry();

        let key = keys
            .create("alice", vec!["get_info".into(), "get_video".into()])
            .await
            .unwrap();

        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(keys.resolve(&key).await.unwrap().as_deref(), Some("alice"));

        let record = keys.get("alice").await.unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.permissions, ["get_info", "get_video"]);
    }

    #[tokio::test]
    async fn create_replaces_existing_name() {
        let (keys, _store, _dir) = registry();
        let old = keys.create("bob", vec!["get_info".into()]).await.unwrap();
        let new = keys.create("bob", vec!["get_audio".into()]).await.unwrap();

        assert_ne!(old, new);
        assert!(keys.resolve(&old).await.unwrap().is_none());
        assert_eq!(keys.get("bob").await.unwrap().permissions, ["get_audio"]);
        assert_eq!(keys.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_and_prefix_keys() {
        let (keys, _store, _dir) = registry();
        let key = keys.create("carol", vec![]).await.unwrap();

        assert!(keys.resolve("nope").await.unwrap().is_none());
        assert!(keys.resolve(&key[..31]).await.unwrap().is_none());
        assert!(keys.resolve(&format!("{key} ")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_skips_malformed_records() {
        let (keys, store, _dir) = registry();
        store
            .update(Document::Keys, |doc| {
                doc.insert("broken".into(), json!("not a record"));
                doc.insert("ok".into(), json!({"key": "abc", "permissions": []}));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(keys.resolve("abc").await.unwrap().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn delete_reports_whether_key_existed() {
        let (keys, _store, _dir) = registry();
        keys.create("dave", vec![]).await.unwrap();

        assert!(keys.delete("dave").await.unwrap());
        assert!(!keys.delete("dave").await.unwrap());
        assert!(matches!(keys.get("dave").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn has_permissions_is_subset_check() {
        let (keys, _store, _dir) = registry();
        keys.create("erin", vec!["get_info".into(), "get_keys".into()])
            .await
            .unwrap();

        assert!(keys.has_permissions("erin", &["get_info"]).await.unwrap());
        assert!(keys.has_permissions::<&str>("erin", &[]).await.unwrap());
        assert!(!keys.has_permissions("erin", &["create_key"]).await.unwrap());
        assert!(!keys.has_permissions("nobody", &["get_info"]).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let (keys, store, _dir) = registry();

        keys.ensure("admin", "adminsecret", &permissions::ALL)
            .await
            .unwrap();
        let before = std::fs::read_to_string(store.path(Document::Keys)).unwrap();
        keys.ensure("admin", "adminsecret", &permissions::ALL)
            .await
            .unwrap();
        let after = std::fs::read_to_string(store.path(Document::Keys)).unwrap();

        assert_eq!(before, after);
        assert_eq!(
            keys.resolve("adminsecret").await.unwrap().as_deref(),
            Some("admin")
        );
        assert!(keys.has_permissions("admin", &permissions::ALL).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_repairs_changed_admin_key() {
        let (keys, _store, _dir) = registry();
        keys.create("admin", vec!["get_info".into()]).await.unwrap();

        keys.ensure("admin", "configured", &permissions::ALL)
            .await
            .unwrap();

        let record = keys.get("admin").await.unwrap();
        assert_eq!(record.key, "configured");
        assert_eq!(record.permissions.len(), permissions::ALL.len());
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
