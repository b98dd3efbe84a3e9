//! Flat-file persistence: one directory per collection, one JSON file per
//! record. There is no locking or transactional isolation; two concurrent
//! read-modify-write cycles on the same record are last-writer-wins.

use crate::error::{AppError, AppResult};
use crate::helpers::now_millis;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// One directory of `<id>.json` files.
#[derive(Clone, Debug)]
pub struct Collection {
    dir: PathBuf,
}

impl Collection {
    pub fn new(base: &Path, name: &str) -> Self {
        let dir = base.join(name);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            log::error!("Could not create \"{}\" collection directory: {}", name, err);
        }
        Self { dir }
    }

    fn record_path(&self, id: &str) -> AppResult<PathBuf> {
        // Record ids become file names; anything that could escape the
        // collection directory is refused outright.
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(AppError::Store(format!("Invalid record id \"{}\"", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    pub async fn find(&self) -> AppResult<Vec<Value>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|err| AppError::Store(err.to_string()))?;

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| AppError::Store(err.to_string()))?
        {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            records.push(self.find_one(id).await?);
        }
        Ok(records)
    }

    pub async fn find_one(&self, id: &str) -> AppResult<Value> {
        let path = self.record_path(id)?;
        let data = fs::read(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                AppError::NotFound
            } else {
                AppError::Store(err.to_string())
            }
        })?;
        serde_json::from_slice(&data)
            .map_err(|err| AppError::Store(format!("Corrupt record \"{}\": {}", id, err)))
    }

    /// Create a new record file; fails if the id is already taken.
    pub async fn create(&self, id: &str, record: &Value) -> AppResult<()> {
        let path = self.record_path(id)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::AlreadyExists {
                    AppError::Store("The record exists and cannot be overwritten".to_string())
                } else {
                    AppError::Store(err.to_string())
                }
            })?;
        file.write_all(record.to_string().as_bytes())
            .await
            .map_err(|err| AppError::Store(err.to_string()))?;
        Ok(())
    }

    /// Read-merge-write. Object payloads are merged over the stored record;
    /// an array payload replaces it wholesale.
    pub async fn update(&self, id: &str, params: Value) -> AppResult<Value> {
        let existing = self.find_one(id).await?;

        let result = match params {
            Value::Array(_) => params,
            Value::Object(fields) => {
                let mut merged = existing.as_object().cloned().unwrap_or_default();
                merged.extend(fields);
                Value::Object(merged)
            }
            other => other,
        };

        let path = self.record_path(id)?;
        fs::write(&path, result.to_string())
            .await
            .map_err(|err| AppError::Store(err.to_string()))?;
        Ok(result)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let path = self.record_path(id)?;
        fs::remove_file(&path)
            .await
            .map_err(|err| AppError::Store(err.to_string()))
    }
}

/// Keyed store over a [`Collection`]: picks the record id out of a
/// designated key field and normalizes the store's error shapes for the
/// domain modules.
#[derive(Clone, Debug)]
pub struct Store {
    key: &'static str,
    collection: Collection,
}

impl Store {
    pub fn new(base: &Path, name: &str, key: &'static str) -> Self {
        Self {
            key,
            collection: Collection::new(base, name),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    fn id_of(&self, params: &Value) -> AppResult<String> {
        params
            .get(self.key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Store(format!("Missing \"{}\" key field", self.key)))
    }

    /// Create a record, stamping `createdAt` (unix millis).
    pub async fn create(&self, mut params: Value) -> AppResult<Value> {
        params["createdAt"] = Value::from(now_millis());
        let id = self.id_of(&params)?;
        self.collection.create(&id, &params).await?;
        Ok(params)
    }

    /// Create a record under an explicit id, regardless of key field; used
    /// by the cart collection whose records are arrays.
    pub async fn create_with_id(&self, id: &str, params: Value) -> AppResult<Value> {
        self.collection.create(id, &params).await?;
        Ok(params)
    }

    /// A missing record reads as `None`; other failures propagate.
    pub async fn find_one(&self, id: &str) -> AppResult<Option<Value>> {
        match self.collection.find_one(id).await {
            Ok(record) => Ok(Some(record)),
            Err(AppError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn find(&self) -> AppResult<Vec<Value>> {
        self.collection.find().await
    }

    pub async fn update(&self, id: &str, params: Value) -> AppResult<Value> {
        self.collection.update(id, params).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.collection.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_and_read_back() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "users", "email");

        let created = store
            .create(json!({"email": "a@bc.com", "firstName": "A"}))
            .await
            .unwrap();
        assert!(created["createdAt"].is_u64());

        let record = store.find_one("a@bc.com").await.unwrap().unwrap();
        assert_eq!(record["firstName"], "A");
    }

    #[tokio::test]
    async fn create_on_existing_key_is_a_domain_error() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "users", "email");

        store.create(json!({"email": "a@bc.com"})).await.unwrap();
        let err = store.create(json!({"email": "a@bc.com"})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "The record exists and cannot be overwritten"
        );
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "users", "email");
        assert!(store.find_one("ghost@bc.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_objects() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "users", "email");

        store
            .create(json!({"email": "a@bc.com", "firstName": "A", "lastName": "B"}))
            .await
            .unwrap();
        let updated = store
            .update("a@bc.com", json!({"firstName": "Z"}))
            .await
            .unwrap();

        assert_eq!(updated["firstName"], "Z");
        assert_eq!(updated["lastName"], "B");
    }

    #[tokio::test]
    async fn update_replaces_arrays_wholesale() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "carts", "email");

        store
            .create_with_id("a@bc.com", json!([{"id": "p1", "count": 1}]))
            .await
            .unwrap();
        let updated = store
            .update("a@bc.com", json!([{"id": "p2", "count": 3}]))
            .await
            .unwrap();

        assert_eq!(updated, json!([{"id": "p2", "count": 3}]));
    }

    #[tokio::test]
    async fn find_lists_every_record() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "pizzas", "id");

        store.create(json!({"id": "one"})).await.unwrap();
        store.create(json!({"id": "two"})).await.unwrap();

        let records = store.find().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_the_file() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "tokens", "id");

        store.create(json!({"id": "t1"})).await.unwrap();
        store.delete("t1").await.unwrap();
        assert!(store.find_one("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hostile_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path(), "users", "email");

        let err = store.find_one("../escape").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
