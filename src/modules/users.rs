//! User accounts, keyed by email. Passwords are stored as keyed SHA-256
//! digests and stripped from anything handed back to a client.

use crate::error::{AppError, AppResult};
use crate::helpers::hash;
use crate::store::Store;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Clone)]
pub struct Users {
    store: Store,
    hashing_secret: String,
}

impl Users {
    pub fn new(base: &Path, hashing_secret: String) -> Self {
        Self {
            store: Store::new(base, "users", "email"),
            hashing_secret,
        }
    }

    /// Create an account: the plaintext password is replaced with its keyed
    /// digest, the orders list starts empty, accounts are never born admin.
    pub async fn create(&self, mut params: Value) -> AppResult<Value> {
        let password = params
            .get("password")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Validation(vec!["The field \"password\" is required".to_string()])
            })?;

        if let Some(fields) = params.as_object_mut() {
            fields.remove("password");
            fields.insert(
                "hashedPassword".to_string(),
                Value::String(hash(&self.hashing_secret, &password)),
            );
            fields.insert("orders".to_string(), json!([]));
            // Overwrites any admin flag the caller smuggled in.
            fields.insert("admin".to_string(), Value::Bool(false));
        }

        self.store.create(params).await
    }

    pub async fn find(&self) -> AppResult<Vec<Value>> {
        self.store.find().await
    }

    pub async fn find_one(&self, email: &str) -> AppResult<Option<Value>> {
        self.store.find_one(email).await
    }

    /// Merge-update an account; a new password is hashed on the way in.
    pub async fn update(&self, email: &str, mut params: Value) -> AppResult<Value> {
        if let Some(fields) = params.as_object_mut() {
            if let Some(password) = fields.remove("password").as_ref().and_then(Value::as_str) {
                fields.insert(
                    "hashedPassword".to_string(),
                    Value::String(hash(&self.hashing_secret, password)),
                );
            }
        }
        self.store.update(email, params).await
    }

    pub async fn delete(&self, email: &str) -> AppResult<()> {
        self.store.delete(email).await
    }

    pub fn verify_password(&self, user: &Value, password: &str) -> bool {
        user.get("hashedPassword").and_then(Value::as_str)
            == Some(hash(&self.hashing_secret, password).as_str())
    }

    /// Copy of the record safe to hand to a client.
    pub fn sanitize(user: &Value) -> Value {
        let mut public = user.clone();
        if let Some(fields) = public.as_object_mut() {
            fields.remove("hashedPassword");
        }
        public
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn users(dir: &Path) -> Users {
        Users::new(dir, "test_secret".to_string())
    }

    #[tokio::test]
    async fn create_hashes_the_password() {
        let dir = tempdir().unwrap();
        let users = users(dir.path());

        let user = users
            .create(json!({"email": "a@bc.com", "firstName": "A", "password": "hunter22"}))
            .await
            .unwrap();

        assert!(user.get("password").is_none());
        let hashed = user["hashedPassword"].as_str().unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(users.verify_password(&user, "hunter22"));
        assert!(!users.verify_password(&user, "hunter23"));
    }

    #[tokio::test]
    async fn new_accounts_are_not_admin_and_have_no_orders() {
        let dir = tempdir().unwrap();
        let users = users(dir.path());

        let user = users
            .create(json!({"email": "a@bc.com", "password": "hunter22"}))
            .await
            .unwrap();

        assert_eq!(user["admin"], false);
        assert_eq!(user["orders"], json!([]));
    }

    #[tokio::test]
    async fn create_ignores_a_caller_supplied_admin_flag() {
        let dir = tempdir().unwrap();
        let users = users(dir.path());

        let user = users
            .create(json!({"email": "a@bc.com", "password": "hunter22", "admin": true}))
            .await
            .unwrap();
        assert_eq!(user["admin"], false);

        let stored = users.find_one("a@bc.com").await.unwrap().unwrap();
        assert_eq!(stored["admin"], false);
    }

    #[tokio::test]
    async fn update_rehashes_a_new_password() {
        let dir = tempdir().unwrap();
        let users = users(dir.path());
        users
            .create(json!({"email": "a@bc.com", "password": "hunter22"}))
            .await
            .unwrap();

        let updated = users
            .update("a@bc.com", json!({"password": "hunter23"}))
            .await
            .unwrap();

        assert!(updated.get("password").is_none());
        assert!(users.verify_password(&updated, "hunter23"));
        assert!(!users.verify_password(&updated, "hunter22"));
    }

    #[tokio::test]
    async fn missing_password_on_create_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let users = users(dir.path());

        let err = users.create(json!({"email": "a@bc.com"})).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn sanitize_strips_the_digest() {
        let user = json!({"email": "a@bc.com", "hashedPassword": "feed"});
        let public = Users::sanitize(&user);
        assert!(public.get("hashedPassword").is_none());
        assert_eq!(public["email"], "a@bc.com");
    }
}
