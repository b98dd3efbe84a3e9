//! The menu. Pizza records carry a generated id plus whatever the admin put
//! in them (name, price in cents, toppings and so on).

use crate::error::AppResult;
use crate::helpers::random_string;
use crate::store::Store;
use serde_json::Value;
use std::path::Path;

const PIZZA_ID_LEN: usize = 20;

#[derive(Clone)]
pub struct Pizzas {
    store: Store,
}

impl Pizzas {
    pub fn new(base: &Path) -> Self {
        Self {
            store: Store::new(base, "pizzas", "id"),
        }
    }

    pub async fn create(&self, mut params: Value) -> AppResult<Value> {
        params["id"] = Value::String(random_string(PIZZA_ID_LEN));
        self.store.create(params).await
    }

    pub async fn find(&self) -> AppResult<Vec<Value>> {
        self.store.find().await
    }

    pub async fn find_one(&self, id: &str) -> AppResult<Option<Value>> {
        self.store.find_one(id).await
    }

    pub async fn update(&self, id: &str, params: Value) -> AppResult<Value> {
        self.store.update(id, params).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_generates_the_id() {
        let dir = tempdir().unwrap();
        let pizzas = Pizzas::new(dir.path());

        let pizza = pizzas
            .create(json!({"name": "Margherita", "price": 900}))
            .await
            .unwrap();

        let id = pizza["id"].as_str().unwrap();
        assert_eq!(id.len(), PIZZA_ID_LEN);
        assert_eq!(pizzas.find_one(id).await.unwrap().unwrap()["name"], "Margherita");
    }

    #[tokio::test]
    async fn menu_lists_every_pizza() {
        let dir = tempdir().unwrap();
        let pizzas = Pizzas::new(dir.path());

        pizzas.create(json!({"name": "Margherita", "price": 900})).await.unwrap();
        pizzas.create(json!({"name": "Diavola", "price": 1100})).await.unwrap();

        assert_eq!(pizzas.find().await.unwrap().len(), 2);
    }
}
