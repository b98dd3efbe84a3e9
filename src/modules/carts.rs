//! Shopping carts, one record per user email. A cart record is an array of
//! `{id, count, price}` items; the price is copied from the pizza record at
//! the moment the item is added.

use crate::error::{AppError, AppResult};
use crate::modules::pizzas::Pizzas;
use crate::store::Store;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Clone)]
pub struct Carts {
    store: Store,
    pizzas: Pizzas,
}

impl Carts {
    pub fn new(base: &Path, pizzas: Pizzas) -> Self {
        Self {
            store: Store::new(base, "carts", "email"),
            pizzas,
        }
    }

    /// A user with no cart record has an empty cart.
    pub async fn find(&self, email: &str) -> AppResult<Vec<Value>> {
        Ok(self
            .store
            .find_one(email)
            .await?
            .and_then(|record| record.as_array().cloned())
            .unwrap_or_default())
    }

    pub async fn add(&self, email: &str, pizza_id: &str, count: u64) -> AppResult<Vec<Value>> {
        let pizza = self.pizzas.find_one(pizza_id).await?.ok_or_else(|| {
            AppError::Validation(vec!["The specified pizza does not exist".to_string()])
        })?;

        let mut items = self.find(email).await?;
        if items.iter().any(|item| item["id"] == pizza["id"]) {
            return Err(AppError::Validation(vec![
                "This pizza is already in your cart".to_string(),
            ]));
        }

        items.push(json!({
            "id": pizza_id,
            "count": count,
            "price": pizza.get("price").cloned().unwrap_or(Value::Null),
        }));
        self.save(email, items).await
    }

    /// Replace the count of an item already in the cart.
    pub async fn update(&self, email: &str, pizza_id: &str, count: u64) -> AppResult<Vec<Value>> {
        let mut items = self.find(email).await?;
        let item = items
            .iter_mut()
            .find(|item| item["id"] == pizza_id)
            .ok_or_else(|| {
                AppError::Validation(vec![
                    "The specified pizza is not in your cart".to_string(),
                ])
            })?;

        item["count"] = Value::from(count);
        self.save(email, items).await
    }

    pub async fn remove(&self, email: &str, pizza_id: &str) -> AppResult<Vec<Value>> {
        let mut items = self.find(email).await?;
        let before = items.len();
        items.retain(|item| item["id"] != pizza_id);
        if items.len() == before {
            return Err(AppError::Validation(vec![
                "The specified pizza is not in your cart".to_string(),
            ]));
        }

        if items.is_empty() {
            self.empty(email).await?;
            return Ok(items);
        }
        self.save(email, items).await
    }

    /// Drop the whole cart record; a missing record is already empty.
    pub async fn empty(&self, email: &str) -> AppResult<()> {
        if self.store.find_one(email).await?.is_some() {
            self.store.delete(email).await?;
        }
        Ok(())
    }

    async fn save(&self, email: &str, items: Vec<Value>) -> AppResult<Vec<Value>> {
        let payload = Value::Array(items);
        let saved = if self.store.find_one(email).await?.is_some() {
            self.store.update(email, payload).await?
        } else {
            self.store.create_with_id(email, payload).await?
        };
        Ok(saved.as_array().cloned().unwrap_or_default())
    }
}
