//! Orders: a snapshot of the cart at checkout time, owned by the user who
//! placed it. Order ids live both as store records and in the owning user's
//! `orders` list; every lookup goes through that list so one user can never
//! read another user's order.

use crate::error::{AppError, AppResult};
use crate::helpers::random_string;
use crate::modules::carts::Carts;
use crate::modules::mailgun::Mailgun;
use crate::modules::stripe::Stripe;
use crate::modules::users::Users;
use crate::store::Store;
use serde_json::{json, Value};
use std::path::Path;

pub const EMPTY_CART: &str =
    "Your cart is empty. Add new items to your cart to make an order";
pub const ALREADY_PAID: &str = "This order is already paid";

const ORDER_ID_LEN: usize = 20;

#[derive(Clone)]
pub struct Orders {
    store: Store,
    users: Users,
    carts: Carts,
    stripe: Stripe,
    mailgun: Mailgun,
}

impl Orders {
    pub fn new(
        base: &Path,
        users: Users,
        carts: Carts,
        stripe: Stripe,
        mailgun: Mailgun,
    ) -> Self {
        Self {
            store: Store::new(base, "orders", "id"),
            users,
            carts,
            stripe,
            mailgun,
        }
    }

    fn order_ids(user: &Value) -> Vec<String> {
        user.get("orders")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every order the user owns; ids pointing at deleted records are
    /// silently skipped.
    pub async fn find(&self, user: &Value) -> AppResult<Vec<Value>> {
        let mut orders = Vec::new();
        for id in Self::order_ids(user) {
            if let Some(order) = self.store.find_one(&id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// An order by id, scoped to the user's ownership list.
    pub async fn find_one(&self, user: &Value, id: &str) -> AppResult<Option<Value>> {
        if !Self::order_ids(user).iter().any(|owned| owned == id) {
            return Ok(None);
        }
        self.store.find_one(id).await
    }

    /// Unscoped listing for the admin console.
    pub async fn find_all(&self) -> AppResult<Vec<Value>> {
        self.store.find().await
    }

    /// Unscoped lookup for the admin console.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Value>> {
        self.store.find_one(id).await
    }

    /// Turn the user's cart into an order: snapshot the items, link the
    /// order to the user, then empty the cart.
    pub async fn create(&self, user: &Value) -> AppResult<Value> {
        let email = user
            .get("email")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::InternalError("user record has no email".to_string()))?;

        let items = self.carts.find(email).await?;
        if items.is_empty() {
            return Err(AppError::Store(EMPTY_CART.to_string()));
        }

        let order = self
            .store
            .create(json!({
                "id": random_string(ORDER_ID_LEN),
                "userId": email,
                "status": "created",
                "items": items,
            }))
            .await?;

        let mut ids = Self::order_ids(user);
        ids.push(order["id"].as_str().unwrap_or_default().to_string());
        self.users.update(email, json!({"orders": ids})).await?;
        self.carts.empty(email).await?;

        Ok(order)
    }

    /// Charge an order. The already-paid check runs before any provider
    /// call, and the order is only marked paid after the charge succeeded.
    /// The confirmation email is fire-and-forget.
    pub async fn pay(&self, user: &Value, id: &str, source: &str) -> AppResult<Value> {
        let order = self.find_one(user, id).await?.ok_or(AppError::NotFound)?;

        if order.get("status").and_then(Value::as_str) == Some("paid") {
            return Err(AppError::Store(ALREADY_PAID.to_string()));
        }

        let amount = total(&order);
        let description = format!("Pizza order {}", id);
        let charge = self.stripe.charge(amount, "usd", source, &description).await?;

        let updated = self
            .store
            .update(
                id,
                json!({
                    "status": "paid",
                    "stripeId": charge.get("id").cloned().unwrap_or(Value::Null),
                }),
            )
            .await?;

        if let Some(email) = user.get("email").and_then(Value::as_str) {
            let mailgun = self.mailgun.clone();
            let to = email.to_string();
            let subject = format!("Your order {} is confirmed", id);
            let text = format!(
                "Thank you! We received your payment of ${:.2} and your pizzas are on the way.",
                amount as f64 / 100.0
            );
            tokio::spawn(async move {
                if let Err(err) = mailgun.send(&to, &subject, &text).await {
                    log::warn!("Could not send the order confirmation email: {}", err);
                }
            });
        }

        Ok(updated)
    }
}

/// Order total in the smallest currency unit.
fn total(order: &Value) -> u64 {
    order
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let count = item.get("count").and_then(Value::as_u64).unwrap_or(0);
                    let price = item.get("price").and_then(Value::as_u64).unwrap_or(0);
                    count * price
                })
                .sum()
        })
        .unwrap_or(0)
}
