//! Stripe charges API, form POST with the secret key as basic-auth user.

use crate::client::{self, RequestParams};
use crate::error::{AppError, AppResult};
use serde_json::Value;

const CHARGES_URL: &str = "https://api.stripe.com/v1/charges";

#[derive(Clone)]
pub struct Stripe {
    secret: String,
}

impl Stripe {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Charge `amount` (smallest currency unit) against a tokenized source.
    pub async fn charge(
        &self,
        amount: u64,
        currency: &str,
        source: &str,
        description: &str,
    ) -> AppResult<Value> {
        let response = client::request(RequestParams {
            url: CHARGES_URL.to_string(),
            method: "POST",
            body: vec![
                ("amount".to_string(), amount.to_string()),
                ("currency".to_string(), currency.to_string()),
                ("source".to_string(), source.to_string()),
                ("description".to_string(), description.to_string()),
            ],
            auth: Some(format!("{}:", self.secret)),
        })
        .await?;

        if !response.is_success() {
            let message = response.body["error"]["message"]
                .as_str()
                .unwrap_or("The payment could not be processed")
                .to_string();
            return Err(AppError::Upstream(message));
        }

        Ok(response.body)
    }
}
