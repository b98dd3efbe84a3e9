//! Mailgun messages API, used for order confirmation emails.

use crate::client::{self, RequestParams};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use serde_json::Value;

#[derive(Clone)]
pub struct Mailgun {
    domain: String,
    api_key: String,
    from: String,
}

impl Mailgun {
    pub fn new(config: &Config) -> Self {
        Self {
            domain: config.mailgun_domain.clone(),
            api_key: config.mailgun_api_key.clone(),
            from: config.mailgun_from.clone(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> AppResult<Value> {
        let response = client::request(RequestParams {
            url: format!("https://api.mailgun.net/v3/{}/messages", self.domain),
            method: "POST",
            body: vec![
                ("from".to_string(), self.from.clone()),
                ("to".to_string(), to.to_string()),
                ("subject".to_string(), subject.to_string()),
                ("text".to_string(), text.to_string()),
            ],
            auth: Some(format!("api:{}", self.api_key)),
        })
        .await?;

        if !response.is_success() {
            return Err(AppError::Upstream("The email could not be sent".to_string()));
        }

        Ok(response.body)
    }
}
