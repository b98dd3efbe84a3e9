//! Schema-driven input validation, applied as a route middleware. Failures
//! are collected on the request and it is the terminal handler's call how
//! to surface them (422 payload for API clients, flash + redirect for
//! forms).

use crate::middleware::{Middleware, MiddlewareResult, Next};
use crate::http::Request;
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    String,
    Number,
}

/// Field-level constraints. `min`/`max` are inclusive and compare the
/// numeric value for numbers and the character count for strings.
#[derive(Clone, Debug, Default)]
pub struct Rule {
    required: bool,
    kind: Option<Kind>,
    pattern: Option<Regex>,
    min: Option<f64>,
    max: Option<f64>,
    message: Option<String>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string() -> Self {
        Self::new().kind(Kind::String)
    }

    pub fn number() -> Self {
        Self::new().kind(Kind::Number)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn pattern(mut self, pattern: &Regex) -> Self {
        self.pattern = Some(pattern.clone());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Check one field against this rule; `None` means valid.
    fn check(&self, field: &str, data: &Map<String, Value>) -> Option<String> {
        let invalid = || {
            self.message
                .clone()
                .unwrap_or_else(|| format!("The field \"{}\" is invalid", field))
        };

        let value = match data.get(field) {
            Some(value) => value,
            None if self.required => {
                return Some(
                    self.message
                        .clone()
                        .unwrap_or_else(|| format!("The field \"{}\" is required", field)),
                );
            }
            None => return None,
        };

        match self.kind {
            Some(Kind::String) if !value.is_string() => return Some(invalid()),
            Some(Kind::Number) if !value.is_number() => return Some(invalid()),
            _ => {}
        }

        if let (Some(pattern), Some(text)) = (&self.pattern, value.as_str()) {
            if !pattern.is_match(text) {
                return Some(invalid());
            }
        }

        let measure = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Some(s.chars().count() as f64),
            _ => None,
        };

        if let Some(measure) = measure {
            if let Some(min) = self.min {
                if measure < min {
                    return Some(invalid());
                }
            }
            if let Some(max) = self.max {
                if measure > max {
                    return Some(invalid());
                }
            }
        } else if self.min.is_some() || self.max.is_some() {
            return Some(invalid());
        }

        None
    }
}

/// Validation middleware: checks the parsed body for POST/PUT/PATCH and the
/// query parameters otherwise, then attaches collected messages under
/// `errors` and always advances the chain.
#[derive(Clone, Debug)]
pub struct Validation {
    rules: Vec<(String, Rule)>,
}

impl Validation {
    pub fn new(rules: Vec<(&str, Rule)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(field, rule)| (field.to_string(), rule))
                .collect(),
        }
    }

    fn collect(&self, data: &Map<String, Value>) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|(field, rule)| rule.check(field, data))
            .collect()
    }
}

impl Middleware for Validation {
    fn call(&self, mut req: Request, next: Next) -> MiddlewareResult {
        let validation = self.clone();
        Box::pin(async move {
            let data = if req.method.has_body() {
                req.body.as_object().cloned().unwrap_or_default()
            } else {
                req.query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect()
            };

            let errors = validation.collect(&data);
            req.set_data("errors", errors);

            next.handle(req).await
        })
    }

    fn boxed_clone(&self) -> Box<dyn Middleware> {
        Box::new(self.clone())
    }
}
