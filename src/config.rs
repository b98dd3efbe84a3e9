use std::env;

/// Runtime configuration. Two compiled-in presets selected by `APP_ENV`,
/// with environment overrides for the secrets so deployments never have to
/// patch the binary.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub http_port: u16,
    pub https_port: u16,
    pub hashing_secret: String,
    /// Token lifetime in milliseconds.
    pub token_expiration_ms: u64,
    pub stripe_secret: String,
    pub mailgun_domain: String,
    pub mailgun_api_key: String,
    pub mailgun_from: String,
}

impl Config {
    pub fn staging() -> Self {
        Self {
            environment: "staging".to_string(),
            http_port: 3000,
            https_port: 3001,
            hashing_secret: "staging_secret".to_string(),
            token_expiration_ms: 1000 * 60 * 60,
            stripe_secret: String::new(),
            mailgun_domain: String::new(),
            mailgun_api_key: String::new(),
            mailgun_from: String::new(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: "production".to_string(),
            http_port: 5000,
            https_port: 5001,
            hashing_secret: "production_secret".to_string(),
            ..Self::staging()
        }
    }

    /// Preset from `APP_ENV` (default staging) plus secret overrides.
    pub fn from_env() -> Self {
        let mut config = match env::var("APP_ENV").unwrap_or_default().to_lowercase().as_str() {
            "production" => Self::production(),
            _ => Self::staging(),
        };

        if let Ok(secret) = env::var("HASHING_SECRET") {
            config.hashing_secret = secret;
        }
        if let Ok(secret) = env::var("STRIPE_SECRET") {
            config.stripe_secret = secret;
        }
        if let Ok(domain) = env::var("MAILGUN_DOMAIN") {
            config.mailgun_domain = domain;
        }
        if let Ok(key) = env::var("MAILGUN_API_KEY") {
            config.mailgun_api_key = key;
        }
        if let Ok(from) = env::var("MAILGUN_FROM") {
            config.mailgun_from = from;
        }

        config
    }
}
