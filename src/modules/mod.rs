//! Domain services over the file store. Everything is wired once in `main`
//! into a [`Services`] bundle and injected through the application plugins.

pub mod carts;
pub mod mailgun;
pub mod orders;
pub mod pizzas;
pub mod stripe;
pub mod tokens;
pub mod users;

use crate::config::Config;
use std::path::Path;

#[derive(Clone)]
pub struct Services {
    pub config: Config,
    pub users: users::Users,
    pub tokens: tokens::Tokens,
    pub pizzas: pizzas::Pizzas,
    pub carts: carts::Carts,
    pub orders: orders::Orders,
}

impl Services {
    pub fn new(config: Config, data_dir: &Path) -> Self {
        let users = users::Users::new(data_dir, config.hashing_secret.clone());
        let tokens = tokens::Tokens::new(data_dir, users.clone(), config.token_expiration_ms);
        let pizzas = pizzas::Pizzas::new(data_dir);
        let carts = carts::Carts::new(data_dir, pizzas.clone());
        let stripe = stripe::Stripe::new(config.stripe_secret.clone());
        let mailgun = mailgun::Mailgun::new(&config);
        let orders = orders::Orders::new(
            data_dir,
            users.clone(),
            carts.clone(),
            stripe,
            mailgun,
        );

        Self {
            config,
            users,
            tokens,
            pizzas,
            carts,
            orders,
        }
    }
}
