pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod helpers;
pub mod http;
pub mod logger;
pub mod middleware;
pub mod modules;
pub mod plugins;
pub mod router;
pub mod routes;
pub mod session;
pub mod static_files;
pub mod store;
pub mod template;
pub mod validation;

pub use app::{Application, TlsConfig};
pub use error::{AppError, AppResult};
pub use handler::HttpResponse;
pub use http::{Method, Request, Response};
pub use router::Router;
pub use session::{Session, SessionStore};

pub use serde_json::{json, Value};
