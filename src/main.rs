use forno::app::{Application, TlsConfig};
use forno::config::Config;
use forno::error::AppResult;
use forno::middleware::AccessLog;
use forno::modules::Services;
use forno::logger;
use forno::routes::{self, Views};
use forno::session::SessionStore;
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> AppResult<()> {
    if let Err(err) = logger::init() {
        eprintln!("Could not install the logger: {}", err);
    }

    let config = Config::from_env();
    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| ".data".to_string()));
    let services = Services::new(config.clone(), &data_dir);

    let mut app = Application::new(SessionStore::new());
    app.plugin(services.clone());
    app.plugin(Views {
        root: PathBuf::from("views"),
    });
    app.middleware(AccessLog);

    app.mount("", routes::index::router(&services));
    app.mount("/users", routes::users::router(&services));
    app.mount("/pizzas", routes::pizzas::router(&services));
    app.mount("/carts", routes::carts::router(&services));
    app.mount("/orders", routes::orders::router(&services));

    app.static_files("public", "views");

    log::info!("Starting in {} mode", config.environment);

    match (env::var("TLS_CERT"), env::var("TLS_KEY")) {
        (Ok(cert_path), Ok(key_path)) => {
            let tls = TlsConfig {
                cert_path,
                key_path,
            };
            let http = app.clone().listen(config.http_port);
            let https = app.listen_tls(config.https_port, tls);
            tokio::try_join!(http, https)?;
        }
        _ => app.listen(config.http_port).await?,
    }

    Ok(())
}
