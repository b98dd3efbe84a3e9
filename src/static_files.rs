//! Static file fallback for unmatched GET requests.

use crate::http::Response;
use crate::template;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

const NOT_FOUND_TITLE: &str = "Page not found";
const NOT_FOUND_HEADER: &str = "404";
const NOT_FOUND_MESSAGE: &str = "The page you are looking for does not exist";

#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: PathBuf,
    views: PathBuf,
}

impl StaticFiles {
    pub fn new<P: AsRef<Path>>(root: P, views: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            views: views.as_ref().to_path_buf(),
        }
    }

    /// Resolve and serve a request path under the static root. `/` maps to
    /// `index.html`; traversal segments are rejected; a missing file serves
    /// the rendered 404 page.
    pub async fn serve(&self, path: &str) -> Response {
        let relative = if path == "/" {
            "index.html"
        } else {
            path.trim_start_matches('/')
        };

        if has_traversal(relative) {
            return self.not_found_page().await;
        }

        let file_path = self.root.join(relative);
        match fs::read(&file_path).await {
            Ok(contents) => {
                let mut response = Response::new(200);
                response.header("Content-Type", content_type(&file_path));
                if let Some(modified) = modified_time(&file_path).await {
                    response.header("Last-Modified", &httpdate::fmt_http_date(modified));
                }
                response.body_bytes(contents);
                response
            }
            Err(_) => self.not_found_page().await,
        }
    }

    pub async fn not_found_page(&self) -> Response {
        let data = json!({
            "title": NOT_FOUND_TITLE,
            "header": NOT_FOUND_HEADER,
            "message": NOT_FOUND_MESSAGE,
        });

        match template::render(&self.views, "404.html", &data).await {
            Ok(html) => Response::send_html(html, 404),
            Err(err) => {
                log::warn!("Could not render 404 page: {}", err);
                Response::send_html(
                    format!("<h1>{}</h1><p>{}</p>", NOT_FOUND_HEADER, NOT_FOUND_MESSAGE),
                    404,
                )
            }
        }
    }
}

fn has_traversal(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|part| matches!(part, Component::ParentDir))
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).await.ok()?.modified().ok()
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("woff") => "font/woff",
        Some("ttf") => "font/ttf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("otf") => "font/otf",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
