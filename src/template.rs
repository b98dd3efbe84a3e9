//! Bespoke page renderer: `{{ field }}` interpolation,
//! `<!-- include: path -->` fragment splicing and
//! `<!-- loop:name: path -->` directives repeating a fragment once per
//! element of the named array.

use crate::error::{AppError, AppResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tokio::fs;

lazy_static! {
    static ref INCLUDE_RE: Regex = Regex::new(r"<!--\s*include:\s*(\S+)\s*-->").unwrap();
    static ref LOOP_RE: Regex = Regex::new(r"<!--\s*loop:(\w+):\s*(\S+)\s*-->").unwrap();
}

/// Render `root/file` with the given data object.
pub async fn render(root: &Path, file: &str, data: &Value) -> AppResult<String> {
    let page = read(root, file).await?;
    let page = expand_includes(root, page).await?;
    let page = replace_fields(&page, data);
    expand_loops(root, page, data).await
}

async fn read(root: &Path, file: &str) -> AppResult<String> {
    fs::read_to_string(root.join(file))
        .await
        .map_err(|err| AppError::Store(format!("Could not read template \"{}\": {}", file, err)))
}

async fn expand_includes(root: &Path, mut page: String) -> AppResult<String> {
    let directives: Vec<(String, String)> = INCLUDE_RE
        .captures_iter(&page)
        .map(|caps| (caps[0].to_string(), caps[1].to_string()))
        .collect();

    for (directive, path) in directives {
        let fragment = read(root, &path).await?;
        page = page.replace(&directive, &fragment);
    }

    Ok(page)
}

async fn expand_loops(root: &Path, mut page: String, data: &Value) -> AppResult<String> {
    let directives: Vec<(String, String, String)> = LOOP_RE
        .captures_iter(&page)
        .map(|caps| (caps[0].to_string(), caps[1].to_string(), caps[2].to_string()))
        .collect();

    for (directive, variable, path) in directives {
        let rendered = match data.get(&variable).and_then(Value::as_array) {
            Some(list) => {
                let fragment = read(root, &path).await?;
                list.iter()
                    .map(|element| replace_fields(&fragment, element))
                    .collect::<Vec<_>>()
                    .join("")
            }
            // A missing or non-array variable renders as nothing.
            None => String::new(),
        };
        page = page.replace(&directive, &rendered);
    }

    Ok(page)
}

fn replace_fields(template: &str, data: &Value) -> String {
    let mut result = template.to_string();
    if let Some(fields) = data.as_object() {
        for (name, value) in fields {
            let pattern = match Regex::new(&format!(
                r"\{{\{{\s*{}\s*\}}\}}",
                regex::escape(name)
            )) {
                Ok(pattern) => pattern,
                Err(_) => continue,
            };
            let rendered = display(value);
            result = pattern
                .replace_all(&result, regex::NoExpand(&rendered))
                .into_owned();
        }
    }
    result
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
