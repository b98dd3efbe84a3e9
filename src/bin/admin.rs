//! Interactive admin console over the same data directory the server uses.
//! Read-only: it lists and inspects records, it never writes.

use forno::config::Config;
use forno::error::AppResult;
use forno::helpers::now_millis;
use forno::logger;
use forno::modules::users::Users;
use forno::modules::Services;
use forno::Value;
use log::Level;
use std::env;
use std::path::PathBuf;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Keep table output clean; only warnings get through.
    if let Err(err) = logger::init_with_level(Level::Warn) {
        eprintln!("Could not install the logger: {}", err);
    }

    let config = Config::from_env();
    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| ".data".to_string()));
    let services = Services::new(config, &data_dir);

    let mut lines = BufReader::new(stdin()).lines();
    let mut out = stdout();

    out.write_all(b"forno admin console. Type \"man\" for the command list.\n")
        .await?;

    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line.trim().to_string(),
            None => break,
        };

        let reply = match line.as_str() {
            "" => continue,
            "exit" => break,
            "man" | "help" => manual(),
            "menu" => menu(&services).await,
            "recent orders" => recent_orders(&services).await,
            "users" => recent_users(&services).await,
            command if command.starts_with("order detail --") => {
                order_detail(&services, command.trim_start_matches("order detail --")).await
            }
            command if command.starts_with("user --") => {
                user_detail(&services, command.trim_start_matches("user --")).await
            }
            other => format!("Unknown command \"{}\". Type \"man\" for the command list.\n", other),
        };

        out.write_all(reply.as_bytes()).await?;
    }

    Ok(())
}

fn manual() -> String {
    [
        "man / help            this command list",
        "exit                  leave the console",
        "menu                  every pizza on the menu",
        "recent orders         orders placed in the last 24 hours",
        "order detail --<id>   one order, in full",
        "users                 users signed up in the last 24 hours",
        "user --<email>        one user, in full",
    ]
    .join("\n")
        + "\n"
}

async fn menu(services: &Services) -> String {
    let pizzas = match services.pizzas.find().await {
        Ok(pizzas) => pizzas,
        Err(err) => return format!("Could not read the menu: {}\n", err),
    };

    let mut table = header(&[("id", 22), ("name", 24), ("price", 10)]);
    for pizza in &pizzas {
        table += &row(&[
            (text(pizza, "id"), 22),
            (text(pizza, "name"), 24),
            (price(pizza.get("price")), 10),
        ]);
    }
    table
}

async fn recent_orders(services: &Services) -> String {
    let orders = match services.orders.find_all().await {
        Ok(orders) => orders,
        Err(err) => return format!("Could not read the orders: {}\n", err),
    };

    let mut table = header(&[("id", 22), ("user", 26), ("status", 10), ("total", 10)]);
    for order in orders.iter().filter(|order| is_recent(order)) {
        table += &row(&[
            (text(order, "id"), 22),
            (text(order, "userId"), 26),
            (text(order, "status"), 10),
            (price(Some(&Value::from(order_total(order)))), 10),
        ]);
    }
    table
}

async fn recent_users(services: &Services) -> String {
    let users = match services.users.find().await {
        Ok(users) => users,
        Err(err) => return format!("Could not read the users: {}\n", err),
    };

    let mut table = header(&[("email", 28), ("first name", 16), ("last name", 16)]);
    for user in users.iter().filter(|user| is_recent(user)) {
        table += &row(&[
            (text(user, "email"), 28),
            (text(user, "firstName"), 16),
            (text(user, "lastName"), 16),
        ]);
    }
    table
}

async fn order_detail(services: &Services, id: &str) -> String {
    match services.orders.find_by_id(id.trim()).await {
        Ok(Some(order)) => pretty(&order),
        Ok(None) => format!("No order with id \"{}\"\n", id.trim()),
        Err(err) => format!("Could not read the order: {}\n", err),
    }
}

async fn user_detail(services: &Services, email: &str) -> String {
    match services.users.find_one(email.trim()).await {
        Ok(Some(user)) => pretty(&Users::sanitize(&user)),
        Ok(None) => format!("No user with email \"{}\"\n", email.trim()),
        Err(err) => format!("Could not read the user: {}\n", err),
    }
}

fn is_recent(record: &Value) -> bool {
    record
        .get("createdAt")
        .and_then(Value::as_u64)
        .map(|created| now_millis().saturating_sub(created) <= DAY_MS)
        .unwrap_or(false)
}

fn order_total(order: &Value) -> u64 {
    order
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    item.get("count").and_then(Value::as_u64).unwrap_or(0)
                        * item.get("price").and_then(Value::as_u64).unwrap_or(0)
                })
                .sum()
        })
        .unwrap_or(0)
}

fn text(record: &Value, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn price(value: Option<&Value>) -> String {
    let cents = value.and_then(Value::as_u64).unwrap_or(0);
    format!("${:.2}", cents as f64 / 100.0)
}

fn pretty(record: &Value) -> String {
    serde_json::to_string_pretty(record)
        .map(|json| json + "\n")
        .unwrap_or_else(|err| format!("Could not render the record: {}\n", err))
}

fn header(columns: &[(&str, usize)]) -> String {
    let titles: Vec<(String, usize)> = columns
        .iter()
        .map(|(title, width)| (title.to_string(), *width))
        .collect();
    let total: usize = columns.iter().map(|(_, width)| width + 2).sum();
    row(&titles) + &"-".repeat(total) + "\n"
}

fn row(cells: &[(String, usize)]) -> String {
    let mut line = String::new();
    for (content, width) in cells {
        let width = *width;
        line += &format!("{:<width$}  ", clip(content, width), width = width);
    }
    line.trim_end().to_string() + "\n"
}

fn clip(content: &str, width: usize) -> String {
    if content.chars().count() <= width {
        content.to_string()
    } else {
        content.chars().take(width.saturating_sub(1)).collect::<String>() + "~"
    }
}
