//! End-to-end scenarios over the in-process dispatch pipeline.

mod common;

use common::{body_text, json_body, session_cookie, spawn};
use forno::http::Method;
use serde_json::json;
use std::fs;

#[tokio::test]
async fn sign_up_issues_a_token_and_stores_a_hashed_password() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;
    assert_eq!(token.len(), 20);

    let stored = harness
        .services
        .users
        .find_one("tony@forno.com")
        .await
        .unwrap()
        .unwrap();
    let hashed = stored["hashedPassword"].as_str().unwrap();
    assert_ne!(hashed, "hunter22");
    assert!(stored.get("password").is_none());
}

#[tokio::test]
async fn sign_up_response_never_contains_the_password_digest() {
    let harness = spawn();
    let res = harness
        .request(
            Method::POST,
            "/sign-up",
            Some(&json!({
                "firstName": "Tony",
                "lastName": "Pepperoni",
                "email": "tony@forno.com",
                "address": "1 Oven Lane",
                "password": "hunter22",
            })),
            None,
        )
        .await;

    let body = json_body(&res);
    assert!(body["user"].get("hashedPassword").is_none());
    assert!(body["token"]["id"].is_string());
}

#[tokio::test]
async fn invalid_sign_up_reports_each_field() {
    let harness = spawn();
    let res = harness
        .request(
            Method::POST,
            "/sign-up",
            Some(&json!({"email": "not-an-email", "password": "tiny"})),
            None,
        )
        .await;

    assert_eq!(res.status, 422);
    let errors = json_body(&res)["errors"].as_array().unwrap().clone();
    let text = format!("{:?}", errors);
    assert!(text.contains("The field \"firstName\" is required"));
    assert!(text.contains("The field \"email\" is invalid"));
    assert!(text.contains("The field \"password\" is invalid"));
}

#[tokio::test]
async fn sign_up_cannot_grant_itself_admin() {
    let harness = spawn();
    let res = harness
        .request(
            Method::POST,
            "/sign-up",
            Some(&json!({
                "firstName": "Tony",
                "lastName": "Pepperoni",
                "email": "tony@forno.com",
                "address": "1 Oven Lane",
                "password": "hunter22",
                "admin": true,
            })),
            None,
        )
        .await;
    assert_eq!(res.status, 200);
    let token = json_body(&res)["token"]["id"].as_str().unwrap().to_string();

    let stored = harness
        .services
        .users
        .find_one("tony@forno.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["admin"], false);

    let admin_api = harness
        .request(Method::GET, "/users", None, Some(&token))
        .await;
    assert_eq!(admin_api.status, 403);
}

#[tokio::test]
async fn protected_endpoints_reject_missing_tokens() {
    let harness = spawn();
    let res = harness.request(Method::GET, "/me", None, None).await;

    assert_eq!(res.status, 401);
    assert_eq!(
        json_body(&res)["errors"][0],
        "You are not authorized for this resource"
    );
}

#[tokio::test]
async fn sign_in_works_and_logout_revokes_the_token() {
    let harness = spawn();
    harness.sign_up("tony@forno.com").await;

    let res = harness
        .request(
            Method::POST,
            "/sign-in",
            Some(&json!({"email": "tony@forno.com", "password": "hunter22"})),
            None,
        )
        .await;
    assert_eq!(res.status, 200);
    let token = json_body(&res)["token"]["id"].as_str().unwrap().to_string();

    let me = harness.request(Method::GET, "/me", None, Some(&token)).await;
    assert_eq!(me.status, 200);
    assert_eq!(json_body(&me)["email"], "tony@forno.com");

    let out = harness
        .request(Method::DELETE, "/logout", None, Some(&token))
        .await;
    assert_eq!(out.status, 200);

    let after = harness.request(Method::GET, "/me", None, Some(&token)).await;
    assert_eq!(after.status, 401);
}

#[tokio::test]
async fn cart_add_copies_count_and_menu_price() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;
    let pizza_id = harness.seed_pizza("Margherita", 900).await;

    let res = harness
        .request(
            Method::POST,
            "/carts",
            Some(&json!({"id": pizza_id, "count": 2})),
            Some(&token),
        )
        .await;

    assert_eq!(res.status, 200);
    let items = json_body(&res);
    assert_eq!(items[0]["count"], 2);
    assert_eq!(items[0]["price"], 900);
}

#[tokio::test]
async fn ordering_with_an_empty_cart_fails() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;

    let res = harness
        .request(Method::POST, "/orders", None, Some(&token))
        .await;

    assert_eq!(res.status, 500);
    assert_eq!(
        json_body(&res)["errors"][0],
        "Your cart is empty. Add new items to your cart to make an order"
    );
}

#[tokio::test]
async fn paying_an_already_paid_order_is_refused() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;
    let pizza_id = harness.seed_pizza("Diavola", 1100).await;

    harness
        .request(
            Method::POST,
            "/carts",
            Some(&json!({"id": pizza_id, "count": 1})),
            Some(&token),
        )
        .await;
    let created = harness
        .request(Method::POST, "/orders", None, Some(&token))
        .await;
    assert_eq!(created.status, 200);
    let order_id = json_body(&created)["id"].as_str().unwrap().to_string();

    // Flip the stored record to paid, the way a completed charge would.
    let record_path = harness.data_dir.join("orders").join(format!("{}.json", order_id));
    let mut order: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
    order["status"] = json!("paid");
    order["stripeId"] = json!("ch_test_1");
    fs::write(&record_path, order.to_string()).unwrap();

    let res = harness
        .request(
            Method::POST,
            "/orders/pay",
            Some(&json!({"id": order_id, "source": "tok_visa"})),
            Some(&token),
        )
        .await;

    assert_eq!(res.status, 500);
    assert_eq!(json_body(&res)["errors"][0], "This order is already paid");

    let unchanged: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
    assert_eq!(unchanged["stripeId"], "ch_test_1");
}

#[tokio::test]
async fn paying_an_unknown_order_is_not_found() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;

    let res = harness
        .request(
            Method::POST,
            "/orders/pay",
            Some(&json!({"id": "nosuchorder", "source": "tok_visa"})),
            Some(&token),
        )
        .await;

    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn plain_users_cannot_reach_the_admin_api() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;

    let res = harness
        .request(Method::GET, "/users", None, Some(&token))
        .await;

    assert_eq!(res.status, 403);
    assert_eq!(
        json_body(&res)["errors"][0],
        "Only admin can access to this resource"
    );
}

#[tokio::test]
async fn admins_can_list_accounts() {
    let harness = spawn();
    let token = harness.sign_up("tony@forno.com").await;

    let record_path = harness.data_dir.join("users").join("tony@forno.com.json");
    let mut user: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&record_path).unwrap()).unwrap();
    user["admin"] = json!(true);
    fs::write(&record_path, user.to_string()).unwrap();

    let res = harness
        .request(Method::GET, "/users", None, Some(&token))
        .await;

    assert_eq!(res.status, 200);
    let list = json_body(&res);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert!(list[0].get("hashedPassword").is_none());
}

#[tokio::test]
async fn first_request_sets_a_session_cookie() {
    let harness = spawn();
    let res = harness.browse(Method::GET, "/", None, None).await;

    assert_eq!(res.status, 200);
    assert_eq!(session_cookie(&res).len(), 20);
    assert!(body_text(&res).contains("Our menu"));
}

#[tokio::test]
async fn form_errors_flash_across_the_redirect() {
    let harness = spawn();

    let submit = harness
        .browse(Method::POST, "/sign-up", Some("firstName=Tony"), None)
        .await;
    assert_eq!(submit.status, 301);
    assert_eq!(
        submit.headers.get("Location").map(String::as_str),
        Some("/sign-up")
    );

    let cookie = format!("sessionId={}", session_cookie(&submit));
    let form = harness
        .browse(Method::GET, "/sign-up", None, Some(&cookie))
        .await;
    let html = body_text(&form);
    assert!(html.contains("is required"));
    assert!(html.contains("value=\"Tony\""));

    // Flash is read-once; a reload shows a clean form.
    let reload = harness
        .browse(Method::GET, "/sign-up", None, Some(&cookie))
        .await;
    assert!(!body_text(&reload).contains("is required"));
}

#[tokio::test]
async fn browsers_without_a_token_land_on_the_error_page() {
    let harness = spawn();
    let res = harness.browse(Method::GET, "/profile", None, None).await;

    assert_eq!(res.status, 301);
    assert_eq!(
        res.headers.get("Location").map(String::as_str),
        Some("/error")
    );
}

#[tokio::test]
async fn static_assets_are_served_with_their_mime_type() {
    let harness = spawn();
    let res = harness.browse(Method::GET, "/css/style.css", None, None).await;

    assert_eq!(res.status, 200);
    assert_eq!(
        res.headers.get("Content-Type").map(String::as_str),
        Some("text/css")
    );
    assert!(res.headers.contains_key("Last-Modified"));
}

#[tokio::test]
async fn missing_pages_render_the_404_template() {
    let harness = spawn();
    let res = harness.browse(Method::GET, "/no-such-page", None, None).await;

    assert_eq!(res.status, 404);
    assert_eq!(
        res.headers.get("Content-Type").map(String::as_str),
        Some("text/html")
    );
    assert!(body_text(&res).contains("The page you are looking for does not exist"));
}

#[tokio::test]
async fn unmatched_posts_are_plain_404() {
    let harness = spawn();
    let res = harness.browse(Method::POST, "/no-such-page", None, None).await;

    assert_eq!(res.status, 404);
    assert_eq!(body_text(&res), "Not Found\n");
}
