//! HTTP surface tests against a spawned application.

mod common;

use common::{dec, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn template_body(number: &str) -> Value {
    json!({
        "invoice_number": number,
        "client_name": "Atelier Brun",
        "issue_date": "2024-01-15",
        "is_recurring": "mensuel",
        "tax_rate": "20",
        "line_items": [
            { "description": "Gestion des réseaux", "quantity": "1", "unit_price": "800.00" },
            { "description": "Shooting photo", "quantity": "2", "unit_price": "100.00" }
        ]
    })
}

fn amount(value: &Value) -> Decimal {
    value.as_str().expect("decimal as string").parse().unwrap()
}

async fn create(app: &TestApp, body: &Value) -> Value {
    let response = app.post_json("/invoices", body).await;
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/ready"))
        .header("x-request-id", "run-42")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "run-42");
}

#[tokio::test]
async fn create_template_schedules_first_occurrence() {
    let app = TestApp::spawn().await;

    let body = create(&app, &template_body("F-2024-200")).await;

    assert_eq!(body["is_recurring"], "mensuel");
    assert_eq!(body["recurrence_day"], 15);
    assert_eq!(body["next_generation_date"], "2024-02-15");
    assert_eq!(body["occurrences_count"], 0);
    assert_eq!(body["due_date"], "2024-02-14");
    assert_eq!(amount(&body["subtotal"]), dec("1000"));
    assert_eq!(amount(&body["tax_total"]), dec("200"));
    assert_eq!(amount(&body["total"]), dec("1200"));
    assert_eq!(body["line_items"].as_array().unwrap().len(), 2);
    assert_eq!(body["template_state"]["state"], "active");
    assert!(body["template_state"]["remaining"].is_null());
}

#[tokio::test]
async fn create_rejects_invalid_anchor_day() {
    let app = TestApp::spawn().await;
    let mut body = template_body("F-2024-201");
    body["recurrence_day"] = json!(32);

    let response = app.post_json("/invoices", &body).await;

    assert_eq!(response.status(), 422);
    let error: Value = response.json().await.unwrap();
    assert!(error["details"].is_string());
}

#[tokio::test]
async fn create_rejects_duplicate_number() {
    let app = TestApp::spawn().await;
    create(&app, &template_body("F-2024-202")).await;

    let response = app.post_json("/invoices", &template_body("F-2024-202")).await;

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn generate_creates_linked_occurrence() {
    let app = TestApp::spawn().await;
    let template = create(&app, &template_body("F-2024-203")).await;
    let id = template["invoice_id"].as_str().unwrap();

    let response = app.post(&format!("/invoices/{}/generate", id)).await;

    assert_eq!(response.status(), 201);
    let generated: Value = response.json().await.unwrap();
    assert_eq!(generated["invoice"]["parent_invoice_id"], id);
    assert_eq!(generated["invoice"]["is_recurring"], "oneshot");
    assert_eq!(generated["invoice"]["status"], "brouillon");
    assert!(generated["invoice"]["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("F-2024-203-"));
    assert_eq!(amount(&generated["invoice"]["total"]), dec("1200"));
    assert_eq!(generated["line_items"].as_array().unwrap().len(), 2);
    assert_eq!(generated["template"]["occurrences_count"], 1);

    let occurrences: Value = app
        .get(&format!("/invoices/{}/occurrences", id))
        .await
        .json()
        .await
        .unwrap();
    let listed = occurrences["occurrences"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["invoice_id"], generated["invoice"]["invoice_id"]);

    let fetched: Value = app
        .get(&format!("/invoices/{}", generated["invoice"]["invoice_id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["template_state"]["state"], "not_recurring");
    assert_eq!(fetched["line_items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn last_allowed_occurrence_terminates_template() {
    let app = TestApp::spawn().await;
    let mut body = template_body("F-2024-204");
    body["max_occurrences"] = json!(1);
    let template = create(&app, &body).await;
    let id = template["invoice_id"].as_str().unwrap();
    assert_eq!(template["template_state"]["remaining"], 1);

    let first = app.post(&format!("/invoices/{}/generate", id)).await;
    assert_eq!(first.status(), 201);
    let generated: Value = first.json().await.unwrap();
    assert_eq!(generated["template"]["is_recurring"], "oneshot");
    assert!(generated["template"]["next_generation_date"].is_null());

    let fetched: Value = app
        .get(&format!("/invoices/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["template_state"]["state"], "terminal");
    assert_eq!(fetched["template_state"]["reason"], "limit_reached");

    let second = app.post(&format!("/invoices/{}/generate", id)).await;
    assert_eq!(second.status(), 409);
    let error: Value = second.json().await.unwrap();
    assert_eq!(error["kind"], "NotRecurring");
    assert_eq!(app.store.invoice_count().await, 2);
}

#[tokio::test]
async fn generate_for_unknown_template_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post(&format!("/invoices/{}/generate", uuid::Uuid::new_v4()))
        .await;

    assert_eq!(response.status(), 404);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["kind"], "TemplateNotFound");
}

#[tokio::test]
async fn generate_for_oneshot_invoice_conflicts() {
    let app = TestApp::spawn().await;
    let mut body = template_body("F-2024-205");
    body["is_recurring"] = json!("oneshot");
    let invoice = create(&app, &body).await;
    assert_eq!(invoice["template_state"]["state"], "not_recurring");

    let response = app
        .post(&format!(
            "/invoices/{}/generate",
            invoice["invoice_id"].as_str().unwrap()
        ))
        .await;

    assert_eq!(response.status(), 409);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["kind"], "NotRecurring");
}

#[tokio::test]
async fn item_copy_failure_returns_server_error_and_writes_nothing() {
    let app = TestApp::spawn().await;
    let template = create(&app, &template_body("F-2024-206")).await;
    app.store.fail_item_copies(true);

    let response = app
        .post(&format!(
            "/invoices/{}/generate",
            template["invoice_id"].as_str().unwrap()
        ))
        .await;

    assert_eq!(response.status(), 500);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["kind"], "ItemCopyFailed");
    assert_eq!(app.store.invoice_count().await, 1);
}

#[tokio::test]
async fn due_listing_and_run() {
    let app = TestApp::spawn().await;
    let due = create(&app, &template_body("F-2024-207")).await;
    let mut later = template_body("F-2024-208");
    later["issue_date"] = json!("2024-03-10");
    create(&app, &later).await;

    let listing: Value = app
        .get("/recurrence/due?as_of=2024-03-01")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listing["as_of"], "2024-03-01");
    let templates = listing["templates"].as_array().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0]["invoice_id"], due["invoice_id"]);

    let response = app.post("/recurrence/run?as_of=2024-03-01").await;
    assert_eq!(response.status(), 200);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["retired"], 0);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["results"][0]["template_id"], due["invoice_id"]);
    assert_eq!(summary["results"][0]["status"], "success");

    // The generated occurrence pushed the template's next date past as_of.
    let listing: Value = app
        .get("/recurrence/due?as_of=2024-03-01")
        .await
        .json()
        .await
        .unwrap();
    assert!(listing["templates"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn run_retires_template_past_end_date() {
    let app = TestApp::spawn().await;
    let mut body = template_body("F-2024-210");
    body["end_date"] = json!("2024-02-01");
    let template = create(&app, &body).await;
    let id = template["invoice_id"].as_str().unwrap();

    let summary: Value = app
        .post("/recurrence/run?as_of=2024-03-01")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["retired"], 1);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["results"][0]["status"], "retired");
    assert_eq!(summary["results"][0]["error_kind"], "RecurrenceExpired");

    let fetched: Value = app
        .get(&format!("/invoices/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["is_recurring"], "oneshot");
    assert!(fetched["next_generation_date"].is_null());
    assert_eq!(fetched["template_state"]["state"], "terminal");
    assert_eq!(fetched["template_state"]["reason"], "past_end_date");

    let listing: Value = app
        .get("/recurrence/due?as_of=2024-03-01")
        .await
        .json()
        .await
        .unwrap();
    assert!(listing["templates"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = TestApp::spawn().await;
    let template = create(&app, &template_body("F-2024-209")).await;
    app.post(&format!(
        "/invoices/{}/generate",
        template["invoice_id"].as_str().unwrap()
    ))
    .await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("recurrence_generations_total"));
    assert!(text.contains("recurrence_http_requests_total"));
}
