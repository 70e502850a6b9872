use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use chrono::{DateTime, FixedOffset};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> Router {
    // A single connection, otherwise every pooled connection would open its
    // own empty in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    server::app(db)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn list(app: &Router) -> Vec<Value> {
    let (status, body) = send(app, Method::GET, "/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().cloned().unwrap()
}

fn amount(record: &Value) -> f64 {
    record["amount"].as_f64().unwrap()
}

fn changed_at(record: &Value) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(record["changedAt"].as_str().unwrap()).unwrap()
}

fn id_for_month(records: &[Value], month: &str) -> String {
    records
        .iter()
        .find(|record| record["month"] == month)
        .and_then(|record| record["id"].as_str())
        .unwrap()
        .to_string()
}

async fn create_rent(app: &Router) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/transactions",
        Some(json!({
            "date": "2025-01-31",
            "type": "expense",
            "item": "Rent",
            "category": "home",
            "amount": 900,
            "isFixed": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn create_fixed_expands_a_year_of_occurrences() {
    let app = app().await;
    let created = create_rent(&app).await;
    assert_eq!(created["date"], "2025-01-31");
    let plan_id = created["planId"].as_str().unwrap().to_string();

    let records = list(&app).await;
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|record| record["planId"] == plan_id.as_str()));
    assert!(records.iter().all(|record| record.get("syncStatus").is_none()));
    let dates: Vec<_> = records.iter().map(|r| r["date"].as_str().unwrap()).collect();
    assert!(dates.contains(&"2025-02-28"));
    assert!(dates.contains(&"2025-04-30"));
    assert!(dates.contains(&"2025-12-31"));
}

#[tokio::test]
async fn scoped_update_reaches_only_later_months() {
    let app = app().await;
    create_rent(&app).await;
    let march = id_for_month(&list(&app).await, "2025-03");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/transactions/{march}?scope=thisAndFuture"),
        Some(json!({ "amount": 950 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["touched"].as_array().unwrap().len(), 10);

    for record in list(&app).await {
        let expected = if record["month"].as_str().unwrap() >= "2025-03" {
            950.0
        } else {
            900.0
        };
        assert_eq!(amount(&record), expected);
    }
}

#[tokio::test]
async fn unknown_scope_falls_back_to_this() {
    let app = app().await;
    let created = create_rent(&app).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/transactions/{id}?scope=everything"),
        Some(json!({ "item": "Flat", "category": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["touched"], json!([id]));

    let records = list(&app).await;
    let updated = records.iter().find(|r| r["id"] == id).unwrap();
    assert_eq!(updated["item"], "Flat");
    assert!(updated.get("category").is_none());
    assert_eq!(records.iter().filter(|r| r["item"] == "Rent").count(), 11);
}

#[tokio::test]
async fn delete_all_leaves_tombstones_in_changes() {
    let app = app().await;
    create_rent(&app).await;
    let june = id_for_month(&list(&app).await, "2025-06");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/transactions/{june}?scope=all"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(list(&app).await.is_empty());

    let (status, changes) = send(&app, Method::GET, "/transactions/changes", None).await;
    assert_eq!(status, StatusCode::OK);
    let changes = changes.as_array().unwrap();
    assert_eq!(changes.len(), 12);
    assert!(changes.iter().all(|record| record["deleted"] == true));
}

#[tokio::test]
async fn unknown_ids_are_404() {
    let app = app().await;

    let (status, body) = send(&app, Method::DELETE, "/transactions/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::PUT,
        "/transactions/nope",
        Some(json!({ "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_input_is_422_and_stores_nothing() {
    let app = app().await;

    for body in [
        json!({ "date": "2025-01-10", "type": "expense", "item": "  ", "amount": 5 }),
        json!({ "date": "2025-01-10", "type": "expense", "item": "Tea", "amount": -5 }),
        json!({ "date": "10/01/2025", "type": "expense", "item": "Tea", "amount": 5 }),
    ] {
        let (status, _) = send(&app, Method::POST, "/transactions", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn replica_push_keeps_id_and_stamp() {
    let app = app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/transactions",
        Some(json!({
            "id": "device-1",
            "date": "2025-03-01",
            "type": "expense",
            "item": "Gym",
            "amount": 30,
            "isFixed": true,
            "planId": "plan-gym",
            "expandSeries": false,
            "updatedAt": "2025-03-01T10:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], "device-1");
    assert_eq!(created["updatedAt"], "2025-03-01T10:00:00Z");
    assert_eq!(list(&app).await.len(), 1);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/transactions/device-1",
        Some(json!({ "amount": 35, "updatedAt": "2025-03-05T08:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, changes) = send(&app, Method::GET, "/transactions/changes", None).await;
    let changes = changes.as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["updatedAt"], "2025-03-05T08:00:00Z");
    assert_eq!(amount(&changes[0]), 35.0);
}

#[tokio::test]
async fn changes_resume_from_the_server_stamp() {
    let app = app().await;
    let gift = json!({ "date": "2025-01-10", "type": "income", "item": "Gift", "amount": 30 });
    send(&app, Method::POST, "/transactions", Some(gift)).await;

    let (_, first) = send(&app, Method::GET, "/transactions/changes", None).await;
    let cursor = first[0]["changedAt"].as_str().unwrap().replace('+', "%2B");

    // A device stamp far in the past is still newer on the server clock.
    let late = json!({
        "id": "late",
        "date": "2024-06-01",
        "type": "expense",
        "item": "Old bill",
        "amount": 12,
        "expandSeries": false,
        "updatedAt": "2024-06-01T00:00:00Z"
    });
    send(&app, Method::POST, "/transactions", Some(late)).await;

    let (status, next) = send(
        &app,
        Method::GET,
        &format!("/transactions/changes?since={cursor}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = next
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"late"), "{ids:?}");

    let late_cursor = next
        .as_array()
        .unwrap()
        .iter()
        .find(|record| record["id"] == "late")
        .and_then(|record| record["changedAt"].as_str())
        .unwrap()
        .replace('+', "%2B");
    let (_, rest) = send(
        &app,
        Method::GET,
        &format!("/transactions/changes?since={late_cursor}"),
        None,
    )
    .await;
    let rest = rest.as_array().unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["id"], "late");
}

#[tokio::test]
async fn replica_push_without_id_is_rejected() {
    let app = app().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/transactions",
        Some(json!({
            "date": "2025-03-01",
            "type": "income",
            "item": "Gift",
            "amount": 30,
            "expandSeries": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn balance_starts_from_the_initial_balance() {
    let app = app().await;

    let (status, _) = send(&app, Method::GET, "/settings/initial-balance", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, stored) = send(
        &app,
        Method::PUT,
        "/settings/initial-balance",
        Some(json!({ "amount": 500, "date": "2025-01-05" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["date"], "2025-01-05");

    let (_, stored) = send(&app, Method::GET, "/settings/initial-balance", None).await;
    assert_eq!(amount(&stored), 500.0);

    for (date, kind, amount) in [
        ("2025-01-01", "income", 1000),
        ("2025-01-10", "income", 2000),
        ("2025-01-20", "expense", 300),
        ("2025-02-01", "expense", 50),
    ] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/transactions",
            Some(json!({ "date": date, "type": kind, "item": "x", "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, balance) = send(&app, Method::GET, "/balance?date=2025-01-31", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["income"].as_f64(), Some(2000.0));
    assert_eq!(balance["expense"].as_f64(), Some(300.0));
    assert_eq!(balance["balance"].as_f64(), Some(2200.0));
}

#[tokio::test]
async fn initial_balance_rejects_a_bad_date() {
    let app = app().await;
    let (status, _) = send(
        &app,
        Method::PUT,
        "/settings/initial-balance",
        Some(json!({ "amount": 500, "date": "soon" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn older_replica_push_loses_to_the_stored_row() {
    let app = app().await;
    let record = json!({
        "id": "shared",
        "date": "2025-04-01",
        "type": "expense",
        "item": "Phone",
        "amount": 20,
        "expandSeries": false,
        "updatedAt": "2025-04-02T12:00:00Z"
    });
    let (status, _) = send(&app, Method::POST, "/transactions", Some(record)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/transactions/shared",
        Some(json!({ "amount": 25, "updatedAt": "2025-04-02T09:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["touched"], json!([]));

    let records = list(&app).await;
    assert_eq!(amount(&records[0]), 20.0);
    assert_eq!(records[0]["updatedAt"], "2025-04-02T12:00:00Z");
}

async fn seed_phone_bill(app: &Router) {
    let record = json!({
        "id": "bill",
        "date": "2025-04-01",
        "type": "expense",
        "item": "Phone",
        "amount": 20,
        "expandSeries": false,
        "updatedAt": "2025-04-02T12:00:00Z"
    });
    let (status, _) = send(app, Method::POST, "/transactions", Some(record)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn older_tombstone_loses_to_the_stored_row() {
    let app = app().await;
    seed_phone_bill(&app).await;
    let (_, before) = send(&app, Method::GET, "/transactions/changes", None).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/transactions/bill?updatedAt=2025-04-02T09:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(list(&app).await.len(), 1);

    // The refused write restamps the row so the deleting device pulls it.
    let (_, after) = send(&app, Method::GET, "/transactions/changes", None).await;
    assert_eq!(after[0]["deleted"], false);
    assert!(changed_at(&after[0]) > changed_at(&before[0]));
}

#[tokio::test]
async fn newer_replica_update_revives_a_tombstone() {
    let app = app().await;
    seed_phone_bill(&app).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/transactions/bill?updatedAt=2025-04-03T08:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(list(&app).await.is_empty());

    let (status, body) = send(
        &app,
        Method::PUT,
        "/transactions/bill",
        Some(json!({
            "item": "Phone plan",
            "amount": 22,
            "deleted": false,
            "updatedAt": "2025-04-04T08:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["touched"], json!(["bill"]));

    let records = list(&app).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["item"], "Phone plan");
    assert_eq!(records[0]["updatedAt"], "2025-04-04T08:00:00Z");
}
