mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::app;

fn letter(grace: u32, schedule: bool) -> serde_json::Value {
    json!({
        "subject": "Open on your 40th",
        "body": "<p>Hello from the past.</p>",
        "delivery_date": (Utc::now() - Duration::minutes(1)).to_rfc3339(),
        "external_emails": "a@x.com, , b@y.com",
        "grace_period_hours": grace,
        "schedule": schedule,
    })
}

#[tokio::test]
async fn create_edit_and_send() {
    let app = app();
    let token = app.verified_user("ada").await;
    let mails_before = app.gateway.sent_count();

    let (status, created) = app.call("POST", "/letters", Some(&token), Some(letter(48, false))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "draft");
    assert_eq!(created["editable"], true);
    let id = created["id"].as_str().unwrap().to_string();

    let mut edit = letter(48, true);
    edit["subject"] = json!("Edited");
    let (status, edited) = app.call("PUT", &format!("/letters/{id}"), Some(&token), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["outcome"], "updated");
    assert_eq!(edited["letter"]["status"], "scheduled");
    assert_eq!(edited["letter"]["subject"], "Edited");

    let (status, sent) = app.call("POST", &format!("/letters/{id}/send"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["delivered"], true);

    let mail = app.gateway.sent().pop().unwrap();
    assert_eq!(app.gateway.sent_count(), mails_before + 1);
    assert_eq!(mail.to, vec!["a@x.com", "b@y.com"]);

    let (status, again) = app.call("POST", &format!("/letters/{id}/send"), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["message"], "This letter has already been delivered.");
}

#[tokio::test]
async fn attachment_outside_media_is_rejected() {
    let app = app();
    let token = app.verified_user("ada").await;

    for path in ["/proc/self/environ", "../../etc/passwd"] {
        let mut body = letter(48, false);
        body["attachment"] = json!(path);
        let (status, rejected) = app.call("POST", "/letters", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path} accepted");
        assert_eq!(rejected["fields"][0]["field"], "attachment");
    }
}

#[tokio::test]
async fn editing_after_the_window_returns_locked_view() {
    let app = app();
    let token = app.verified_user("ada").await;

    let (_, created) = app.call("POST", "/letters", Some(&token), Some(letter(0, true))).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["editable"], false);

    let mut edit = letter(0, true);
    edit["subject"] = json!("Too late");
    let (status, body) = app.call("PUT", &format!("/letters/{id}"), Some(&token), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "locked");
    assert_eq!(body["letter"]["subject"], "Open on your 40th");

    let (status, _) = app.call("DELETE", &format!("/letters/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn lock_twice_and_unknown_receivers() {
    let app = app();
    let token = app.verified_user("ada").await;

    let (_, created) = app.call("POST", "/letters", Some(&token), Some(letter(48, false))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, first) = app.call("POST", &format!("/letters/{id}/lock"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = app.call("POST", &format!("/letters/{id}/lock"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["locked_at"], second["locked_at"]);

    let mut bad = letter(48, false);
    bad["receivers"] = json!(["ghost"]);
    let (status, body) = app.call("POST", "/letters", Some(&token), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "receivers");
}

#[tokio::test]
async fn other_users_cannot_see_letters() {
    let app = app();
    let ada = app.verified_user("ada").await;
    let bob = app.verified_user("bob").await;

    let (_, created) = app.call("POST", "/letters", Some(&ada), Some(letter(48, false))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app.call("GET", &format!("/letters/{id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = app.call("GET", "/letters", Some(&bob), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sweep_delivers_scheduled_letters() {
    let app = app();
    let token = app.verified_user("ada").await;
    app.call("POST", "/letters", Some(&token), Some(letter(48, true))).await;

    let report = app.state.dispatcher.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.delivered, 1);

    let (_, list) = app.call("GET", "/letters", Some(&token), None).await;
    assert_eq!(list[0]["status"], "delivered");
    assert_eq!(list[0]["editable"], false);
}
