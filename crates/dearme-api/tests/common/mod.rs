#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use dearme_api::{AppState, AppStateInner, router};
use dearme_db::Database;
use dearme_letters::{Dispatcher, DispatcherConfig};
use dearme_mail::RecordingGateway;

pub const SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<RecordingGateway>,
}

pub fn app() -> TestApp {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let gateway = Arc::new(RecordingGateway::new());
    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        gateway.clone(),
        DispatcherConfig::default(),
    ));
    let state = AppStateInner::new(
        db,
        gateway.clone(),
        dispatcher,
        SECRET.to_string(),
        [7u8; 32],
        "https://dearme.test/",
    );
    TestApp {
        router: router(state.clone()),
        state,
        gateway,
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Sign up, follow the emailed verification link and log in.
    pub async fn verified_user(&self, username: &str) -> String {
        let (status, _) = self
            .call(
                "POST",
                "/auth/signup",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "correct horse",
                    "password_confirm": "correct horse",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let mail = self.gateway.sent().pop().unwrap();
        let path = verification_path(&mail.html_body);
        let (status, _) = self.call("GET", &path, None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .call(
                "POST",
                "/auth/login",
                None,
                Some(serde_json::json!({ "login": username, "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

/// Pull the `/auth/verify/..` path out of an emailed link.
pub fn verification_path(html: &str) -> String {
    link_after(html, "https://dearme.test")
}

pub fn link_after(html: &str, base: &str) -> String {
    let start = html.find("href=\"").unwrap() + "href=\"".len();
    let end = start + html[start..].find('"').unwrap();
    html[start..end].trim_start_matches(base).to_string()
}
