#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use quill::config::Config;
use quill::db;
use quill::mail::RecordingMailer;
use quill::state::AppState;

pub const ADMIN_SECRET: &str = "S3cr3t";
pub const PASSWORD: &str = "pass1234";

pub struct TestApp {
    _tmp: TempDir,
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let mut config = Config::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config.auth.admin_secret_key = ADMIN_SECRET.to_string();
        config.auth.bcrypt_cost = 4;

        let mailer = Arc::new(RecordingMailer::new());
        let state = AppState::new(pool, config, mailer.clone());
        let router = quill::routes::app(state.clone());

        TestApp {
            _tmp: tmp,
            state,
            router,
            mailer,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        Reply {
            status,
            headers,
            body,
        }
    }

    /// Registers a regular user; returns (user id, token).
    pub async fn register(&self, name: &str, email: &str) -> (String, String) {
        let reply = self
            .send(
                Method::POST,
                "/api/v1/users/register",
                None,
                Some(json!({ "name": name, "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "register failed: {}", reply.body);
        credentials(&reply)
    }

    /// Signs up an admin with the configured secret; returns (user id, token).
    pub async fn admin(&self, email: &str) -> (String, String) {
        let reply = self
            .send(
                Method::POST,
                "/api/v1/users/admin/signup",
                None,
                Some(json!({
                    "name": "admin",
                    "email": email,
                    "password": PASSWORD,
                    "secretKey": ADMIN_SECRET,
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "admin signup failed: {}", reply.body);
        credentials(&reply)
    }

    /// Creates a blog as `admin_token`; returns its id.
    pub async fn blog(&self, admin_token: &str, title: &str) -> String {
        let reply = self
            .send(
                Method::POST,
                "/api/v1/blogs",
                Some(admin_token),
                Some(json!({ "title": title, "content": "Body text", "topic": "tech" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "create blog failed: {}", reply.body);
        reply.body["data"]["blog"]["_id"].as_str().unwrap().to_string()
    }

    pub fn count(&self, sql: &str, post_id: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row(sql, [post_id], |row| row.get(0)).unwrap()
    }
}

fn credentials(reply: &Reply) -> (String, String) {
    let id = reply.body["body"]["user"]["_id"].as_str().unwrap().to_string();
    let token = reply.body["token"].as_str().unwrap().to_string();
    (id, token)
}
