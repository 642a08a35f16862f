//! [`Backend`] over a Supabase-style hosted service: the PostgREST table API
//! under `/rest/v1` and the GoTrue auth API under `/auth/v1`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::session::{Credentials, Session, SignUpOutcome, User};
use crate::task::{NewTask, Task, TaskChanges, TaskId};

const TASKS_TABLE: &str = "tasks";

pub struct SupabaseBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

impl SupabaseBackend {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, anon_key)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            anon_key: anon_key.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{TASKS_TABLE}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    /// Every call carries the project key; signed-in calls also carry the
    /// user's token so row-level policies apply.
    fn request(&self, method: Method, url: String, session: Option<&Session>) -> RequestBuilder {
        let token = session.map_or(self.anon_key.as_str(), |s| s.access_token.as_str());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason().unwrap_or("request failed")),
        })
    }

    /// PostgREST answers a filter that matched nothing with success, so ask
    /// for the touched rows back and treat none as a missing task.
    async fn expect_row(&self, id: TaskId, request: RequestBuilder) -> BackendResult<()> {
        let request = request
            .query(&[("select", "id")])
            .header("Prefer", "return=representation");
        let rows: Vec<Value> = self.send(request).await?.json().await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(id));
        }
        Ok(())
    }

    async fn authenticate(&self, url: String, credentials: &Credentials) -> BackendResult<AuthResponse> {
        let request = self.request(Method::POST, url, None).json(&json!({
            "email": credentials.email,
            "password": credentials.password,
        }));
        let response = self.send(request).await.map_err(|err| match err {
            BackendError::Status { message, .. } => BackendError::Auth(message),
            other => other,
        })?;
        let raw: Value = response.json().await?;
        // Sign-up without auto-confirm returns the bare user object.
        let mut parsed: AuthResponse = serde_json::from_value(raw.clone()).map_err(|e| BackendError::Decode(e.to_string()))?;
        if parsed.user.is_none() {
            parsed.user = serde_json::from_value(raw).ok();
        }
        Ok(parsed)
    }
}

/// Picks the human readable message out of an error body.
fn error_message(body: &str, fallback: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback.to_string();
    };
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map_or_else(|| fallback.to_string(), str::to_string)
}

#[async_trait]
impl Backend for SupabaseBackend {
    #[instrument(skip_all, fields(user = %session.user.id))]
    async fn fetch_tasks(&self, session: &Session) -> BackendResult<Vec<Task>> {
        let request = self.request(Method::GET, self.table_url(), Some(session)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", session.user.id)),
            ("order", "created_at.desc".to_string()),
        ]);
        let tasks: Vec<Task> = self.send(request).await?.json().await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[instrument(skip_all, fields(status = %task.status))]
    async fn create_task(&self, session: &Session, task: &NewTask) -> BackendResult<Task> {
        let request = self
            .request(Method::POST, self.table_url(), Some(session))
            .header("Prefer", "return=representation")
            .json(&[task]);
        let mut created: Vec<Task> = self.send(request).await?.json().await?;
        if created.is_empty() {
            return Err(BackendError::Decode("insert returned no rows".into()));
        }
        Ok(created.swap_remove(0))
    }

    #[instrument(skip(self, session, changes))]
    async fn update_task(&self, session: &Session, id: TaskId, changes: &TaskChanges) -> BackendResult<()> {
        let request = self
            .request(Method::PATCH, self.table_url(), Some(session))
            .query(&[("id", format!("eq.{id}"))])
            .json(changes);
        self.expect_row(id, request).await
    }

    #[instrument(skip(self, session))]
    async fn delete_task(&self, session: &Session, id: TaskId) -> BackendResult<()> {
        let request = self
            .request(Method::DELETE, self.table_url(), Some(session))
            .query(&[("id", format!("eq.{id}"))]);
        self.expect_row(id, request).await
    }

    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<Session> {
        let response = self
            .authenticate(self.auth_url("token?grant_type=password"), credentials)
            .await?;
        match (response.access_token, response.user) {
            (Some(access_token), Some(user)) => Ok(Session { access_token, user }),
            _ => Err(BackendError::Decode("sign-in response carried no session".into())),
        }
    }

    async fn sign_up(&self, credentials: &Credentials) -> BackendResult<SignUpOutcome> {
        let response = self.authenticate(self.auth_url("signup"), credentials).await?;
        match (response.access_token, response.user) {
            (Some(access_token), Some(user)) => Ok(SignUpOutcome::SignedIn(Session { access_token, user })),
            (None, Some(_)) => Ok(SignUpOutcome::ConfirmationPending),
            _ => Err(BackendError::Decode("sign-up response carried no user".into())),
        }
    }

    async fn sign_out(&self, session: &Session) -> BackendResult<()> {
        let request = self.request(Method::POST, self.auth_url("logout"), Some(session));
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session {
            access_token: "user-token".into(),
            user: User {
                id: "user-1".into(),
                email: Some("me@example.com".into()),
            },
        }
    }

    fn row(id: i64, status: &str) -> Value {
        json!({
            "id": id,
            "title": format!("task {id}"),
            "description": null,
            "status": status,
            "created_at": "2024-03-04T14:15:00+00:00",
            "user_id": "user-1"
        })
    }

    #[tokio::test]
    async fn fetch_filters_by_owner_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("user_id", "eq.user-1"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(2, "done"), row(1, "todo")])))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        let tasks = backend.fetch_tasks(&session()).await.unwrap();
        assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(tasks[0].status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn create_posts_row_and_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/tasks"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!([{
                "title": "task 9",
                "description": null,
                "status": "in_progress",
                "user_id": "user-1"
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(9, "in_progress")])))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(format!("{}/", server.uri()), "anon");
        let created = backend
            .create_task(
                &session(),
                &NewTask {
                    title: "task 9".into(),
                    description: None,
                    status: TaskStatus::InProgress,
                    user_id: "user-1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.id, 9);
    }

    #[tokio::test]
    async fn update_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("id", "eq.4"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({"status": "done"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 4}])))
            .expect(1)
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        backend
            .update_task(&session(), 4, &TaskChanges::status(TaskStatus::Done))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_matching_no_row_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("id", "eq.4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        let err = backend
            .update_task(&session(), 4, &TaskChanges::status(TaskStatus::Done))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(4)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn delete_reports_missing_and_present_rows() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("id", "eq.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3}])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/tasks"))
            .and(query_param("id", "eq.8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        backend.delete_task(&session(), 3).await.unwrap();
        let err = backend.delete_task(&session(), 8).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(8)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn delete_error_carries_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/tasks"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "JWT expired"})))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        let err = backend.delete_task(&session(), 4).await.unwrap_err();
        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "JWT expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_in_builds_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "token_type": "bearer",
                "user": {"id": "user-1", "email": "me@example.com"}
            })))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        let session = backend
            .sign_in(&Credentials {
                email: "me@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.access_token, "fresh");
        assert_eq!(session.user_id(), "user-1");
    }

    #[tokio::test]
    async fn sign_in_rejection_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        let err = backend
            .sign_in(&Credentials {
                email: "me@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn sign_up_without_session_waits_for_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-2",
                "email": "new@example.com"
            })))
            .mount(&server)
            .await;

        let backend = SupabaseBackend::new(server.uri(), "anon");
        let outcome = backend
            .sign_up(&Credentials {
                email: "new@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, SignUpOutcome::ConfirmationPending);
    }

    #[test]
    fn error_message_prefers_known_fields() {
        assert_eq!(error_message(r#"{"msg":"bad"}"#, "Bad Request"), "bad");
        assert_eq!(error_message("<html>", "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(r#"{"code":1}"#, "Bad Request"), "Bad Request");
    }
}
