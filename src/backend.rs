use async_trait::async_trait;

use crate::error::BackendResult;
use crate::session::{Credentials, Session, SignUpOutcome};
use crate::task::{NewTask, Task, TaskChanges, TaskId};

/// Hosted persistence and identity service the board talks to.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All tasks owned by the session's user, newest first.
    async fn fetch_tasks(&self, session: &Session) -> BackendResult<Vec<Task>>;
    async fn create_task(&self, session: &Session, task: &NewTask) -> BackendResult<Task>;
    async fn update_task(&self, session: &Session, id: TaskId, changes: &TaskChanges) -> BackendResult<()>;
    async fn delete_task(&self, session: &Session, id: TaskId) -> BackendResult<()>;
    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<Session>;
    async fn sign_up(&self, credentials: &Credentials) -> BackendResult<SignUpOutcome>;
    async fn sign_out(&self, session: &Session) -> BackendResult<()>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::BackendError;
    use crate::session::User;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory backend with switchable failure.
    #[derive(Default)]
    pub struct MemoryBackend {
        pub rows: Mutex<Vec<Task>>,
        pub failing: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl MemoryBackend {
        pub fn with_rows(rows: Vec<Task>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Self::default()
            }
        }

        pub fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn enter(&self) -> BackendResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(BackendError::Status {
                    status: 503,
                    message: "service unavailable".into(),
                });
            }
            Ok(())
        }
    }

    pub fn session() -> Session {
        Session {
            access_token: "token".into(),
            user: User {
                id: "user-1".into(),
                email: Some("me@example.com".into()),
            },
        }
    }

    pub fn task(id: TaskId, title: &str, status: crate::task::TaskStatus) -> Task {
        Task {
            id,
            title: title.into(),
            description: None,
            status,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(id),
            user_id: "user-1".into(),
        }
    }

    #[async_trait]
    impl Backend for MemoryBackend {
        async fn fetch_tasks(&self, session: &Session) -> BackendResult<Vec<Task>> {
            self.enter()?;
            let mut rows: Vec<Task> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.user_id == session.user.id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        }

        async fn create_task(&self, _session: &Session, new: &NewTask) -> BackendResult<Task> {
            self.enter()?;
            let mut rows = self.rows.lock().unwrap();
            let id = rows.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            let task = Task {
                id,
                title: new.title.clone(),
                description: new.description.clone(),
                status: new.status,
                created_at: Utc::now(),
                user_id: new.user_id.clone(),
            };
            rows.push(task.clone());
            Ok(task)
        }

        async fn update_task(&self, _session: &Session, id: TaskId, changes: &TaskChanges) -> BackendResult<()> {
            self.enter()?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows.iter_mut().find(|t| t.id == id).ok_or(BackendError::NotFound(id))?;
            changes.apply_to(row);
            Ok(())
        }

        async fn delete_task(&self, _session: &Session, id: TaskId) -> BackendResult<()> {
            self.enter()?;
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|t| t.id != id);
            if rows.len() == before {
                return Err(BackendError::NotFound(id));
            }
            Ok(())
        }

        async fn sign_in(&self, credentials: &Credentials) -> BackendResult<Session> {
            self.enter()?;
            if credentials.password != "secret" {
                return Err(BackendError::Auth("Invalid login credentials".into()));
            }
            let mut session = session();
            session.user.email = Some(credentials.email.clone());
            Ok(session)
        }

        async fn sign_up(&self, _credentials: &Credentials) -> BackendResult<SignUpOutcome> {
            self.enter()?;
            Ok(SignUpOutcome::ConfirmationPending)
        }

        async fn sign_out(&self, _session: &Session) -> BackendResult<()> {
            self.enter()
        }
    }
}
