//! Runs backend calls for the board and the auth gate off the UI thread.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

use crate::backend::Backend;
use crate::kanban_board::{Mutation, Outcome, Ticket};
use crate::session::{Credentials, Session, SignUpOutcome};
use crate::task::Task;

/// Executes one ticket. Backend errors are logged and reported as
/// [`Outcome::Failed`]; they are not propagated further.
pub async fn perform<B: Backend + ?Sized>(backend: &B, session: &Session, ticket: Ticket) -> Outcome {
    let Ticket { seq, mutation } = ticket;
    let task_id = mutation.task_id();
    let result = match mutation {
        Mutation::Create(new) => backend
            .create_task(session, &new)
            .await
            .map(|task| Outcome::Created { seq, task })
            .map_err(|e| ("adding", e)),
        Mutation::Update { id, changes } => backend
            .update_task(session, id, &changes)
            .await
            .map(|()| Outcome::Updated { seq, id, changes })
            .map_err(|e| ("updating", e)),
        Mutation::Delete { id } => backend
            .delete_task(session, id)
            .await
            .map(|()| Outcome::Deleted { seq, id })
            .map_err(|e| ("deleting", e)),
    };
    result.unwrap_or_else(|(action, err)| {
        error!(error = %err, task = ?task_id, "error {action} task");
        Outcome::Failed { seq, task_id }
    })
}

/// Board results carry the generation of the board that asked for them, so
/// a result that outlives a reload or a sign-out can be told apart.
#[derive(Debug)]
pub enum SyncEvent {
    /// `tasks` is `None` when the fetch failed.
    Loaded { generation: u64, tasks: Option<Vec<Task>> },
    Mutated { generation: u64, outcome: Outcome },
    SignedIn(Result<Session, String>),
    SignedUp(Result<SignUpOutcome, String>),
    SignedOut,
}

/// Spawns backend calls on a tokio runtime and reports results on a channel
/// the UI loop drains between frames.
#[derive(Clone)]
pub struct Dispatcher {
    runtime: Handle,
    backend: Arc<dyn Backend>,
    events: UnboundedSender<SyncEvent>,
}

impl Dispatcher {
    pub fn new(runtime: Handle, backend: Arc<dyn Backend>) -> (Self, UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = unbounded_channel();
        (
            Self {
                runtime,
                backend,
                events,
            },
            receiver,
        )
    }

    fn spawn<F, Fut>(&self, job: F)
    where
        F: FnOnce(Arc<dyn Backend>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = SyncEvent> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let event = job(backend).await;
            // The UI may already have shut down.
            let _ = events.send(event);
        });
    }

    pub fn load(&self, session: &Session, generation: u64) {
        let session = session.clone();
        self.spawn(move |backend| async move {
            let tasks = match backend.fetch_tasks(&session).await {
                Ok(tasks) => Some(tasks),
                Err(err) => {
                    error!(error = %err, "error fetching tasks");
                    None
                }
            };
            SyncEvent::Loaded { generation, tasks }
        });
    }

    pub fn submit(&self, session: &Session, generation: u64, ticket: Ticket) {
        let session = session.clone();
        self.spawn(move |backend| async move {
            let outcome = perform(backend.as_ref(), &session, ticket).await;
            SyncEvent::Mutated { generation, outcome }
        });
    }

    pub fn sign_in(&self, credentials: Credentials) {
        self.spawn(move |backend| async move {
            let result = backend.sign_in(&credentials).await;
            if let Ok(session) = &result {
                info!(user = %session.user.id, "signed in");
            }
            SyncEvent::SignedIn(result.map_err(|e| e.user_message()))
        });
    }

    pub fn sign_up(&self, credentials: Credentials) {
        self.spawn(move |backend| async move {
            let result = backend.sign_up(&credentials).await;
            SyncEvent::SignedUp(result.map_err(|e| e.user_message()))
        });
    }

    pub fn sign_out(&self, session: Session) {
        self.spawn(move |backend| async move {
            if let Err(err) = backend.sign_out(&session).await {
                error!(error = %err, "error signing out");
            }
            info!(user = %session.user.id, "signed out");
            SyncEvent::SignedOut
        });
    }
}
