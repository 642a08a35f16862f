//! The canonical in-memory task list for a signed-in session.
//!
//! Mutations are split in two halves. Request methods (`add_task`,
//! `edit_task`, ...) validate against local state and hand back a [`Ticket`];
//! they never touch the list. Once the backend call for a ticket finishes,
//! [`TaskBoard::reconcile`] applies its [`Outcome`]. Failures leave the list
//! as it was: there is no retry and no rollback.

use std::collections::HashMap;

use tracing::{debug, error};

use crate::backend::Backend;
use crate::session::Session;
use crate::sync;
use crate::task::{normalize_description, validate_title, NewTask, Task, TaskChanges, TaskError, TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(NewTask),
    Update { id: TaskId, changes: TaskChanges },
    Delete { id: TaskId },
}

impl Mutation {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update { id, .. } | Mutation::Delete { id } => Some(*id),
        }
    }
}

/// A mutation the board has accepted and wants persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub seq: u64,
    pub mutation: Mutation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created { seq: u64, task: Task },
    Updated { seq: u64, id: TaskId, changes: TaskChanges },
    Deleted { seq: u64, id: TaskId },
    Failed { seq: u64, task_id: Option<TaskId> },
}

impl Outcome {
    pub fn seq(&self) -> u64 {
        match self {
            Outcome::Created { seq, .. }
            | Outcome::Updated { seq, .. }
            | Outcome::Deleted { seq, .. }
            | Outcome::Failed { seq, .. } => *seq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragLocation {
    pub column: TaskStatus,
    pub index: usize,
}

/// End of a drag gesture. `destination` is `None` when the card was dropped
/// outside every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragResult {
    pub task_id: TaskId,
    pub source: DragLocation,
    pub destination: Option<DragLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Title,
    Description,
    Status,
}

impl Field {
    fn changed_by(changes: &TaskChanges) -> Vec<Field> {
        let mut fields = Vec::with_capacity(3);
        if changes.title.is_some() {
            fields.push(Field::Title);
        }
        if changes.description.is_some() {
            fields.push(Field::Description);
        }
        if changes.status.is_some() {
            fields.push(Field::Status);
        }
        fields
    }

    fn clear(self, changes: &mut TaskChanges) {
        match self {
            Field::Title => changes.title = None,
            Field::Description => changes.description = None,
            Field::Status => changes.status = None,
        }
    }
}

#[derive(Debug)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    owner: String,
    loading: bool,
    load_failed: bool,
    next_seq: u64,
    // Newest ticket applied per task field; older responses lose that field.
    applied: HashMap<(TaskId, Field), u64>,
    in_flight: usize,
}

impl TaskBoard {
    pub fn new(session: &Session) -> Self {
        Self {
            tasks: Vec::new(),
            owner: session.user_id().to_string(),
            loading: true,
            load_failed: false,
            next_seq: 0,
            applied: HashMap::new(),
            in_flight: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True once a load has finished without reaching the backend's rows.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed(&self) -> usize {
        self.tasks_by_status(TaskStatus::Done).len()
    }

    pub fn progress_percent(&self) -> u32 {
        if self.tasks.is_empty() {
            return 0;
        }
        ((self.completed() as f64 / self.tasks.len() as f64) * 100.0).round() as u32
    }

    /// Fetches the session's tasks. On failure the list stays empty.
    pub async fn load<B: Backend + ?Sized>(&mut self, backend: &B, session: &Session) {
        let fetched = backend.fetch_tasks(session).await;
        if let Err(err) = &fetched {
            error!(error = %err, "error fetching tasks");
        }
        self.finish_load(fetched.ok());
    }

    /// Completes a load started elsewhere. `None` means the fetch failed.
    pub fn finish_load(&mut self, tasks: Option<Vec<Task>>) {
        self.load_failed = tasks.is_none();
        if let Some(tasks) = tasks {
            self.tasks = tasks;
        }
        self.loading = false;
    }

    pub fn add_task(&mut self, title: &str, description: &str, status: TaskStatus) -> Result<Ticket, TaskError> {
        let title = validate_title(title)?;
        let task = NewTask {
            title,
            description: normalize_description(description),
            status,
            user_id: self.owner.clone(),
        };
        Ok(self.issue(Mutation::Create(task)))
    }

    /// Only `title` and `description` may be edited here; status changes go
    /// through [`TaskBoard::move_task`].
    pub fn edit_task(&mut self, id: TaskId, title: &str, description: &str) -> Result<Ticket, TaskError> {
        let title = validate_title(title)?;
        self.task(id).ok_or(TaskError::UnknownTask(id))?;
        let changes = TaskChanges {
            title: Some(title),
            description: Some(normalize_description(description)),
            status: None,
        };
        Ok(self.issue(Mutation::Update { id, changes }))
    }

    pub fn delete_task(&mut self, id: TaskId) -> Result<Ticket, TaskError> {
        self.task(id).ok_or(TaskError::UnknownTask(id))?;
        Ok(self.issue(Mutation::Delete { id }))
    }

    pub fn move_task(&mut self, id: TaskId, status: TaskStatus) -> Result<Ticket, TaskError> {
        self.task(id).ok_or(TaskError::UnknownTask(id))?;
        Ok(self.issue(Mutation::Update {
            id,
            changes: TaskChanges::status(status),
        }))
    }

    /// Turns a finished drag into a status change. Dropping nowhere, or back
    /// onto the exact starting slot, does nothing. The index within a column
    /// is not persisted.
    pub fn handle_drag_end(&mut self, result: DragResult) -> Option<Ticket> {
        let destination = result.destination?;
        if destination == result.source {
            return None;
        }
        match self.move_task(result.task_id, destination.column) {
            Ok(ticket) => Some(ticket),
            Err(err) => {
                debug!(error = %err, "ignoring drag of unknown task");
                None
            }
        }
    }

    fn issue(&mut self, mutation: Mutation) -> Ticket {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.in_flight += 1;
        Ticket { seq, mutation }
    }

    pub fn reconcile(&mut self, outcome: Outcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Outcome::Created { task, .. } => self.tasks.insert(0, task),
            Outcome::Updated { seq, id, mut changes } => {
                for field in Field::changed_by(&changes) {
                    let newest = self.applied.entry((id, field)).or_insert(seq);
                    if *newest > seq {
                        debug!(task = id, seq, ?field, "discarding superseded field");
                        field.clear(&mut changes);
                    } else {
                        *newest = seq;
                    }
                }
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                    changes.apply_to(task);
                }
            }
            Outcome::Deleted { id, .. } => {
                self.tasks.retain(|t| t.id != id);
                self.applied.retain(|(task, _), _| *task != id);
            }
            Outcome::Failed { .. } => {}
        }
    }

    /// Persists a ticket and applies the result before returning.
    pub async fn submit<B: Backend + ?Sized>(&mut self, backend: &B, session: &Session, ticket: Ticket) {
        let outcome = sync::perform(backend, session, ticket).await;
        self.reconcile(outcome);
    }
}
