//! Application state: which screen is up, what is selected, and how input and
//! backend results change it. Drawing lives in `ui`.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};
use ratatui::widgets::ListState;
use tracing::{debug, info, warn};

use crate::kanban_board::{DragLocation, DragResult, TaskBoard, Ticket};
use crate::session::{Session, SignUpOutcome};
use crate::sync::{Dispatcher, SyncEvent};
use crate::task::{TaskId, TaskStatus};
use crate::ui::auth::{AuthAction, AuthForm, AuthMode};
use crate::ui::card::CARD_HEIGHT;
use crate::ui::form::{FormAction, TaskForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    pub task_id: TaskId,
    pub source: DragLocation,
    pub target: DragLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Browse,
    Adding(TaskForm),
    Editing(TaskId, TaskForm),
    ConfirmDelete(TaskId),
    Dragging(Drag),
}

pub struct App {
    dispatcher: Dispatcher,
    pub session: Option<Session>,
    pub board: Option<TaskBoard>,
    // Bumped for every new board; results stamped with an older value are stale.
    generation: u64,
    pub auth: AuthForm,
    pub mode: Mode,
    pub selected_status: usize,
    pub selected_task: usize,
    pub should_quit: bool,
    pub column_areas: [Rect; 3],
    pub list_states: [ListState; 3],
}

impl App {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            session: None,
            board: None,
            generation: 0,
            auth: AuthForm::default(),
            mode: Mode::Browse,
            selected_status: 0,
            selected_task: 0,
            should_quit: false,
            column_areas: [Rect::default(); 3],
            list_states: Default::default(),
        }
    }

    pub fn selected_column(&self) -> TaskStatus {
        TaskStatus::from_column_index(self.selected_status).unwrap_or(TaskStatus::Todo)
    }

    fn column_len(&self, status: TaskStatus) -> usize {
        self.board.as_ref().map_or(0, |b| b.tasks_by_status(status).len())
    }

    pub fn selected_task_id(&self) -> Option<TaskId> {
        let board = self.board.as_ref()?;
        board
            .tasks_by_status(self.selected_column())
            .get(self.selected_task)
            .map(|t| t.id)
    }

    pub fn clamp_selection(&mut self) {
        let len = self.column_len(self.selected_column());
        self.selected_task = self.selected_task.min(len.saturating_sub(1));
    }

    /// Replaces the board with an empty one and starts loading it.
    fn open_board(&mut self, session: &Session) {
        self.generation += 1;
        self.board = Some(TaskBoard::new(session));
        self.dispatcher.load(session, self.generation);
    }

    fn start_session(&mut self, session: Session) {
        info!(user = %session.user.id, "starting board session");
        self.open_board(&session);
        self.session = Some(session);
        self.mode = Mode::Browse;
        self.selected_status = 0;
        self.selected_task = 0;
        self.auth.signed_in();
    }

    /// Local teardown happens right away; the remote sign-out runs in the
    /// background and its failure is only logged.
    fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            self.dispatcher.sign_out(session);
        }
        self.board = None;
        self.generation += 1;
        self.mode = Mode::Browse;
        self.auth = AuthForm::default();
    }

    fn reload(&mut self) {
        if let Some(session) = self.session.take() {
            self.open_board(&session);
            self.session = Some(session);
        }
    }

    fn submit(&mut self, ticket: Ticket) {
        if let Some(session) = &self.session {
            self.dispatcher.submit(session, self.generation, ticket);
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    pub fn handle_sync(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::SignedIn(Ok(session)) => {
                if self.session.is_none() {
                    self.start_session(session);
                }
            }
            SyncEvent::SignedIn(Err(message)) | SyncEvent::SignedUp(Err(message)) => self.auth.failed(message),
            SyncEvent::SignedUp(Ok(SignUpOutcome::SignedIn(session))) => {
                if self.session.is_none() {
                    self.start_session(session);
                }
            }
            SyncEvent::SignedUp(Ok(SignUpOutcome::ConfirmationPending)) => self.auth.confirmation_pending(),
            SyncEvent::Loaded { generation, tasks } => match self.current_board(generation) {
                Some(board) => {
                    board.finish_load(tasks);
                    self.clamp_selection();
                }
                None => debug!(generation, "dropping load for replaced board"),
            },
            SyncEvent::Mutated { generation, outcome } => match self.current_board(generation) {
                Some(board) => {
                    board.reconcile(outcome);
                    self.clamp_selection();
                }
                None => debug!(generation, seq = outcome.seq(), "dropping outcome for replaced board"),
            },
            SyncEvent::SignedOut => {}
        }
    }

    fn current_board(&mut self, generation: u64) -> Option<&mut TaskBoard> {
        if generation != self.generation {
            return None;
        }
        self.board.as_mut()
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.session.is_none() {
            match self.auth.handle_key(key) {
                AuthAction::Submit(AuthMode::SignIn, credentials) => self.dispatcher.sign_in(credentials),
                AuthAction::Submit(AuthMode::SignUp, credentials) => self.dispatcher.sign_up(credentials),
                AuthAction::Quit => self.should_quit = true,
                AuthAction::None => {}
            }
            return;
        }
        if self.board.as_ref().is_some_and(TaskBoard::is_loading) {
            if key.code == KeyCode::Char('q') {
                self.should_quit = true;
            }
            return;
        }

        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Browse => self.browse_key(key),
            Mode::Adding(mut form) => match form.handle_key(key) {
                FormAction::Continue => self.mode = Mode::Adding(form),
                FormAction::Cancel => {}
                FormAction::Submit => {
                    let status = self.selected_column();
                    let ticket = self
                        .board
                        .as_mut()
                        .map(|b| b.add_task(form.title.value(), form.description.value(), status));
                    match ticket {
                        Some(Ok(ticket)) => self.submit(ticket),
                        Some(Err(err)) => warn!(error = %err, "task not added"),
                        None => {}
                    }
                }
            },
            Mode::Editing(id, mut form) => match form.handle_key(key) {
                FormAction::Continue => self.mode = Mode::Editing(id, form),
                FormAction::Cancel => {}
                FormAction::Submit => {
                    let ticket = self
                        .board
                        .as_mut()
                        .map(|b| b.edit_task(id, form.title.value(), form.description.value()));
                    match ticket {
                        Some(Ok(ticket)) => self.submit(ticket),
                        Some(Err(err)) => warn!(error = %err, "task not edited"),
                        None => {}
                    }
                }
            },
            Mode::ConfirmDelete(id) => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    if let Some(Ok(ticket)) = self.board.as_mut().map(|b| b.delete_task(id)) {
                        self.submit(ticket);
                    }
                }
            }
            Mode::Dragging(drag) => self.drag_key(key, drag),
        }
    }

    fn browse_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left => {
                self.selected_status = self.selected_status.saturating_sub(1);
                self.clamp_selection();
            }
            KeyCode::Right => {
                self.selected_status = (self.selected_status + 1).min(TaskStatus::ALL.len() - 1);
                self.clamp_selection();
            }
            KeyCode::Up => self.selected_task = self.selected_task.saturating_sub(1),
            KeyCode::Down => {
                self.selected_task += 1;
                self.clamp_selection();
            }
            KeyCode::Char('a') => self.mode = Mode::Adding(TaskForm::empty()),
            KeyCode::Char('e') => {
                let form = self
                    .selected_task_id()
                    .and_then(|id| self.board.as_ref()?.task(id).map(|t| (id, TaskForm::for_task(t))));
                if let Some((id, form)) = form {
                    self.mode = Mode::Editing(id, form);
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task_id() {
                    self.mode = Mode::ConfirmDelete(id);
                }
            }
            KeyCode::Char('<') | KeyCode::Char('>') => {
                let direction = if key.code == KeyCode::Char('<') { -1 } else { 1 };
                let status = self.selected_column().shifted(direction);
                if let Some(id) = self.selected_task_id().filter(|_| status != self.selected_column()) {
                    if let Some(Ok(ticket)) = self.board.as_mut().map(|b| b.move_task(id, status)) {
                        self.submit(ticket);
                    }
                }
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_task_id() {
                    let source = DragLocation {
                        column: self.selected_column(),
                        index: self.selected_task,
                    };
                    self.mode = Mode::Dragging(Drag {
                        task_id: id,
                        source,
                        target: source,
                    });
                }
            }
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('s') => self.sign_out(),
            _ => {}
        }
    }

    /// Highest slot a card may be dropped on in `column`.
    fn max_drop_index(&self, drag: &Drag, column: TaskStatus) -> usize {
        let len = self.column_len(column);
        if column == drag.source.column {
            len.saturating_sub(1)
        } else {
            len
        }
    }

    fn retarget(&self, drag: &mut Drag, column: TaskStatus) {
        drag.target = if column == drag.source.column {
            drag.source
        } else {
            DragLocation {
                column,
                index: self.column_len(column),
            }
        };
    }

    fn drag_key(&mut self, key: KeyEvent, mut drag: Drag) {
        match key.code {
            KeyCode::Left | KeyCode::Right => {
                let direction = if key.code == KeyCode::Left { -1 } else { 1 };
                let column = drag.target.column.shifted(direction);
                self.retarget(&mut drag, column);
                self.mode = Mode::Dragging(drag);
            }
            KeyCode::Up => {
                drag.target.index = drag.target.index.saturating_sub(1);
                self.mode = Mode::Dragging(drag);
            }
            KeyCode::Down => {
                drag.target.index = (drag.target.index + 1).min(self.max_drop_index(&drag, drag.target.column));
                self.mode = Mode::Dragging(drag);
            }
            KeyCode::Enter => self.finish_drag(drag, Some(drag.target)),
            KeyCode::Esc => self.finish_drag(drag, None),
            _ => self.mode = Mode::Dragging(drag),
        }
    }

    fn finish_drag(&mut self, drag: Drag, destination: Option<DragLocation>) {
        self.mode = Mode::Browse;
        let result = DragResult {
            task_id: drag.task_id,
            source: drag.source,
            destination,
        };
        if let Some(ticket) = self.board.as_mut().and_then(|b| b.handle_drag_end(result)) {
            self.submit(ticket);
        }
        if let Some(destination) = destination {
            self.selected_status = destination.column.column_index();
            self.selected_task = destination.index;
            self.clamp_selection();
        }
    }

    /// Column and card slot under a screen position.
    fn hit(&self, column: u16, row: u16) -> Option<(TaskStatus, usize)> {
        let position = Position { x: column, y: row };
        let index = self.column_areas.iter().position(|area| area.contains(position))?;
        let area = self.column_areas[index];
        let status = TaskStatus::from_column_index(index)?;
        let inner_row = row.saturating_sub(area.y + 1);
        let slot = self.list_states[index].offset() + (inner_row / CARD_HEIGHT) as usize;
        Some((status, slot))
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.session.is_none() || self.board.as_ref().map_or(true, TaskBoard::is_loading) {
            return;
        }
        let dragging = match &self.mode {
            Mode::Dragging(drag) => Some(*drag),
            Mode::Browse => None,
            _ => return,
        };
        match (mouse.kind, dragging) {
            (MouseEventKind::Down(MouseButton::Left), None) => {
                let Some((status, slot)) = self.hit(mouse.column, mouse.row) else {
                    return;
                };
                self.selected_status = status.column_index();
                if slot < self.column_len(status) {
                    self.selected_task = slot;
                    self.browse_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
                } else {
                    self.clamp_selection();
                }
            }
            (MouseEventKind::Drag(MouseButton::Left), Some(mut drag)) => {
                if let Some((status, slot)) = self.hit(mouse.column, mouse.row) {
                    drag.target = DragLocation {
                        column: status,
                        index: slot.min(self.max_drop_index(&drag, status)),
                    };
                    self.mode = Mode::Dragging(drag);
                }
            }
            (MouseEventKind::Up(MouseButton::Left), Some(drag)) => {
                let destination = self.hit(mouse.column, mouse.row).map(|(status, slot)| DragLocation {
                    column: status,
                    index: slot.min(self.max_drop_index(&drag, status)),
                });
                self.finish_drag(drag, destination);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{session, task, MemoryBackend};
    use crate::kanban_board::Outcome;
    use std::sync::Arc;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
    }

    async fn pump(app: &mut App, events: &mut UnboundedReceiver<SyncEvent>) {
        let event = events.recv().await.expect("dispatcher closed");
        app.handle_sync(event);
    }

    async fn signed_in(backend: Arc<MemoryBackend>) -> (App, UnboundedReceiver<SyncEvent>) {
        let (dispatcher, mut events) = Dispatcher::new(Handle::current(), backend);
        let mut app = App::new(dispatcher);
        type_text(&mut app, "me@example.com");
        app.handle_event(key(KeyCode::Tab));
        type_text(&mut app, "secret");
        app.handle_event(key(KeyCode::Enter));
        assert!(app.auth.submitting);
        pump(&mut app, &mut events).await; // SignedIn
        assert!(app.session.is_some());
        assert!(app.board.as_ref().unwrap().is_loading());
        pump(&mut app, &mut events).await; // Loaded
        (app, events)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrong_password_stays_on_auth_gate() {
        let backend = Arc::new(MemoryBackend::default());
        let (dispatcher, mut events) = Dispatcher::new(Handle::current(), backend);
        let mut app = App::new(dispatcher);
        type_text(&mut app, "me@example.com");
        app.handle_event(key(KeyCode::Tab));
        type_text(&mut app, "guess");
        app.handle_event(key(KeyCode::Enter));
        pump(&mut app, &mut events).await;
        assert!(app.session.is_none());
        assert_eq!(app.auth.error.as_deref(), Some("Invalid login credentials"));
        assert!(!app.auth.submitting);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_form_creates_task_in_selected_column() {
        let backend = Arc::new(MemoryBackend::default());
        let (mut app, mut events) = signed_in(backend).await;

        app.handle_event(key(KeyCode::Right));
        app.handle_event(key(KeyCode::Char('a')));
        type_text(&mut app, "Write tests");
        app.handle_event(key(KeyCode::Enter));
        assert_eq!(app.mode, Mode::Browse);
        pump(&mut app, &mut events).await;

        let board = app.board.as_ref().unwrap();
        assert_eq!(board.tasks()[0].title, "Write tests");
        assert_eq!(board.tasks()[0].status, TaskStatus::InProgress);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_requires_confirmation() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![task(1, "a", TaskStatus::Todo)]));
        let (mut app, mut events) = signed_in(backend.clone()).await;

        app.handle_event(key(KeyCode::Char('d')));
        assert_eq!(app.mode, Mode::ConfirmDelete(1));
        app.handle_event(key(KeyCode::Char('n')));
        assert_eq!(app.mode, Mode::Browse);
        assert_eq!(app.board.as_ref().unwrap().total(), 1);

        app.handle_event(key(KeyCode::Char('d')));
        app.handle_event(key(KeyCode::Char('y')));
        pump(&mut app, &mut events).await;
        assert_eq!(app.board.as_ref().unwrap().total(), 0);
        assert!(backend.rows.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keyboard_drag_moves_card_to_next_column() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![task(1, "a", TaskStatus::Todo)]));
        let (mut app, mut events) = signed_in(backend).await;

        app.handle_event(key(KeyCode::Char(' ')));
        app.handle_event(key(KeyCode::Right));
        app.handle_event(key(KeyCode::Right));
        app.handle_event(key(KeyCode::Enter));
        pump(&mut app, &mut events).await;

        assert_eq!(app.board.as_ref().unwrap().task(1).unwrap().status, TaskStatus::Done);
        assert_eq!(app.selected_column(), TaskStatus::Done);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_drag_issues_nothing() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![task(1, "a", TaskStatus::Todo)]));
        let (mut app, _events) = signed_in(backend.clone()).await;
        let calls = backend.call_count();

        app.handle_event(key(KeyCode::Char(' ')));
        app.handle_event(key(KeyCode::Right));
        app.handle_event(key(KeyCode::Esc));
        assert_eq!(app.mode, Mode::Browse);
        assert_eq!(app.board.as_ref().unwrap().pending_count(), 0);
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mouse_drag_drops_on_column_under_cursor() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![task(1, "a", TaskStatus::Todo)]));
        let (mut app, mut events) = signed_in(backend).await;
        app.column_areas = [
            Rect::new(0, 3, 30, 20),
            Rect::new(30, 3, 30, 20),
            Rect::new(60, 3, 30, 20),
        ];
        let mouse = |kind, column, row| {
            Event::Mouse(MouseEvent {
                kind,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            })
        };

        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 5, 4));
        assert!(matches!(app.mode, Mode::Dragging(_)));
        app.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 35, 4));
        app.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 35, 4));
        pump(&mut app, &mut events).await;
        assert_eq!(app.board.as_ref().unwrap().task(1).unwrap().status, TaskStatus::InProgress);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_out_tears_down_board() {
        let backend = Arc::new(MemoryBackend::default());
        let (mut app, mut events) = signed_in(backend).await;
        app.handle_event(key(KeyCode::Char('s')));
        assert!(app.session.is_none());
        assert!(app.board.is_none());
        pump(&mut app, &mut events).await; // SignedOut
        assert!(app.session.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reload_drops_create_from_previous_board() {
        let backend = Arc::new(MemoryBackend::default());
        let (mut app, mut events) = signed_in(backend).await;
        let before = app.generation;

        app.handle_event(key(KeyCode::Char('a')));
        type_text(&mut app, "Write tests");
        app.handle_event(key(KeyCode::Enter));
        // The create finishes before the reload is asked for.
        let created = events.recv().await.expect("dispatcher closed");

        app.handle_event(key(KeyCode::Char('r')));
        assert_ne!(app.generation, before);
        pump(&mut app, &mut events).await; // Loaded, already has the row
        app.handle_sync(created);

        let board = app.board.as_ref().unwrap();
        assert_eq!(board.total(), 1);
        assert_eq!(board.tasks()[0].title, "Write tests");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_results_never_reach_next_users_board() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![task(1, "a", TaskStatus::Todo)]));
        let (mut app, mut events) = signed_in(backend).await;
        let first = app.generation;

        app.handle_event(key(KeyCode::Char('s')));
        pump(&mut app, &mut events).await; // SignedOut

        let mut other = session();
        other.user.id = "user-2".into();
        app.handle_sync(SyncEvent::SignedIn(Ok(other)));
        assert_eq!(app.session.as_ref().unwrap().user_id(), "user-2");

        app.handle_sync(SyncEvent::Loaded {
            generation: first,
            tasks: Some(vec![task(1, "a", TaskStatus::Todo)]),
        });
        app.handle_sync(SyncEvent::Mutated {
            generation: first,
            outcome: Outcome::Created {
                seq: 1,
                task: task(9, "not yours", TaskStatus::Todo),
            },
        });
        let board = app.board.as_ref().unwrap();
        assert!(board.is_loading());
        assert_eq!(board.total(), 0);

        app.handle_sync(SyncEvent::Loaded {
            generation: app.generation,
            tasks: Some(Vec::new()),
        });
        assert!(!app.board.as_ref().unwrap().is_loading());
    }

    #[test]
    fn fixture_session_is_signed_in_user() {
        assert_eq!(session().user_id(), "user-1");
    }
}
