pub mod auth;
pub mod card;
pub mod column;
pub mod form;

use crossterm::event;
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::app::{App, Mode};
use crate::kanban_board::TaskBoard;
use crate::session::Session;
use crate::sync::SyncEvent;
use crate::task::TaskStatus;
use column::ColumnView;

const TICK: Duration = Duration::from_millis(100);

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &mut UnboundedReceiver<SyncEvent>,
) -> io::Result<()> {
    loop {
        while let Ok(sync) = events.try_recv() {
            app.handle_sync(sync);
        }

        terminal.draw(|f| draw(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        if event::poll(TICK)? {
            app.handle_event(event::read()?);
        }
    }
}

pub fn draw(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let Some(session) = app.session.as_ref() else {
        auth::render(f, area, &app.auth);
        return;
    };
    match app.board.as_ref() {
        Some(board) if !board.is_loading() => {}
        _ => {
            draw_loading(f, area);
            return;
        }
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    if let Some(board) = app.board.as_ref() {
        draw_header(f, rows[0], board, session);
    }
    draw_columns(f, rows[1], app);
    draw_footer(f, rows[2], app);
}

fn draw_loading(f: &mut Frame, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Percentage(45), Constraint::Length(2), Constraint::Min(0)])
        .split(area);
    let text = vec![
        Line::from(Span::styled("Loading your workspace...", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled("Preparing your tasks", Style::default().fg(Color::DarkGray))),
    ];
    f.render_widget(Paragraph::new(text).alignment(Alignment::Center), rows[1]);
}

fn draw_header(f: &mut Frame, area: Rect, board: &TaskBoard, session: &Session) {
    let mut spans = vec![
        Span::styled("MiniTask", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        Span::raw(format!("   Total: {}", board.total())),
        Span::styled(format!("   Completed: {}", board.completed()), Style::default().fg(Color::Green)),
        Span::styled(format!("   Progress: {}%", board.progress_percent()), Style::default().fg(Color::Magenta)),
    ];
    if board.pending_count() > 0 {
        spans.push(Span::styled(
            format!("   syncing {}…", board.pending_count()),
            Style::default().fg(Color::Yellow),
        ));
    }
    spans.push(Span::styled(
        format!("   {}  (s) Sign Out", session.display_name()),
        Style::default().fg(Color::Gray),
    ));
    f.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_columns(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(area);

    let Some(board) = app.board.as_ref() else {
        return;
    };
    let (editing, adding, dragging) = match &app.mode {
        Mode::Editing(id, form) => (Some((*id, form)), None, None),
        Mode::Adding(form) => (None, Some(form), None),
        Mode::Dragging(drag) => (None, None, Some(*drag)),
        Mode::Browse | Mode::ConfirmDelete(_) => (None, None, None),
    };

    for (i, status) in TaskStatus::ALL.iter().copied().enumerate() {
        let focused = app.selected_status == i;
        let view = ColumnView {
            status,
            tasks: board.tasks_by_status(status),
            selected: focused.then_some(app.selected_task),
            focused,
            editing,
            adding: adding.filter(|_| focused),
            grabbed: dragging.map(|d| d.task_id),
            drop_index: dragging.filter(|d| d.target.column == status).map(|d| d.target.index),
        };
        column::render(f, chunks[i], &view, &mut app.list_states[i]);
        app.column_areas[i] = chunks[i];
    }
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    let hint = Style::default().fg(Color::DarkGray);
    let line = match &app.mode {
        Mode::ConfirmDelete(id) => match app.board.as_ref().and_then(|b| b.task(*id)) {
            Some(task) => card::delete_prompt(task),
            None => Line::default(),
        },
        Mode::Dragging(_) => Line::from(Span::styled(
            "←/→ column  ↑/↓ position  Enter drop  Esc cancel",
            hint,
        )),
        Mode::Adding(_) | Mode::Editing(..) => Line::from(Span::styled("Enter save  Tab field  Esc cancel", hint)),
        Mode::Browse => Line::from(Span::styled(
            "←/→/↑/↓ select  a add  e edit  d delete  </> move  space drag  r reload  s sign out  q quit",
            hint,
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}
