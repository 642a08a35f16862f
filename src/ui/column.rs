use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use super::card::{card_item, form_item, CardState};
use super::form::TaskForm;
use crate::task::{Task, TaskId, TaskStatus};

/// Everything a column needs to draw itself. The board does the filtering;
/// `tasks` holds exactly the tasks whose status is `status`.
pub struct ColumnView<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
    pub selected: Option<usize>,
    pub focused: bool,
    pub editing: Option<(TaskId, &'a TaskForm)>,
    pub adding: Option<&'a TaskForm>,
    pub grabbed: Option<TaskId>,
    pub drop_index: Option<usize>,
}

fn accent(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Todo => Color::Gray,
        TaskStatus::InProgress => Color::Red,
        TaskStatus::Done => Color::Green,
    }
}

pub fn render(f: &mut Frame, area: Rect, view: &ColumnView<'_>, state: &mut ListState) {
    let mut items: Vec<ListItem> = Vec::with_capacity(view.tasks.len() + 2);
    for (i, task) in view.tasks.iter().enumerate() {
        if view.drop_index == Some(i) {
            items.push(drop_marker());
        }
        match view.editing {
            Some((id, form)) if id == task.id => items.push(form_item(form)),
            _ => items.push(card_item(
                task,
                CardState {
                    selected: view.selected == Some(i),
                    grabbed: view.grabbed == Some(task.id),
                },
            )),
        }
    }
    if view.drop_index.is_some_and(|i| i >= view.tasks.len()) {
        items.push(drop_marker());
    }
    match view.adding {
        Some(form) => items.push(form_item(form)),
        None if view.focused => items.push(ListItem::new(Line::from(Span::styled(
            "+ Add Task (a)",
            Style::default().fg(Color::DarkGray),
        )))),
        None => {}
    }

    let title = Line::from(vec![
        Span::styled(
            view.status.title(),
            Style::default().fg(accent(view.status)).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" ({})", view.tasks.len()), Style::default().fg(accent(view.status))),
    ]);
    let border_style = if view.drop_index.is_some() {
        Style::default().fg(Color::Yellow)
    } else if view.focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL).border_style(border_style))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));

    // Drop markers shift item positions, so only track selection outside a drag.
    state.select(view.selected.filter(|_| view.drop_index.is_none()));
    f.render_stateful_widget(list, area, state);
}

fn drop_marker() -> ListItem<'static> {
    ListItem::new(Line::from(Span::styled(
        "── drop here ──",
        Style::default().fg(Color::Yellow),
    )))
}
