use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::ListItem,
};

use super::form::{TaskField, TaskForm};
use crate::task::{Task, TaskStatus};

/// Rows taken by one card; mouse hit-testing depends on it.
pub const CARD_HEIGHT: u16 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardState {
    pub selected: bool,
    pub grabbed: bool,
}

pub fn card_item(task: &Task, state: CardState) -> ListItem<'_> {
    let mut title_style = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    if state.grabbed {
        title_style = title_style.fg(Color::Yellow).add_modifier(Modifier::ITALIC);
    }
    let indicator = if task.status == TaskStatus::Done {
        Span::styled("✓ ", Style::default().fg(Color::Green))
    } else {
        Span::styled("○ ", Style::default().fg(Color::DarkGray))
    };
    let description = task.description.as_deref().unwrap_or("");

    let item = ListItem::new(vec![
        Line::from(vec![indicator, Span::styled(task.title.as_str(), title_style)]),
        Line::from(Span::styled(description, Style::default().fg(Color::Gray))),
        Line::from(Span::styled(task.created_label(), Style::default().fg(Color::DarkGray))),
    ]);
    if state.selected {
        item.style(Style::default().bg(Color::Rgb(48, 40, 72)))
    } else {
        item
    }
}

/// Inline form rendered in place of a card (editing) or under a column
/// (adding).
pub fn form_item(form: &TaskForm) -> ListItem<'_> {
    let focused = Style::default().fg(Color::Cyan);
    let plain = Style::default().fg(Color::Gray);
    let (title_style, description_style) = match form.focus {
        TaskField::Title => (focused, plain),
        TaskField::Description => (plain, focused),
    };
    ListItem::new(vec![
        Line::from(vec![Span::raw("Title: "), Span::styled(form.title.value(), title_style)]),
        Line::from(vec![Span::raw("Desc:  "), Span::styled(form.description.value(), description_style)]),
        Line::from(Span::styled(
            "Enter: save  Tab: field  Esc: cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ])
}

pub fn delete_prompt(task: &Task) -> Line<'_> {
    Line::from(vec![
        Span::styled("Delete ", Style::default().fg(Color::Red)),
        Span::styled(task.title.as_str(), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("? Are you sure? (y/n)", Style::default().fg(Color::Red)),
    ])
}
