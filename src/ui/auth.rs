use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::form::TextInput;
use crate::session::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    None,
    Submit(AuthMode, Credentials),
    Quit,
}

#[derive(Debug, Clone)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: TextInput,
    pub password: TextInput,
    pub focus: AuthField,
    pub submitting: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl Default for AuthForm {
    fn default() -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: TextInput::default(),
            password: TextInput::default(),
            focus: AuthField::Email,
            submitting: false,
            error: None,
            notice: None,
        }
    }
}

impl AuthForm {
    pub fn handle_key(&mut self, key: KeyEvent) -> AuthAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => AuthAction::Quit,
            KeyCode::Esc => AuthAction::Quit,
            KeyCode::Char('t') if ctrl => {
                self.toggle_mode();
                AuthAction::None
            }
            KeyCode::F(2) => {
                self.toggle_mode();
                AuthAction::None
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    AuthField::Email => AuthField::Password,
                    AuthField::Password => AuthField::Email,
                };
                AuthAction::None
            }
            KeyCode::Enter => self.submit(),
            _ => {
                match self.focus {
                    AuthField::Email => self.email.handle_key(key),
                    AuthField::Password => self.password.handle_key(key),
                };
                AuthAction::None
            }
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        self.error = None;
        self.notice = None;
    }

    /// Field checks stand in for the browser's required/email input types.
    pub fn submit(&mut self) -> AuthAction {
        if self.submitting {
            return AuthAction::None;
        }
        let email = self.email.value().trim().to_string();
        let password = self.password.value().to_string();
        if email.is_empty() || password.is_empty() {
            self.error = Some("Email and password are required".to_string());
            return AuthAction::None;
        }
        if !email.contains('@') {
            self.error = Some("Enter a valid email address".to_string());
            return AuthAction::None;
        }
        self.submitting = true;
        self.error = None;
        self.notice = None;
        AuthAction::Submit(self.mode, Credentials { email, password })
    }

    pub fn failed(&mut self, message: String) {
        self.submitting = false;
        self.error = Some(message);
    }

    pub fn confirmation_pending(&mut self) {
        self.submitting = false;
        self.notice = Some("Check your email to confirm your account".to_string());
    }

    pub fn signed_in(&mut self) {
        *self = AuthForm::default();
    }
}

pub fn render(f: &mut Frame, area: Rect, form: &AuthForm) {
    let card = centered(area, 60, 16);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(card);

    let tab = |mode: AuthMode, label: &'static str| {
        if form.mode == mode {
            Span::styled(label, Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(label, Style::default().fg(Color::DarkGray))
        }
    };
    let header = Paragraph::new(vec![
        Line::from(Span::styled("MiniTask", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(vec![tab(AuthMode::SignIn, "Sign In"), Span::raw("  |  "), tab(AuthMode::SignUp, "Sign Up")]),
    ])
    .alignment(Alignment::Center);
    f.render_widget(header, rows[0]);

    let masked = "*".repeat(form.password.value().chars().count());
    f.render_widget(field("Email address", form.email.value(), form.focus == AuthField::Email), rows[1]);
    f.render_widget(field("Password", &masked, form.focus == AuthField::Password), rows[2]);

    let submit = match (form.submitting, form.mode) {
        (true, _) => "Loading...",
        (false, AuthMode::SignIn) => "[Enter] Sign in to your account",
        (false, AuthMode::SignUp) => "[Enter] Create your account",
    };
    let submit_style = if form.submitting {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    };
    f.render_widget(
        Paragraph::new(submit).style(submit_style).alignment(Alignment::Center).block(Block::default().borders(Borders::ALL)),
        rows[3],
    );

    let mut messages = Vec::new();
    if let Some(error) = &form.error {
        messages.push(Line::from(Span::styled(error.as_str(), Style::default().fg(Color::Red))));
    }
    if let Some(notice) = &form.notice {
        messages.push(Line::from(Span::styled(notice.as_str(), Style::default().fg(Color::Green))));
    }
    messages.push(Line::from(Span::styled(
        "Tab: switch field  Ctrl-T: sign in / sign up  Esc: quit",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(Paragraph::new(messages).wrap(Wrap { trim: true }), rows[4]);
}

fn field<'a>(label: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Paragraph::new(value).block(Block::default().title(label).borders(Borders::ALL).border_style(border))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
