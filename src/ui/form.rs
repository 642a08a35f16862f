use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::task::Task;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true when the key edited the text. Control and Alt chords are
    /// shortcuts, never text.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(_) if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => false,
            KeyCode::Char(c) => {
                self.value.push(c);
                true
            }
            KeyCode::Backspace => self.value.pop().is_some(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Continue,
    Submit,
    Cancel,
}

/// Title and description inputs shared by the column's add form and the
/// card's edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: TextInput,
    pub description: TextInput,
    pub focus: TaskField,
    seed: (String, String),
}

impl TaskForm {
    pub fn empty() -> Self {
        Self::seeded(String::new(), String::new())
    }

    pub fn for_task(task: &Task) -> Self {
        Self::seeded(task.title.clone(), task.description.clone().unwrap_or_default())
    }

    fn seeded(title: String, description: String) -> Self {
        Self {
            title: TextInput::with_value(title.clone()),
            description: TextInput::with_value(description.clone()),
            focus: TaskField::Title,
            seed: (title, description),
        }
    }

    /// Puts the inputs back to what the form was opened with.
    pub fn reset(&mut self) {
        self.title = TextInput::with_value(self.seed.0.clone());
        self.description = TextInput::with_value(self.seed.1.clone());
        self.focus = TaskField::Title;
    }

    /// Enter submits only when the title has non-blank text.
    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        match key.code {
            KeyCode::Esc => {
                self.reset();
                FormAction::Cancel
            }
            KeyCode::Enter if !self.title.value().trim().is_empty() => FormAction::Submit,
            KeyCode::Enter => FormAction::Continue,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    TaskField::Title => TaskField::Description,
                    TaskField::Description => TaskField::Title,
                };
                FormAction::Continue
            }
            _ => {
                match self.focus {
                    TaskField::Title => self.title.handle_key(key),
                    TaskField::Description => self.description.handle_key(key),
                };
                FormAction::Continue
            }
        }
    }
}
