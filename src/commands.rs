//! One-shot commands that run without the terminal UI.

use anyhow::{anyhow, bail, Context};
use std::fmt::Write;

use crate::backend::Backend;
use crate::kanban_board::TaskBoard;
use crate::session::{Credentials, Session};
use crate::task::{Task, TaskStatus};

pub const PASSWORD_VAR: &str = "MINITASK_PASSWORD";

pub async fn sign_in<B: Backend + ?Sized>(backend: &B, email: &str, password: &str) -> anyhow::Result<Session> {
    let credentials = Credentials {
        email: email.to_string(),
        password: password.to_string(),
    };
    backend
        .sign_in(&credentials)
        .await
        .map_err(|err| anyhow!(err.user_message()))
        .context("signing in")
}

pub fn password_from_env() -> anyhow::Result<String> {
    std::env::var(PASSWORD_VAR).with_context(|| format!("{PASSWORD_VAR} must be set"))
}

async fn load_board<B: Backend + ?Sized>(backend: &B, session: &Session) -> anyhow::Result<TaskBoard> {
    let mut board = TaskBoard::new(session);
    board.load(backend, session).await;
    if board.load_failed() {
        bail!("could not load tasks, see the log for details");
    }
    Ok(board)
}

pub async fn list<B: Backend + ?Sized>(backend: &B, session: &Session) -> anyhow::Result<String> {
    let board = load_board(backend, session).await?;
    let mut out = String::new();
    for status in TaskStatus::ALL {
        let _ = writeln!(out, "{}:", status.title());
        for task in board.tasks_by_status(status) {
            let _ = writeln!(out, "- [#{}] {} ({})", task.id, task.title, task.created_label());
        }
    }
    Ok(out)
}

pub async fn stats<B: Backend + ?Sized>(backend: &B, session: &Session) -> anyhow::Result<String> {
    let board = load_board(backend, session).await?;
    Ok(format!(
        "Total: {}\nCompleted: {}\nProgress: {}%\n",
        board.total(),
        board.completed(),
        board.progress_percent()
    ))
}

pub async fn add<B: Backend + ?Sized>(
    backend: &B,
    session: &Session,
    title: &str,
    description: &str,
    status: TaskStatus,
) -> anyhow::Result<Task> {
    let mut board = TaskBoard::new(session);
    board.finish_load(Some(Vec::new()));
    let ticket = board.add_task(title, description, status)?;
    board.submit(backend, session, ticket).await;
    board
        .tasks()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("task was not saved, see the log for details"))
}
