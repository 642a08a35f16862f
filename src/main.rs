mod app;
mod backend;
mod commands;
mod config;
mod error;
mod kanban_board;
mod logging;
mod session;
mod supabase;
mod sync;
mod task;
mod ui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, path::PathBuf, sync::Arc};
use tracing::info;

use crate::app::App;
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::supabase::SupabaseBackend;
use crate::sync::Dispatcher;
use crate::task::TaskStatus;

#[derive(Debug, Parser)]
#[command(name = "minitask", version, about = "Terminal kanban board backed by a hosted task table")]
struct Cli {
    /// Config file to read.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level, overriding the config file.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default config file.
    Init,
    /// Print the board, column by column. Reads the password from MINITASK_PASSWORD.
    List {
        #[arg(long)]
        email: String,
    },
    /// Print task totals and progress.
    Stats {
        #[arg(long)]
        email: String,
    },
    /// Add a task without opening the board.
    Add {
        #[arg(long)]
        email: String,
        /// todo, in_progress or done
        #[arg(long, default_value = "todo")]
        status: TaskStatus,
        title: String,
        #[arg(default_value = "")]
        description: String,
    },
}

fn run_command(runtime: &tokio::runtime::Runtime, backend: &SupabaseBackend, command: Command) -> anyhow::Result<()> {
    runtime.block_on(async {
        match command {
            Command::Init => Ok(()),
            Command::List { email } => {
                let session = commands::sign_in(backend, &email, &commands::password_from_env()?).await?;
                print!("{}", commands::list(backend, &session).await?);
                Ok(())
            }
            Command::Stats { email } => {
                let session = commands::sign_in(backend, &email, &commands::password_from_env()?).await?;
                print!("{}", commands::stats(backend, &session).await?);
                Ok(())
            }
            Command::Add {
                email,
                status,
                title,
                description,
            } => {
                let session = commands::sign_in(backend, &email, &commands::password_from_env()?).await?;
                let task = commands::add(backend, &session, &title, &description, status).await?;
                println!("Added [#{}] {} to {}", task.id, task.title, task.status.title());
                Ok(())
            }
        }
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Init) = cli.command {
        if Config::init(&cli.config)? {
            println!("Wrote {}", cli.config.display());
        } else {
            println!("{} already exists.", cli.config.display());
        }
        return Ok(());
    }

    let mut config = Config::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.validate()?;
    logging::init(&config.log_level, &config.log_file).context("opening log file")?;

    let runtime = tokio::runtime::Runtime::new()?;
    let backend = Arc::new(SupabaseBackend::new(&config.supabase_url, &config.supabase_anon_key));
    if let Some(command) = cli.command {
        return run_command(&runtime, &backend, command);
    }
    let (dispatcher, mut events) = Dispatcher::new(runtime.handle().clone(), backend);
    let mut app = App::new(dispatcher);
    info!(url = %config.supabase_url, "starting minitask");

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, &mut app, &mut events);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(session) = app.session.take() {
        info!(user = %session.user.id, "leaving with an open session");
    }
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    result.context("terminal UI failed")
}
