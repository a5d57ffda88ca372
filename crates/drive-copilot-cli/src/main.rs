use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use drive_copilot_core::{
    ApiError, Config, MonitorState, StartOutcome, SubmitError, TickReport, Workspace,
};

mod command;
mod events;
mod output;

use command::{Command, HELP};
use events::{AppEvent, EventHandler};

#[derive(Parser)]
#[command(name = "drive-copilot")]
#[command(about = "Chat with your indexed Google Drive from the terminal")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8000/api
    #[arg(long)]
    api_url: Option<String>,
    /// Path to a config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_env(|name| std::env::var(name).ok());
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(api = %config.api_base_url, "starting");

    let mut workspace = Workspace::new(&config)?;
    println!("Drive Copilot ({}). Type /help for commands.", config.api_base_url);

    let mut events = EventHandler::new(Duration::from_millis(250));
    let mut last_progress = String::new();

    while let Some(event) = events.next().await {
        match event {
            AppEvent::Tick => {
                let report = workspace.tick(Instant::now()).await;
                print_tick(&workspace, report, &mut last_progress);
            }
            AppEvent::Line(line) => {
                if !handle_command(&mut workspace, Command::parse(&line)).await {
                    break;
                }
            }
            AppEvent::Eof => {
                // Let a question piped on stdin get its answer before exiting
                if let Some(reply) = workspace.wait_for_reply().await {
                    println!("{}", output::format_message(&reply));
                }
                break;
            }
        }
    }

    workspace.shutdown();
    Ok(())
}

fn print_tick(workspace: &Workspace, report: TickReport, last_progress: &mut String) {
    match report.auth_changed {
        Some(true) => println!("Signed in to Google Drive."),
        Some(false) => println!("Not signed in. Use /login to connect Google Drive."),
        None => {}
    }
    if let Some(err) = report.auth_error {
        tracing::warn!(error = %err, "auth check failed");
    }

    // Idle polls only look for a job started elsewhere
    if report.ingestion.is_some_and(|state| state != MonitorState::Idle) {
        let line = output::format_ingestion(&workspace.ingestion());
        if line != *last_progress {
            println!("{}", line);
            *last_progress = line;
        }
    }

    if let Some(reply) = report.reply {
        println!("{}", output::format_message(&reply));
    }
}

/// Returns false when the user asked to quit
async fn handle_command(workspace: &mut Workspace, command: Command) -> bool {
    match command {
        Command::Ask(text) => {
            workspace.set_input(text);
            match workspace.submit() {
                Ok(()) => println!("Thinking..."),
                Err(SubmitError::Pending) => println!("Still waiting for the previous answer."),
                Err(SubmitError::Empty) => {}
            }
        }
        Command::Login => match workspace.login_url().await {
            Ok(url) => println!("Open this URL to sign in:\n  {}", url),
            Err(err) => print_error(&err),
        },
        Command::Status => print_status(workspace),
        Command::Ingest => match workspace.start_ingestion().await {
            Ok(StartOutcome::Started(message)) => println!("{}", message),
            Ok(StartOutcome::AlreadyRunning(message)) => {
                println!("{} Following the running job.", message)
            }
            Err(err) => print_error(&err),
        },
        Command::Folders => match workspace.folders().await {
            Ok(folders) if folders.is_empty() => println!("No folders."),
            Ok(folders) => {
                for folder in folders.iter() {
                    println!("{}", output::format_folder(folder));
                }
            }
            Err(err) => print_error(&err),
        },
        Command::Files => {
            let files = if workspace.filter().folder_id().is_some() {
                workspace.files_in_selected_folder().await
            } else {
                workspace.files().await.map(|files| files.as_ref().clone())
            };
            match files {
                Ok(files) if files.is_empty() => println!("No files."),
                Ok(files) => {
                    for file in &files {
                        println!("{}", output::format_file(file));
                    }
                }
                Err(err) => print_error(&err),
            }
        }
        Command::Folder(folder_id) => match workspace.select_folder(folder_id).await {
            Ok(Some(folder)) => println!("Scope: {}", output::format_folder(&folder)),
            Ok(None) => println!("Scope: all folders"),
            Err(err) => {
                print_error(&err);
                if let Some(id) = workspace.filter().folder_id() {
                    println!("Scope: folder {} (details unavailable)", id);
                }
            }
        },
        Command::File(file_id) => match workspace.select_file(file_id) {
            Ok(()) => match workspace.filter().file_id() {
                Some(id) => println!("Scope: file {}", id),
                None => println!("Scope: all files in the folder"),
            },
            Err(err) => print_error(&err),
        },
        Command::Search(query) => match workspace.search(&query).await {
            Ok(results) if results.is_empty() => println!("No results."),
            Ok(results) => {
                for (i, result) in results.iter().enumerate() {
                    println!("[{}] {}", i + 1, output::format_source(result));
                }
            }
            Err(err) => print_error(&err),
        },
        Command::History => {
            for message in workspace.history() {
                println!("{}", output::format_message(message));
            }
        }
        Command::Watch(observed) => {
            workspace.set_ingestion_observed(observed);
            println!("Ingestion updates {}.", if observed { "on" } else { "off" });
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
        Command::Empty => {}
        Command::Unknown(line) => println!("Unknown command: {} (try /help)", line),
    }
    true
}

fn print_status(workspace: &Workspace) {
    let auth = match workspace.is_authenticated() {
        Some(true) => "signed in",
        Some(false) => "not signed in",
        None => "checking",
    };
    println!("Google Drive: {}", auth);
    println!("{}", output::format_ingestion(&workspace.ingestion()));
    if !workspace.is_ingestion_observed() {
        println!("Ingestion updates off (/watch on to follow)");
    }

    let filter = workspace.filter();
    if filter.is_scoped() {
        println!(
            "Scope: folder {}, file {}",
            filter.folder_id().unwrap_or("all"),
            filter.file_id().unwrap_or("all")
        );
    } else {
        println!("Scope: whole drive");
    }
    if workspace.session().is_pending() {
        println!("Waiting for an answer...");
    }
}

fn print_error(err: &ApiError) {
    match err {
        ApiError::NotAuthenticated => eprintln!("Not signed in. Use /login to connect Google Drive."),
        err => eprintln!("Error: {}", err),
    }
}
