/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Login,
    Status,
    Ingest,
    Folders,
    Files,
    /// `None` selects all folders
    Folder(Option<String>),
    /// `None` selects all files in the folder
    File(Option<String>),
    Search(String),
    History,
    Watch(bool),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name {
            "login" => Command::Login,
            "status" => Command::Status,
            "ingest" => Command::Ingest,
            "folders" => Command::Folders,
            "files" => Command::Files,
            "folder" => Command::Folder(scope_arg(arg)),
            "file" => Command::File(scope_arg(arg)),
            "search" if !arg.is_empty() => Command::Search(arg.to_string()),
            "history" => Command::History,
            "watch" => match arg {
                "on" => Command::Watch(true),
                "off" => Command::Watch(false),
                _ => Command::Unknown(line.to_string()),
            },
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

fn scope_arg(arg: &str) -> Option<String> {
    match arg {
        "" | "all" => None,
        id => Some(id.to_string()),
    }
}

pub const HELP: &str = "\
Type a question to chat with your Drive.
  /login             print the Google sign-in URL
  /status            show sign-in and ingestion status
  /ingest            start ingesting your Drive
  /folders, /files   list folders / files in the selected folder
  /folder <id|all>   scope chat and search to a folder
  /file <id|all>     scope to one file of the selected folder
  /search <query>    search indexed documents
  /history           replay the conversation
  /watch on|off      follow ingestion progress
  /quit";
