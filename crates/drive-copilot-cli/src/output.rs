use drive_copilot_core::{
    ChatMessage, ChatRole, DriveFile, DriveFolder, MonitorSnapshot, MonitorState, SearchResult,
};

pub fn format_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        ChatRole::User => "You",
        ChatRole::Assistant => "AI",
    };
    let mut text = format!("{}: {}", speaker, message.content);

    let sources = message.sources();
    if !sources.is_empty() {
        text.push_str("\nSources:");
        for (i, source) in sources.iter().enumerate() {
            text.push_str(&format!("\n  [{}] {}", i + 1, format_source(source)));
        }
    }
    text
}

pub fn format_source(source: &SearchResult) -> String {
    let mut text = format!(
        "{} ({}) {:.0}% - {}",
        source.file.name,
        source.file.path,
        source.relevance_score * 100.0,
        source.snippet
    );
    if let Some(link) = &source.file.web_view_link {
        text.push_str(&format!("\n      {}", link));
    }
    text
}

pub fn format_ingestion(snapshot: &MonitorSnapshot) -> String {
    let status = snapshot.status.as_ref();
    let mut text = match snapshot.state {
        MonitorState::Idle => "Ingestion: not started".to_string(),
        MonitorState::Polling => match (status, snapshot.progress_percent()) {
            (Some(status), Some(percent)) => format!(
                "Ingesting files... {} / {} ({:.0}%)",
                status.processed_files, status.total_files, percent
            ),
            _ => "Ingesting files... (counting files)".to_string(),
        },
        MonitorState::Complete => format!(
            "Ingestion complete: processed {} files",
            status.map_or(0, |s| s.processed_files)
        ),
        MonitorState::Failed => format!(
            "Ingestion error: {}",
            snapshot.job_error().unwrap_or("unknown error")
        ),
    };

    if snapshot.state == MonitorState::Polling {
        if let Some(current) = status.and_then(|s| s.current_file.as_deref()) {
            text.push_str(&format!("\n  Processing: {}", current));
        }
    }
    if let Some(err) = &snapshot.fetch_error {
        text.push_str(&format!("\n  (status check failed: {})", err));
    }
    text
}

pub fn format_folder(folder: &DriveFolder) -> String {
    format!("{} ({} files)  [{}]", folder.name, folder.file_count, folder.id)
}

pub fn format_file(file: &DriveFile) -> String {
    format!("{}  {}  [{}]", file.name, file.path, file.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drive_copilot_core::IngestionStatus;

    fn snapshot(state: MonitorState, status: IngestionStatus) -> MonitorSnapshot {
        MonitorSnapshot {
            state,
            status: Some(status),
            fetch_error: None,
        }
    }

    #[test]
    fn test_progress_line() {
        let text = format_ingestion(&snapshot(
            MonitorState::Polling,
            IngestionStatus {
                is_ingesting: true,
                total_files: 4,
                processed_files: 1,
                current_file: Some("Plan.docx".to_string()),
                error: None,
            },
        ));
        assert_eq!(text, "Ingesting files... 1 / 4 (25%)\n  Processing: Plan.docx");
    }

    #[test]
    fn test_indeterminate_progress_line() {
        let text = format_ingestion(&snapshot(
            MonitorState::Polling,
            IngestionStatus {
                is_ingesting: true,
                ..Default::default()
            },
        ));
        assert_eq!(text, "Ingesting files... (counting files)");
    }

    #[test]
    fn test_failed_line_shows_server_error() {
        let text = format_ingestion(&snapshot(
            MonitorState::Failed,
            IngestionStatus {
                error: Some("quota exceeded".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(text, "Ingestion error: quota exceeded");
    }

    #[test]
    fn test_error_notice_has_no_sources_block() {
        let message = ChatMessage::assistant_notice("Sorry");
        assert_eq!(format_message(&message), "AI: Sorry");
    }
}
