use crate::state::DriveFile;

/// Folder/file scope applied to search and chat requests.
///
/// A file selection only means something inside a selected folder, so choosing
/// any folder (including "all folders") clears it. Setting a file without a
/// folder is not refused here; callers hide the file picker until a folder is
/// chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFilter {
    folder_id: Option<String>,
    file_id: Option<String>,
}

impl ContextFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a folder, or `None` for all folders. Always clears the file.
    pub fn set_folder(&mut self, folder_id: Option<String>) {
        self.folder_id = folder_id.filter(|id| !id.trim().is_empty());
        self.file_id = None;
    }

    pub fn set_file(&mut self, file_id: Option<String>) {
        self.file_id = file_id.filter(|id| !id.trim().is_empty());
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref()
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    /// Whether the file picker should be offered
    pub fn can_select_file(&self) -> bool {
        self.folder_id.is_some()
    }

    pub fn is_scoped(&self) -> bool {
        self.folder_id.is_some() || self.file_id.is_some()
    }
}

/// Files whose parent relation includes `folder_id`
pub fn files_in_folder<'a>(files: &'a [DriveFile], folder_id: &str) -> Vec<&'a DriveFile> {
    files
        .iter()
        .filter(|file| file.parents.iter().any(|parent| parent == folder_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, path: &str, parents: &[&str]) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: format!("{}.pdf", id),
            mime_type: "application/pdf".to_string(),
            path: path.to_string(),
            modified_time: "2024-01-01T00:00:00Z".to_string(),
            size: None,
            web_view_link: None,
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_set_folder_clears_file() {
        let mut filter = ContextFilter::new();
        filter.set_folder(Some("f1".to_string()));
        filter.set_file(Some("doc".to_string()));
        assert_eq!(filter.file_id(), Some("doc"));

        filter.set_folder(Some("f2".to_string()));
        assert_eq!(filter.folder_id(), Some("f2"));
        assert_eq!(filter.file_id(), None);
    }

    #[test]
    fn test_all_folders_clears_file() {
        let mut filter = ContextFilter::new();
        filter.set_folder(Some("f1".to_string()));
        filter.set_file(Some("doc".to_string()));

        filter.set_folder(None);
        assert_eq!(filter, ContextFilter::default());
        assert!(!filter.can_select_file());
    }

    #[test]
    fn test_file_without_folder_is_allowed() {
        let mut filter = ContextFilter::new();
        filter.set_file(Some("doc".to_string()));
        assert_eq!(filter.file_id(), Some("doc"));
        assert!(filter.is_scoped());
        assert!(!filter.can_select_file());
    }

    #[test]
    fn test_blank_ids_mean_none() {
        let mut filter = ContextFilter::new();
        filter.set_folder(Some(String::new()));
        filter.set_file(Some("  ".to_string()));
        assert!(!filter.is_scoped());
    }

    #[test]
    fn test_set_folder_always_clears_file_across_sequences() {
        // Walk every sequence of four operations over a small alphabet
        let ops: [fn(&mut ContextFilter) -> bool; 5] = [
            |f| {
                f.set_folder(Some("a".to_string()));
                true
            },
            |f| {
                f.set_folder(Some("b".to_string()));
                true
            },
            |f| {
                f.set_folder(None);
                true
            },
            |f| {
                f.set_file(Some("x".to_string()));
                false
            },
            |f| {
                f.set_file(None);
                false
            },
        ];

        for seq in 0..ops.len().pow(4) {
            let mut filter = ContextFilter::new();
            let mut n = seq;
            for _ in 0..4 {
                let op = ops[n % ops.len()];
                n /= ops.len();
                if op(&mut filter) {
                    assert_eq!(filter.file_id(), None, "sequence {}", seq);
                }
            }
        }
    }

    #[test]
    fn test_files_in_folder_uses_parent_relation() {
        let files = vec![
            file("a", "/Work/a.pdf", &["work"]),
            file("b", "/Personal/work-notes/b.pdf", &["personal"]),
            file("c", "/Shared/c.pdf", &["work", "shared"]),
        ];

        let ids: Vec<&str> = files_in_folder(&files, "work")
            .into_iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(files_in_folder(&files, "missing").is_empty());
    }
}
