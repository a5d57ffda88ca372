//! UI-facing controller
//!
//! Owns the context filter and the input buffer, and wires the cache, the
//! ingestion monitor and the chat session together. A front end drives it by
//! calling `tick` from its event loop and forwarding user actions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::ApiClient;
use crate::cache::{CachePolicy, QueryCache, Resource, ResourceKey};
use crate::config::Config;
use crate::error::{ApiError, ApiResult, SubmitError};
use crate::filter::{files_in_folder, ContextFilter};
use crate::ingestion::{IngestionMonitor, MonitorSnapshot, MonitorState, StartOutcome};
use crate::queries::DriveQueries;
use crate::session::ChatSession;
use crate::state::{ChatMessage, DriveFile, DriveFolder, SearchRequest, SearchResult};

/// What changed during one tick
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    /// New auth state, when it flipped
    pub auth_changed: Option<bool>,
    pub auth_error: Option<ApiError>,
    /// Monitor state after a poll, when one was made
    pub ingestion: Option<MonitorState>,
    /// Assistant turn appended during this tick
    pub reply: Option<ChatMessage>,
}

pub struct Workspace {
    queries: DriveQueries,
    filter: ContextFilter,
    session: ChatSession,
    monitor: IngestionMonitor,
    input: String,
    search_limit: u32,
    auth_poll: Duration,
    next_auth_check: Option<Instant>,
    authenticated: Option<bool>,
}

impl Workspace {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = ApiClient::new(&config.api_base_url, config.request_timeout())?;
        Ok(Self::with_client(client, config.cache_policy(), config.search_limit))
    }

    pub fn with_client(client: ApiClient, policy: CachePolicy, search_limit: u32) -> Self {
        let queries = DriveQueries::new(client.clone(), QueryCache::new(policy));
        Self {
            monitor: IngestionMonitor::new(queries.clone()),
            session: ChatSession::new(client),
            queries,
            filter: ContextFilter::new(),
            input: String::new(),
            search_limit,
            auth_poll: policy.auth_poll,
            next_auth_check: None,
            authenticated: None,
        }
    }

    pub fn filter(&self) -> &ContextFilter {
        &self.filter
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.session.history()
    }

    pub fn queries(&self) -> &DriveQueries {
        &self.queries
    }

    pub fn ingestion(&self) -> MonitorSnapshot {
        self.monitor.snapshot()
    }

    pub fn is_authenticated(&self) -> Option<bool> {
        self.authenticated
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Whether the input control should accept a submission
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty() && !self.session.is_pending()
    }

    /// Send the input buffer as a chat turn. The buffer is cleared only when
    /// the submission is accepted.
    pub fn submit(&mut self) -> Result<(), SubmitError> {
        self.session.submit(&self.input, &self.filter)?;
        self.input.clear();
        Ok(())
    }

    /// Wait for the outstanding chat answer, if any
    pub async fn wait_for_reply(&mut self) -> Option<ChatMessage> {
        self.session.resolve().await.cloned()
    }

    /// Run whatever is due at `now`. A finished chat answer is collected
    /// first so a slow auth check or status poll cannot hold it back.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport {
            reply: self.session.poll_resolved().await.cloned(),
            ..TickReport::default()
        };

        if self.next_auth_check.map_or(true, |due| due <= now) {
            self.next_auth_check = Some(now + self.auth_poll);
            match self.refresh_auth().await {
                Ok(changed) => report.auth_changed = changed,
                Err(err) => report.auth_error = Some(err),
            }
        }

        report.ingestion = self.monitor.poll_if_due(now).await;
        report
    }

    /// Check auth now. Returns the new state if it flipped.
    pub async fn refresh_auth(&mut self) -> ApiResult<Option<bool>> {
        let status = self.queries.auth_status().await?;
        let authenticated = status.is_authenticated;
        let previous = self.authenticated.replace(authenticated);
        if previous == Some(authenticated) {
            return Ok(None);
        }

        if !authenticated {
            // Nothing gated may be refreshed or written while signed out
            self.queries.release_drive_listings(self.filter.folder_id());
        }
        tracing::info!(authenticated, "auth state changed");
        Ok(Some(authenticated))
    }

    pub async fn login_url(&self) -> ApiResult<String> {
        self.queries.auth_url().await
    }

    pub async fn folders(&self) -> ApiResult<Arc<Vec<DriveFolder>>> {
        self.queries.folders().await
    }

    pub async fn files(&self) -> ApiResult<Arc<Vec<DriveFile>>> {
        self.queries.files().await
    }

    /// Files the file picker offers: those inside the selected folder
    pub async fn files_in_selected_folder(&self) -> ApiResult<Vec<DriveFile>> {
        let Some(folder_id) = self.filter.folder_id() else {
            return Ok(Vec::new());
        };
        let files = self.queries.files().await?;
        Ok(files_in_folder(&files, folder_id).into_iter().cloned().collect())
    }

    /// Change the folder scope (`None` = all folders) and load the folder's
    /// details. The previous folder's detail is released first, so a late
    /// response for it is discarded.
    ///
    /// The scope changes even when loading the details fails; the error only
    /// means there is no detail to show.
    pub async fn select_folder(&mut self, folder_id: Option<String>) -> ApiResult<Option<Arc<DriveFolder>>> {
        if let Some(previous) = self.filter.folder_id() {
            if folder_id.as_deref() != Some(previous) {
                self.queries
                    .cache()
                    .release(&ResourceKey::Folder(previous.to_string()));
            }
        }

        self.filter.set_folder(folder_id);
        let Some(folder_id) = self.filter.folder_id().map(str::to_string) else {
            return Ok(None);
        };
        self.queries.folder(&folder_id).await.map(Some)
    }

    /// Cached detail of the selected folder
    pub fn selected_folder(&self) -> Option<Arc<DriveFolder>> {
        let folder_id = self.filter.folder_id()?;
        match self.queries.cache().peek(&ResourceKey::Folder(folder_id.to_string())) {
            Some(Resource::Folder(folder)) => Some(folder),
            _ => None,
        }
    }

    /// Narrow to one file of the selected folder (`None` = all files in it)
    pub fn select_file(&mut self, file_id: Option<String>) -> ApiResult<()> {
        if file_id.is_some() && !self.filter.can_select_file() {
            return Err(ApiError::InvalidRequest("select a folder first".to_string()));
        }
        self.filter.set_file(file_id);
        Ok(())
    }

    pub async fn search(&self, query: &str) -> ApiResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(ApiError::InvalidRequest("search query is empty".to_string()));
        }
        let request = SearchRequest {
            query: query.to_string(),
            folder_id: self.filter.folder_id().map(str::to_string),
            file_id: self.filter.file_id().map(str::to_string),
            limit: Some(self.search_limit),
        };
        self.queries.client().search(&request).await
    }

    pub async fn start_ingestion(&mut self) -> ApiResult<StartOutcome> {
        self.monitor.start().await
    }

    pub fn is_ingestion_observed(&self) -> bool {
        self.monitor.is_observed()
    }

    /// Whether the ingestion progress is on screen; polling pauses when not
    pub fn set_ingestion_observed(&mut self, observed: bool) {
        self.monitor.set_observed(observed);
    }

    /// Tear the cache down (logout). The conversation stays.
    pub fn shutdown(&mut self) {
        self.queries.cache().clear();
        self.authenticated = None;
        self.next_auth_check = None;
    }
}
