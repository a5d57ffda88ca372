pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod queries;
pub mod session;
pub mod state;
pub mod workspace;

// Re-export main types for convenience
pub use api::ApiClient;
pub use cache::{CachePolicy, QueryCache, QueryState, Resource, ResourceKey};
pub use config::Config;
pub use error::{ApiError, ApiResult, ConfigError, SubmitError};
pub use filter::{files_in_folder, ContextFilter};
pub use ingestion::{transition, IngestionMonitor, MonitorSnapshot, MonitorState, StartOutcome};
pub use queries::DriveQueries;
pub use session::{ChatSession, CHAT_ERROR_MESSAGE};
pub use state::{
    AuthStatus, ChatMessage, ChatRequest, ChatResponse, ChatRole, DriveFile, DriveFolder,
    IngestionStatus, SearchRequest, SearchResult, Source,
};
pub use workspace::{TickReport, Workspace};
