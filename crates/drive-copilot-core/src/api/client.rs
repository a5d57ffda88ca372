use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::{
    AuthStatus, AuthUrl, ChatRequest, ChatResponse, DriveFile, DriveFolder, IngestionStatus,
    SearchRequest, SearchResult, StartIngestionResponse,
};

/// FastAPI puts the reason for a failure under `detail`
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Typed client for the Drive Copilot REST API.
///
/// No retries and no caching: every method is one request and surfaces the raw
/// failure. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn auth_url(&self) -> ApiResult<AuthUrl> {
        self.get("/auth/google").await
    }

    pub async fn auth_status(&self) -> ApiResult<AuthStatus> {
        self.get("/auth/status").await
    }

    pub async fn list_files(&self) -> ApiResult<Vec<DriveFile>> {
        self.get("/drive/files").await
    }

    pub async fn list_folders(&self) -> ApiResult<Vec<DriveFolder>> {
        self.get("/drive/folders").await
    }

    pub async fn get_folder(&self, folder_id: &str) -> ApiResult<DriveFolder> {
        if folder_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest("folder id is empty".to_string()));
        }

        let mut url = Url::parse(&self.url("/drive/folders"))
            .map_err(|e| ApiError::InvalidRequest(format!("bad base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest("base URL cannot take a path".to_string()))?
            .push(folder_id);

        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    /// Ask the server to (re)ingest the drive. The server refuses with a 400
    /// while a job is already running.
    pub async fn start_ingestion(&self) -> ApiResult<StartIngestionResponse> {
        let response = self.client.post(self.url("/ingest/start")).send().await?;
        Self::decode(response).await
    }

    pub async fn ingestion_status(&self) -> ApiResult<IngestionStatus> {
        self.get("/ingest/status").await
    }

    pub async fn search(&self, request: &SearchRequest) -> ApiResult<Vec<SearchResult>> {
        self.post("/search", request).await
    }

    pub async fn chat(&self, request: &ChatRequest) -> ApiResult<ChatResponse> {
        self.post("/chat", request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: error_detail(&text),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
