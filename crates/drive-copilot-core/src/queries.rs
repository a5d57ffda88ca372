//! Typed accessors over the query cache
//!
//! Each method knows its cache key, how to fetch it, and whether it is gated
//! behind authentication. Listings are never requested while the last known
//! auth status says the user is signed out.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::cache::{QueryCache, Resource, ResourceKey};
use crate::error::{ApiError, ApiResult};
use crate::state::{AuthStatus, DriveFile, DriveFolder, IngestionStatus};

#[derive(Clone)]
pub struct DriveQueries {
    client: ApiClient,
    cache: QueryCache,
}

impl DriveQueries {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// OAuth entry point; fetched once per cache lifetime
    pub async fn auth_url(&self) -> ApiResult<String> {
        let client = self.client.clone();
        let resource = self
            .cache
            .fetch(ResourceKey::AuthUrl, move || {
                let client = client.clone();
                async move { client.auth_url().await.map(|r| Resource::AuthUrl(r.url)) }
            })
            .await?;

        match resource {
            Resource::AuthUrl(url) => Ok(url),
            other => Err(unexpected(&ResourceKey::AuthUrl, &other)),
        }
    }

    pub async fn auth_status(&self) -> ApiResult<AuthStatus> {
        let client = self.client.clone();
        let resource = self
            .cache
            .fetch(ResourceKey::AuthStatus, move || {
                let client = client.clone();
                async move { client.auth_status().await.map(Resource::AuthStatus) }
            })
            .await?;

        match resource {
            Resource::AuthStatus(status) => Ok(status),
            other => Err(unexpected(&ResourceKey::AuthStatus, &other)),
        }
    }

    /// Last observed auth status, without a request. Unknown counts as signed out.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.cache.peek(&ResourceKey::AuthStatus),
            Some(Resource::AuthStatus(AuthStatus {
                is_authenticated: true
            }))
        )
    }

    pub async fn files(&self) -> ApiResult<Arc<Vec<DriveFile>>> {
        self.require_auth()?;
        let client = self.client.clone();
        let resource = self
            .cache
            .fetch(ResourceKey::Files, move || {
                let client = client.clone();
                async move {
                    client
                        .list_files()
                        .await
                        .map(|files| Resource::Files(Arc::new(files)))
                }
            })
            .await?;

        match resource {
            Resource::Files(files) => Ok(files),
            other => Err(unexpected(&ResourceKey::Files, &other)),
        }
    }

    pub async fn folders(&self) -> ApiResult<Arc<Vec<DriveFolder>>> {
        self.require_auth()?;
        let client = self.client.clone();
        let resource = self
            .cache
            .fetch(ResourceKey::Folders, move || {
                let client = client.clone();
                async move {
                    client
                        .list_folders()
                        .await
                        .map(|folders| Resource::Folders(Arc::new(folders)))
                }
            })
            .await?;

        match resource {
            Resource::Folders(folders) => Ok(folders),
            other => Err(unexpected(&ResourceKey::Folders, &other)),
        }
    }

    pub async fn folder(&self, folder_id: &str) -> ApiResult<Arc<DriveFolder>> {
        if folder_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest("folder id is empty".to_string()));
        }
        self.require_auth()?;

        let key = ResourceKey::Folder(folder_id.to_string());
        let client = self.client.clone();
        let id = folder_id.to_string();
        let resource = self
            .cache
            .fetch(key.clone(), move || {
                let client = client.clone();
                let id = id.clone();
                async move {
                    client
                        .get_folder(&id)
                        .await
                        .map(|folder| Resource::Folder(Arc::new(folder)))
                }
            })
            .await?;

        match resource {
            Resource::Folder(folder) => Ok(folder),
            other => Err(unexpected(&key, &other)),
        }
    }

    pub async fn ingestion_status(&self) -> ApiResult<IngestionStatus> {
        let client = self.client.clone();
        let resource = self
            .cache
            .fetch(ResourceKey::IngestionStatus, move || {
                let client = client.clone();
                async move {
                    client
                        .ingestion_status()
                        .await
                        .map(Resource::IngestionStatus)
                }
            })
            .await?;

        match resource {
            Resource::IngestionStatus(status) => Ok(status),
            other => Err(unexpected(&ResourceKey::IngestionStatus, &other)),
        }
    }

    /// Drop everything gated behind authentication, including fetches in flight
    pub fn release_drive_listings(&self, selected_folder: Option<&str>) {
        self.cache.release(&ResourceKey::Files);
        self.cache.release(&ResourceKey::Folders);
        if let Some(id) = selected_folder {
            self.cache.release(&ResourceKey::Folder(id.to_string()));
        }
    }

    fn require_auth(&self) -> ApiResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::NotAuthenticated)
        }
    }
}

fn unexpected(key: &ResourceKey, resource: &Resource) -> ApiError {
    ApiError::Decode(format!("cache entry {} holds {:?}", key, resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn queries_for(server: &MockServer) -> DriveQueries {
        let client = ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap();
        DriveQueries::new(client, QueryCache::new(CachePolicy::default()))
    }

    async fn mount_auth(server: &MockServer, authenticated: bool) {
        Mock::given(method("GET"))
            .and(path("/api/auth/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "isAuthenticated": authenticated })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_listings_not_fetched_while_signed_out() {
        let server = MockServer::start().await;
        mount_auth(&server, false).await;
        Mock::given(method("GET"))
            .and(path("/api/drive/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let queries = queries_for(&server).await;
        // Unknown auth status counts as signed out
        assert_eq!(queries.files().await.unwrap_err(), ApiError::NotAuthenticated);

        assert!(!queries.auth_status().await.unwrap().is_authenticated);
        assert_eq!(queries.files().await.unwrap_err(), ApiError::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_folders_cached_after_sign_in() {
        let server = MockServer::start().await;
        mount_auth(&server, true).await;
        Mock::given(method("GET"))
            .and(path("/api/drive/folders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "f1", "name": "Work", "path": "/Work", "fileCount": 3 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server).await;
        queries.auth_status().await.unwrap();

        let first = queries.folders().await.unwrap();
        let second = queries.folders().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].file_count, 3);
    }

    #[tokio::test]
    async fn test_auth_url_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/google"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "url": "https://accounts.google.com/o/oauth2" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server).await;
        let url = queries.auth_url().await.unwrap();
        assert_eq!(url, queries.auth_url().await.unwrap());
        assert!(url.starts_with("https://accounts.google.com"));
    }

    #[tokio::test]
    async fn test_folder_detail_requires_id() {
        let server = MockServer::start().await;
        mount_auth(&server, true).await;
        let queries = queries_for(&server).await;
        queries.auth_status().await.unwrap();

        assert!(matches!(
            queries.folder("").await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_release_drive_listings_forgets_values() {
        let server = MockServer::start().await;
        mount_auth(&server, true).await;
        Mock::given(method("GET"))
            .and(path("/api/drive/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let queries = queries_for(&server).await;
        queries.auth_status().await.unwrap();
        queries.files().await.unwrap();
        assert!(queries.cache().peek(&ResourceKey::Files).is_some());

        queries.release_drive_listings(None);
        assert!(queries.cache().peek(&ResourceKey::Files).is_none());
    }
}
