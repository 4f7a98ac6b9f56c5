use std::io::Write;
use std::path::Path;

use locsync::{
    Access, AddDirectory, AddSource, Build, BuildRequest, ClientError, ProjectClient,
    ProjectSnapshot, RemoteBranch, RemoteDirectory, RemoteFile, UpdateSource, UploadTranslation,
};
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::classify::{
    BRANCH_RULES, DIRECTORY_RULES, RawFailure, RequestError, RetryPolicy, resolve,
    with_storage_retry,
};
use crate::model::{
    AddBranchBody, AddDirectoryBody, AddFileBody, BranchResponse, BuildBody, BuildResponse,
    DirectoryResponse, DownloadLinkResponse, Envelope, ExportOptions, FileResponse,
    LanguageResponse, Page, ProjectResponse, StorageResponse, UpdateFileBody,
    UploadTranslationBody,
};

const DEFAULT_API_BASE: &str = "https://api.crowdin.com/api/v2";
const USER_AGENT: &str = concat!("locsync/", env!("CARGO_PKG_VERSION"));

/// Largest page the list endpoints accept.
pub const PAGE_LIMIT: usize = 500;

/// Connection settings for one Crowdin project.
#[derive(Debug, Clone)]
pub struct CrowdinClientConfig {
    pub project_id: u64,
    pub token: String,
    /// API root including `/api/v2`; defaults to crowdin.com.
    pub api_base_url: Option<String>,
    pub retry: RetryPolicy,
}

impl CrowdinClientConfig {
    pub fn new(project_id: u64, token: impl Into<String>) -> Self {
        Self {
            project_id,
            token: token.into(),
            api_base_url: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// [`ProjectClient`] over the Crowdin v2 REST API.
pub struct CrowdinClient {
    config: CrowdinClientConfig,
    client: reqwest::Client,
}

impl CrowdinClient {
    pub fn new(config: CrowdinClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    fn project_url(&self, path: &str) -> String {
        format!("{}/projects/{}{}", self.api_base(), self.config.project_id, path)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        tracing::debug!(%method, url, "crowdin request");
        self.client
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.config.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RequestError> {
        let response = request
            .send()
            .await
            .map_err(|e| RequestError::Transport(ClientError::Network(e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "crowdin request rejected");
        Err(RequestError::Rejected(RawFailure::from_body(status.as_u16(), &body)))
    }

    /// Send and unwrap the `data` envelope.
    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, RequestError> {
        let response = self.send(request).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| RequestError::Transport(ClientError::Parse(e.to_string())))?;
        Ok(envelope.data)
    }

    /// Fetch every page of a list endpoint.
    async fn list_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let page_url = format!("{url}?limit={PAGE_LIMIT}&offset={offset}");
            let response = self
                .send(self.request(Method::GET, &page_url))
                .await
                .map_err(|e| resolve(&[], e, None))?;
            let page: Page<T> = response
                .json()
                .await
                .map_err(|e| ClientError::Parse(e.to_string()))?;

            let count = page.data.len();
            items.extend(page.data.into_iter().map(|entry| entry.data));
            if count < PAGE_LIMIT {
                return Ok(items);
            }
            offset += count;
        }
    }
}

#[async_trait::async_trait]
impl ProjectClient for CrowdinClient {
    async fn fetch_project(&self) -> Result<ProjectSnapshot, ClientError> {
        let project: ProjectResponse = self
            .call(self.request(Method::GET, &self.project_url("")))
            .await
            .map_err(|e| resolve(&[], e, None))?;

        let languages: Vec<LanguageResponse> =
            self.list_all(&format!("{}/languages", self.api_base())).await?;
        let branches: Vec<BranchResponse> = self.list_all(&self.project_url("/branches")).await?;
        let directories: Vec<DirectoryResponse> =
            self.list_all(&self.project_url("/directories")).await?;
        let files: Vec<FileResponse> = self.list_all(&self.project_url("/files")).await?;

        tracing::info!(
            project = project.id,
            branches = branches.len(),
            directories = directories.len(),
            files = files.len(),
            "fetched project"
        );

        Ok(ProjectSnapshot {
            id: project.id,
            access: if project.is_manager() {
                Access::Manager
            } else {
                Access::Translator
            },
            language_mapping: project.mapping(),
            source_language_id: project.source_language_id,
            target_language_ids: project.target_language_ids,
            supported_languages: languages.into_iter().map(Into::into).collect(),
            branches: branches.into_iter().map(Into::into).collect(),
            directories: directories.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        })
    }

    async fn add_branch(&self, name: &str) -> Result<RemoteBranch, ClientError> {
        let request = self
            .request(Method::POST, &self.project_url("/branches"))
            .json(&AddBranchBody { name });
        let branch: BranchResponse = self
            .call(request)
            .await
            .map_err(|e| resolve(BRANCH_RULES, e, None))?;
        Ok(branch.into())
    }

    async fn add_directory(&self, request: &AddDirectory) -> Result<RemoteDirectory, ClientError> {
        let body = AddDirectoryBody {
            name: &request.name,
            directory_id: request.directory_id,
            branch_id: request.branch_id,
        };
        let directory: DirectoryResponse = self
            .call(self.request(Method::POST, &self.project_url("/directories")).json(&body))
            .await
            .map_err(|e| resolve(DIRECTORY_RULES, e, None))?;
        Ok(directory.into())
    }

    async fn upload_storage(&self, file_name: &str, content: Vec<u8>) -> Result<u64, ClientError> {
        let request = self
            .request(Method::POST, &format!("{}/storages", self.api_base()))
            .header("Crowdin-API-FileName", urlencoding::encode(file_name).into_owned())
            .header("Content-Type", "application/octet-stream")
            .body(content);
        let storage: StorageResponse = self
            .call(request)
            .await
            .map_err(|e| resolve(&[], e, None))?;
        Ok(storage.id)
    }

    async fn add_source(&self, request: &AddSource) -> Result<RemoteFile, ClientError> {
        let url = self.project_url("/files");
        let body = AddFileBody {
            storage_id: request.storage_id,
            name: &request.name,
            directory_id: request.directory_id,
            branch_id: request.branch_id,
            export_options: ExportOptions {
                export_pattern: Some(request.export_pattern.clone()),
            },
        };
        let (url, body) = (&url, &body);

        let file: FileResponse = with_storage_retry(self.config.retry, request.storage_id, move || {
            self.call(self.request(Method::POST, url).json(body))
        })
        .await?;
        Ok(file.into())
    }

    async fn update_source(
        &self,
        file_id: u64,
        request: &UpdateSource,
    ) -> Result<RemoteFile, ClientError> {
        let url = self.project_url(&format!("/files/{file_id}"));
        let body = UpdateFileBody {
            storage_id: request.storage_id,
            export_options: ExportOptions {
                export_pattern: Some(request.export_pattern.clone()),
            },
        };
        let (url, body) = (&url, &body);

        let file: FileResponse = with_storage_retry(self.config.retry, request.storage_id, move || {
            self.call(self.request(Method::PUT, url).json(body))
        })
        .await?;
        Ok(file.into())
    }

    async fn upload_translation(
        &self,
        language_id: &str,
        request: &UploadTranslation,
    ) -> Result<(), ClientError> {
        let url = self.project_url(&format!("/translations/{language_id}"));
        let body = UploadTranslationBody {
            storage_id: request.storage_id,
            file_id: request.file_id,
            import_eq_suggestions: request.import_eq_suggestions,
            auto_approve_imported: request.auto_approve_imported,
        };
        let (url, body) = (&url, &body);

        with_storage_retry(self.config.retry, request.storage_id, move || {
            self.call::<serde_json::Value>(self.request(Method::POST, url).json(body))
        })
        .await?;
        Ok(())
    }

    async fn start_build(&self, request: &BuildRequest) -> Result<Build, ClientError> {
        let body = BuildBody::from(request);
        let build: BuildResponse = self
            .call(
                self.request(Method::POST, &self.project_url("/translations/builds"))
                    .json(&body),
            )
            .await
            .map_err(|e| resolve(&[], e, None))?;
        Ok(build.into())
    }

    async fn check_build(&self, build_id: u64) -> Result<Build, ClientError> {
        let url = self.project_url(&format!("/translations/builds/{build_id}"));
        let build: BuildResponse = self
            .call(self.request(Method::GET, &url))
            .await
            .map_err(|e| resolve(&[], e, None))?;
        Ok(build.into())
    }

    async fn download_url(&self, build_id: u64) -> Result<String, ClientError> {
        let url = self.project_url(&format!("/translations/builds/{build_id}/download"));
        let link: DownloadLinkResponse = self
            .call(self.request(Method::GET, &url))
            .await
            .map_err(|e| resolve(&[], e, None))?;
        Ok(link.url)
    }

    async fn download_to(&self, url: &str, destination: &Path) -> Result<(), ClientError> {
        // Pre-signed URL: no credentials.
        let request = self.client.get(url).header("User-Agent", USER_AGENT);
        let mut response = self
            .send(request)
            .await
            .map_err(|e| resolve(&[], e, None))?;

        let io_error = |e: std::io::Error| ClientError::Io(format!("{}: {e}", destination.display()));
        let mut file = std::fs::File::create(destination).map_err(io_error)?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?
        {
            file.write_all(&chunk).map_err(io_error)?;
            written += chunk.len();
        }
        file.flush().map_err(io_error)?;

        tracing::debug!(bytes = written, path = %destination.display(), "archive downloaded");
        Ok(())
    }
}
