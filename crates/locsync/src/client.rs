use std::path::Path;
use std::sync::Arc;

use crate::project::{ProjectSnapshot, RemoteBranch, RemoteDirectory, RemoteFile};

/// Remote failures, already classified at the access boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The object being created already exists; callers treat this as success.
    #[error("already exists")]
    AlreadyExists,

    /// A concurrent mutation is in progress; retry the higher-level operation.
    #[error("a concurrent operation is in progress, retry later")]
    WaitAndRetry,

    /// An uploaded storage object never became visible within the retry budget.
    #[error("storage {storage_id} was not found")]
    StorageNotReady { storage_id: u64 },

    #[error("remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Server-side translation build job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub id: u64,
    pub status: String,
    pub progress: u8,
}

impl Build {
    pub fn is_finished(&self) -> bool {
        self.status.eq_ignore_ascii_case("finished")
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("failed") || self.status.eq_ignore_ascii_case("canceled")
    }
}

/// Approval filter for exported translations. Organization projects use a
/// minimum approval count, others a boolean flag; never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFilter {
    ApprovedOnly(bool),
    MinApprovals(u32),
}

impl ExportFilter {
    pub fn for_scope(organization: bool, approved_only: bool) -> Option<Self> {
        match (organization, approved_only) {
            (_, false) => None,
            (true, true) => Some(Self::MinApprovals(1)),
            (false, true) => Some(Self::ApprovedOnly(true)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    pub target_language_ids: Option<Vec<String>>,
    pub branch_id: Option<u64>,
    pub skip_untranslated_strings: Option<bool>,
    pub skip_untranslated_files: Option<bool>,
    pub export_filter: Option<ExportFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddDirectory {
    pub name: String,
    pub directory_id: Option<u64>,
    pub branch_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSource {
    pub storage_id: u64,
    pub name: String,
    pub directory_id: Option<u64>,
    pub branch_id: Option<u64>,
    pub export_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSource {
    pub storage_id: u64,
    pub export_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTranslation {
    pub storage_id: u64,
    pub file_id: u64,
    pub import_eq_suggestions: bool,
    pub auto_approve_imported: bool,
}

/// Access to one remote localization project.
#[async_trait::async_trait]
pub trait ProjectClient: Send + Sync {
    /// Fetch the full project read model.
    async fn fetch_project(&self) -> Result<ProjectSnapshot, ClientError>;

    async fn add_branch(&self, name: &str) -> Result<RemoteBranch, ClientError>;

    async fn add_directory(&self, request: &AddDirectory) -> Result<RemoteDirectory, ClientError>;

    /// Upload raw file content, returning the storage id.
    async fn upload_storage(&self, file_name: &str, content: Vec<u8>) -> Result<u64, ClientError>;

    async fn add_source(&self, request: &AddSource) -> Result<RemoteFile, ClientError>;

    async fn update_source(
        &self,
        file_id: u64,
        request: &UpdateSource,
    ) -> Result<RemoteFile, ClientError>;

    async fn upload_translation(
        &self,
        language_id: &str,
        request: &UploadTranslation,
    ) -> Result<(), ClientError>;

    async fn start_build(&self, request: &BuildRequest) -> Result<Build, ClientError>;

    async fn check_build(&self, build_id: u64) -> Result<Build, ClientError>;

    /// Resolve a time-limited download URL for a finished build.
    async fn download_url(&self, build_id: u64) -> Result<String, ClientError>;

    /// Stream the content at `url` into `destination`.
    async fn download_to(&self, url: &str, destination: &Path) -> Result<(), ClientError>;
}

#[async_trait::async_trait]
impl<T: ProjectClient + ?Sized> ProjectClient for Arc<T> {
    async fn fetch_project(&self) -> Result<ProjectSnapshot, ClientError> {
        (**self).fetch_project().await
    }

    async fn add_branch(&self, name: &str) -> Result<RemoteBranch, ClientError> {
        (**self).add_branch(name).await
    }

    async fn add_directory(&self, request: &AddDirectory) -> Result<RemoteDirectory, ClientError> {
        (**self).add_directory(request).await
    }

    async fn upload_storage(&self, file_name: &str, content: Vec<u8>) -> Result<u64, ClientError> {
        (**self).upload_storage(file_name, content).await
    }

    async fn add_source(&self, request: &AddSource) -> Result<RemoteFile, ClientError> {
        (**self).add_source(request).await
    }

    async fn update_source(
        &self,
        file_id: u64,
        request: &UpdateSource,
    ) -> Result<RemoteFile, ClientError> {
        (**self).update_source(file_id, request).await
    }

    async fn upload_translation(
        &self,
        language_id: &str,
        request: &UploadTranslation,
    ) -> Result<(), ClientError> {
        (**self).upload_translation(language_id, request).await
    }

    async fn start_build(&self, request: &BuildRequest) -> Result<Build, ClientError> {
        (**self).start_build(request).await
    }

    async fn check_build(&self, build_id: u64) -> Result<Build, ClientError> {
        (**self).check_build(build_id).await
    }

    async fn download_url(&self, build_id: u64) -> Result<String, ClientError> {
        (**self).download_url(build_id).await
    }

    async fn download_to(&self, url: &str, destination: &Path) -> Result<(), ClientError> {
        (**self).download_to(url, destination).await
    }
}
