use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::client::{AddDirectory, AddSource, ClientError, ProjectClient, UpdateSource};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{Events, SyncEvent};
use crate::paths::{DirectoryPathIndex, PathIndexError};
use crate::placeholder::PlaceholderResolver;
use crate::project::{ProjectSnapshot, RemoteBranch};
use crate::sources::{common_directory, export_pattern, find_sources, remote_source_path};

/// Flags for uploading sources.
#[derive(Debug, Clone)]
pub struct UploadSourcesOptions {
    pub branch: Option<String>,
    /// Update sources that already exist remotely instead of skipping them.
    pub auto_update: bool,
    /// Attempts after a concurrent directory creation is reported.
    pub directory_attempts: u32,
    pub directory_retry_delay: Duration,
}

impl Default for UploadSourcesOptions {
    fn default() -> Self {
        Self {
            branch: None,
            auto_update: true,
            directory_attempts: 5,
            directory_retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}

/// Remote directory and file ids by path within one branch scope.
#[derive(Debug, Clone, Default)]
pub(crate) struct RemoteTree {
    branch_id: Option<u64>,
    directories: HashMap<String, u64>,
    files: HashMap<String, u64>,
}

impl RemoteTree {
    pub(crate) fn load(project: &ProjectSnapshot, branch_id: Option<u64>) -> Result<Self, PathIndexError> {
        let index = DirectoryPathIndex::build(&project.directories_in_branch(branch_id))?;

        let mut files = HashMap::new();
        for file in project.files_in_branch(branch_id) {
            files.insert(index.file_path(file)?, file.id);
        }

        Ok(Self {
            branch_id,
            directories: index
                .directories()
                .map(|(path, id)| (path.to_owned(), id))
                .collect(),
            files,
        })
    }

    pub(crate) fn file(&self, path: &str) -> Option<u64> {
        self.files.get(path).copied()
    }

    fn directory(&self, path: &str) -> Option<u64> {
        self.directories.get(path).copied()
    }
}

/// Upload every matched local source, creating the branch and remote
/// directories they need.
pub async fn upload_sources<C: ProjectClient + ?Sized>(
    client: &C,
    config: &SyncConfig,
    options: &UploadSourcesOptions,
    events: &Events,
) -> Result<UploadReport, SyncError> {
    events.emit(SyncEvent::FetchingProject);
    let project = client.fetch_project().await?;

    let branch = match &options.branch {
        Some(name) => Some(ensure_branch(client, &project, name, events).await?),
        None => None,
    };
    let branch_id = branch.as_ref().map(|b| b.id);

    let resolver = PlaceholderResolver::new(project.project_languages(), &config.base_path);
    let mut tree = RemoteTree::load(&project, branch_id)?;
    let mut report = UploadReport::default();

    for entry in &config.files {
        let mapping = entry.merged_mapping(project.language_mapping.as_ref());
        let sources = find_sources(&config.base_path, entry, &resolver, &mapping)?;
        let common = if config.preserve_hierarchy {
            String::new()
        } else {
            common_directory(&sources)
        };

        for relative in &sources {
            let remote_path = remote_source_path(relative, &common, entry.dest.as_deref(), &resolver);
            let (parent, name) = match remote_path.rsplit_once('/') {
                Some((parent, name)) => (parent, name),
                None => ("", remote_path.as_str()),
            };
            let pattern = export_pattern(&entry.translation, &entry.source, relative);

            if let Some(file_id) = tree.file(&remote_path) {
                if !options.auto_update {
                    events.emit(SyncEvent::SourceSkipped(remote_path.clone()));
                    report.skipped.push(remote_path);
                    continue;
                }
                let storage_id = upload_file(client, &config.base_path, relative, name).await?;
                client
                    .update_source(
                        file_id,
                        &UpdateSource {
                            storage_id,
                            export_pattern: pattern,
                        },
                    )
                    .await?;
                events.emit(SyncEvent::SourceUpdated(remote_path.clone()));
                report.updated.push(remote_path);
            } else {
                let directory_id =
                    ensure_directories(client, &mut tree, parent, options, events).await?;
                let storage_id = upload_file(client, &config.base_path, relative, name).await?;
                let file = client
                    .add_source(&AddSource {
                        storage_id,
                        name: name.to_owned(),
                        directory_id,
                        branch_id: if directory_id.is_none() { branch_id } else { None },
                        export_pattern: pattern,
                    })
                    .await?;
                tree.files.insert(remote_path.clone(), file.id);
                events.emit(SyncEvent::SourceUploaded(remote_path.clone()));
                report.uploaded.push(remote_path);
            }
        }
    }

    Ok(report)
}

/// Find the named branch, creating it when missing.
async fn ensure_branch<C: ProjectClient + ?Sized>(
    client: &C,
    project: &ProjectSnapshot,
    name: &str,
    events: &Events,
) -> Result<RemoteBranch, SyncError> {
    if let Some(branch) = project.find_branch(name) {
        return Ok(branch.clone());
    }
    if !project.is_manager() {
        return Err(SyncError::AccessDenied);
    }

    match client.add_branch(name).await {
        Ok(branch) => {
            events.emit(SyncEvent::BranchCreated(name.to_owned()));
            Ok(branch)
        }
        Err(ClientError::AlreadyExists) => {
            tracing::info!(branch = name, "branch already exists, refreshing project");
            client
                .fetch_project()
                .await?
                .find_branch(name)
                .cloned()
                .ok_or_else(|| SyncError::BranchNotFound(name.to_owned()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Create each missing segment of `parent`, returning the deepest directory id.
async fn ensure_directories<C: ProjectClient + ?Sized>(
    client: &C,
    tree: &mut RemoteTree,
    parent: &str,
    options: &UploadSourcesOptions,
    events: &Events,
) -> Result<Option<u64>, SyncError> {
    let mut current: Option<u64> = None;
    let mut path = String::new();

    for segment in parent.split('/').filter(|s| !s.is_empty()) {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(segment);

        current = Some(match tree.directory(&path) {
            Some(id) => id,
            None => {
                let request = AddDirectory {
                    name: segment.to_owned(),
                    directory_id: current,
                    branch_id: if current.is_none() { tree.branch_id } else { None },
                };
                create_directory(client, tree, &request, &path, options, events).await?
            }
        });
    }

    Ok(current)
}

async fn create_directory<C: ProjectClient + ?Sized>(
    client: &C,
    tree: &mut RemoteTree,
    request: &AddDirectory,
    path: &str,
    options: &UploadSourcesOptions,
    events: &Events,
) -> Result<u64, SyncError> {
    let mut attempt = 0;
    loop {
        let error = match client.add_directory(request).await {
            Ok(directory) => {
                tree.directories.insert(path.to_owned(), directory.id);
                events.emit(SyncEvent::DirectoryCreated(path.to_owned()));
                return Ok(directory.id);
            }
            Err(e) => e,
        };

        let retrying = match error {
            ClientError::AlreadyExists => {
                tracing::info!(directory = path, "directory already exists, refreshing project");
                false
            }
            ClientError::WaitAndRetry if attempt < options.directory_attempts => {
                attempt += 1;
                tracing::info!(directory = path, attempt, "directory is being created elsewhere, waiting");
                tokio::time::sleep(options.directory_retry_delay).await;
                true
            }
            other => return Err(other.into()),
        };

        *tree = RemoteTree::load(&client.fetch_project().await?, tree.branch_id)?;
        if let Some(id) = tree.directory(path) {
            return Ok(id);
        }
        if !retrying {
            return Err(ClientError::AlreadyExists.into());
        }
    }
}

async fn upload_file<C: ProjectClient + ?Sized>(
    client: &C,
    base_path: &Path,
    relative: &str,
    storage_name: &str,
) -> Result<u64, SyncError> {
    let path = base_path.join(relative);
    let content = std::fs::read(&path).map_err(|e| SyncError::io(path.display(), e))?;
    Ok(client.upload_storage(storage_name, content).await?)
}
