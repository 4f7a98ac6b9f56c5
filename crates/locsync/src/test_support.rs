use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::client::{
    AddDirectory, AddSource, Build, BuildRequest, ClientError, ProjectClient, UpdateSource,
    UploadTranslation,
};
use crate::language::{Language, LanguageMapping};
use crate::project::{Access, ProjectSnapshot, RemoteBranch, RemoteDirectory, RemoteFile};

/// A language whose codes derive from `id` and `locale`.
pub fn language(id: &str, locale: &str) -> Language {
    Language {
        id: id.to_owned(),
        name: format!("Language {id}"),
        two_letters_code: id.to_owned(),
        three_letters_code: format!("{id}x"),
        locale: locale.to_owned(),
        android_code: locale.replace('-', "-r"),
        osx_code: format!("{id}.lproj"),
        osx_locale: locale.replace('-', "_"),
    }
}

pub fn build(id: u64, status: &str, progress: u8) -> Build {
    Build {
        id,
        status: status.to_owned(),
        progress,
    }
}

/// In-memory ZIP archive with the given `(path, content)` entries.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, content) in entries {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Builder for project snapshots used in tests.
#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    project: ProjectSnapshot,
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            project: ProjectSnapshot {
                id: 1,
                access: Access::Manager,
                source_language_id: "en".to_owned(),
                target_language_ids: Vec::new(),
                supported_languages: Vec::new(),
                language_mapping: None,
                branches: Vec::new(),
                directories: Vec::new(),
                files: Vec::new(),
            },
        }
    }

    pub fn access(mut self, access: Access) -> Self {
        self.project.access = access;
        self
    }

    pub fn supported(mut self, languages: Vec<Language>) -> Self {
        self.project.supported_languages = languages;
        self
    }

    pub fn targets(mut self, ids: &[&str]) -> Self {
        self.project.target_language_ids = ids.iter().map(|id| (*id).to_owned()).collect();
        self
    }

    /// Languages that are both supported and targeted.
    pub fn languages(self, languages: Vec<Language>) -> Self {
        let ids: Vec<String> = languages.iter().map(|l| l.id.clone()).collect();
        let mut builder = self.supported(languages);
        builder.project.target_language_ids = ids;
        builder
    }

    pub fn mapping(mut self, mapping: LanguageMapping) -> Self {
        self.project.language_mapping = Some(mapping);
        self
    }

    pub fn branch(mut self, id: u64, name: &str) -> Self {
        self.project.branches.push(RemoteBranch {
            id,
            name: name.to_owned(),
        });
        self
    }

    pub fn directory(
        mut self,
        id: u64,
        name: &str,
        directory_id: Option<u64>,
        branch_id: Option<u64>,
    ) -> Self {
        self.project.directories.push(RemoteDirectory {
            id,
            name: name.to_owned(),
            directory_id,
            branch_id,
        });
        self
    }

    pub fn file(
        mut self,
        id: u64,
        name: &str,
        directory_id: Option<u64>,
        branch_id: Option<u64>,
    ) -> Self {
        self.project.files.push(RemoteFile {
            id,
            name: name.to_owned(),
            directory_id,
            branch_id,
            export_pattern: None,
        });
        self
    }

    pub fn file_with_pattern(
        mut self,
        id: u64,
        name: &str,
        directory_id: Option<u64>,
        branch_id: Option<u64>,
        export_pattern: &str,
    ) -> Self {
        self.project.files.push(RemoteFile {
            id,
            name: name.to_owned(),
            directory_id,
            branch_id,
            export_pattern: Some(export_pattern.to_owned()),
        });
        self
    }

    pub fn build(self) -> ProjectSnapshot {
        self.project
    }
}

/// Remote operations, used to script failures on a [`FakeClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchProject,
    AddBranch,
    AddDirectory,
    UploadStorage,
    AddSource,
    UpdateSource,
    UploadTranslation,
    StartBuild,
    CheckBuild,
    DownloadUrl,
    DownloadTo,
}

/// A recorded call against a [`FakeClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchProject,
    AddBranch(String),
    AddDirectory(AddDirectory),
    UploadStorage { file_name: String, content: Vec<u8> },
    AddSource(AddSource),
    UpdateSource { file_id: u64, request: UpdateSource },
    UploadTranslation { language_id: String, request: UploadTranslation },
    StartBuild(BuildRequest),
    CheckBuild(u64),
    DownloadUrl(u64),
    DownloadTo(String),
}

#[derive(Debug)]
struct FakeState {
    project: ProjectSnapshot,
    snapshots: VecDeque<ProjectSnapshot>,
    calls: Vec<Call>,
    builds: VecDeque<Build>,
    archive: Vec<u8>,
    failures: HashMap<Operation, VecDeque<ClientError>>,
    next_storage_id: u64,
    next_file_id: u64,
    next_id: u64,
}

/// In-memory project client for testing.
///
/// Mutations are applied to the held project, so a later `fetch_project`
/// sees them. Builds follow a script: `start_build` returns the first entry
/// and each `check_build` advances, repeating the last one.
#[derive(Debug)]
pub struct FakeClient {
    state: Mutex<FakeState>,
}

impl FakeClient {
    pub fn new(project: ProjectSnapshot) -> Self {
        Self {
            state: Mutex::new(FakeState {
                project,
                snapshots: VecDeque::new(),
                calls: Vec::new(),
                builds: VecDeque::new(),
                archive: Vec::new(),
                failures: HashMap::new(),
                next_storage_id: 1,
                next_file_id: 1001,
                next_id: 201,
            }),
        }
    }

    pub fn with_builds(self, builds: Vec<Build>) -> Self {
        self.state().builds = builds.into();
        self
    }

    pub fn with_archive(self, archive: Vec<u8>) -> Self {
        self.state().archive = archive;
        self
    }

    /// Serve `snapshot` from the next `fetch_project` instead of the live project.
    pub fn with_snapshot(self, snapshot: ProjectSnapshot) -> Self {
        self.state().snapshots.push_back(snapshot);
        self
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(self, operation: Operation, error: ClientError) -> Self {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn project(&self) -> ProjectSnapshot {
        self.state().project.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `call` and pop any scripted failure for `operation`.
    fn enter(&self, operation: Operation, call: Call) -> Result<MutexGuard<'_, FakeState>, ClientError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(error) = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state)
    }
}

impl FakeState {
    /// Ids for branches and directories.
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn allocate_file_id(&mut self) -> u64 {
        let id = self.next_file_id;
        self.next_file_id += 1;
        id
    }

    fn current_build(&self) -> Build {
        self.builds
            .front()
            .cloned()
            .unwrap_or_else(|| build(1, "finished", 100))
    }
}

#[async_trait::async_trait]
impl ProjectClient for FakeClient {
    async fn fetch_project(&self) -> Result<ProjectSnapshot, ClientError> {
        let mut state = self.enter(Operation::FetchProject, Call::FetchProject)?;
        Ok(match state.snapshots.pop_front() {
            Some(snapshot) => snapshot,
            None => state.project.clone(),
        })
    }

    async fn add_branch(&self, name: &str) -> Result<RemoteBranch, ClientError> {
        let mut state = self.enter(Operation::AddBranch, Call::AddBranch(name.to_owned()))?;
        let branch = RemoteBranch {
            id: state.allocate_id(),
            name: name.to_owned(),
        };
        state.project.branches.push(branch.clone());
        Ok(branch)
    }

    async fn add_directory(&self, request: &AddDirectory) -> Result<RemoteDirectory, ClientError> {
        let mut state = self.enter(Operation::AddDirectory, Call::AddDirectory(request.clone()))?;
        let directory = RemoteDirectory {
            id: state.allocate_id(),
            name: request.name.clone(),
            directory_id: request.directory_id,
            branch_id: request.branch_id,
        };
        state.project.directories.push(directory.clone());
        Ok(directory)
    }

    async fn upload_storage(&self, file_name: &str, content: Vec<u8>) -> Result<u64, ClientError> {
        let mut state = self.enter(
            Operation::UploadStorage,
            Call::UploadStorage {
                file_name: file_name.to_owned(),
                content,
            },
        )?;
        let id = state.next_storage_id;
        state.next_storage_id += 1;
        Ok(id)
    }

    async fn add_source(&self, request: &AddSource) -> Result<RemoteFile, ClientError> {
        let mut state = self.enter(Operation::AddSource, Call::AddSource(request.clone()))?;
        let file = RemoteFile {
            id: state.allocate_file_id(),
            name: request.name.clone(),
            directory_id: request.directory_id,
            branch_id: match request.directory_id {
                Some(directory) => state
                    .project
                    .find_directory(directory)
                    .and_then(|d| d.branch_id),
                None => request.branch_id,
            },
            export_pattern: Some(request.export_pattern.clone()),
        };
        state.project.files.push(file.clone());
        Ok(file)
    }

    async fn update_source(
        &self,
        file_id: u64,
        request: &UpdateSource,
    ) -> Result<RemoteFile, ClientError> {
        let mut state = self.enter(
            Operation::UpdateSource,
            Call::UpdateSource {
                file_id,
                request: request.clone(),
            },
        )?;
        let file = state
            .project
            .files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| ClientError::Remote {
                status: 404,
                message: format!("file {file_id} not found"),
            })?;
        file.export_pattern = Some(request.export_pattern.clone());
        Ok(file.clone())
    }

    async fn upload_translation(
        &self,
        language_id: &str,
        request: &UploadTranslation,
    ) -> Result<(), ClientError> {
        self.enter(
            Operation::UploadTranslation,
            Call::UploadTranslation {
                language_id: language_id.to_owned(),
                request: request.clone(),
            },
        )?;
        Ok(())
    }

    async fn start_build(&self, request: &BuildRequest) -> Result<Build, ClientError> {
        let state = self.enter(Operation::StartBuild, Call::StartBuild(request.clone()))?;
        Ok(state.current_build())
    }

    async fn check_build(&self, build_id: u64) -> Result<Build, ClientError> {
        let mut state = self.enter(Operation::CheckBuild, Call::CheckBuild(build_id))?;
        if state.builds.len() > 1 {
            state.builds.pop_front();
        }
        Ok(state.current_build())
    }

    async fn download_url(&self, build_id: u64) -> Result<String, ClientError> {
        self.enter(Operation::DownloadUrl, Call::DownloadUrl(build_id))?;
        Ok(format!("https://downloads.test/builds/{build_id}.zip"))
    }

    async fn download_to(&self, url: &str, destination: &Path) -> Result<(), ClientError> {
        let state = self.enter(Operation::DownloadTo, Call::DownloadTo(url.to_owned()))?;
        std::fs::write(destination, &state.archive).map_err(|e| ClientError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_script_advances_and_repeats_last() {
        let client = FakeClient::new(ProjectBuilder::new().build()).with_builds(vec![
            build(7, "created", 0),
            build(7, "inProgress", 50),
            build(7, "finished", 100),
        ]);

        assert_eq!(client.start_build(&BuildRequest::default()).await.unwrap().status, "created");
        assert_eq!(client.check_build(7).await.unwrap().progress, 50);
        assert!(client.check_build(7).await.unwrap().is_finished());
        assert!(client.check_build(7).await.unwrap().is_finished());
    }

    #[tokio::test]
    async fn scripted_failure_applies_once() {
        let client = FakeClient::new(ProjectBuilder::new().build())
            .fail_next(Operation::AddBranch, ClientError::AlreadyExists);

        assert_eq!(client.add_branch("main").await, Err(ClientError::AlreadyExists));
        let branch = client.add_branch("main").await.unwrap();
        assert_eq!(branch.id, 201);
        assert_eq!(client.project().branches, vec![branch]);
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn queued_snapshot_precedes_live_project() {
        let client = FakeClient::new(ProjectBuilder::new().branch(1, "live").build())
            .with_snapshot(ProjectBuilder::new().build());

        assert!(client.fetch_project().await.unwrap().branches.is_empty());
        assert_eq!(client.fetch_project().await.unwrap().branches.len(), 1);
    }

    #[tokio::test]
    async fn storage_ids_count_from_one() {
        let client = FakeClient::new(ProjectBuilder::new().build());
        assert_eq!(client.upload_storage("a.po", vec![]).await.unwrap(), 1);
        assert_eq!(client.upload_storage("b.po", vec![]).await.unwrap(), 2);
    }
}
