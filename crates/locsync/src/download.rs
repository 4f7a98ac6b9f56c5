use std::time::Duration;

use crate::archive::{TempArtifacts, copy_file, extract_zip};
use crate::client::{Build, BuildRequest, ExportFilter, ProjectClient};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::{Events, SyncEvent};
use crate::language::Language;
use crate::mapping::{TranslationMapping, build_translation_mapping, project_translations};
use crate::paths::DirectoryPathIndex;
use crate::placeholder::PlaceholderResolver;
use crate::project::{ProjectSnapshot, RemoteBranch};
use crate::reconcile::{OmittedSummary, classify_omitted, reconcile};
use crate::sources::selected_languages;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Filters and flags for one download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub language: Option<String>,
    pub branch: Option<String>,
    /// The project lives on an organization domain.
    pub organization: bool,
    pub skip_untranslated_strings: bool,
    pub skip_untranslated_files: bool,
    pub export_approved_only: bool,
    /// Do not report omitted archive entries.
    pub ignore_match: bool,
    pub poll_interval: Duration,
    pub build_timeout: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            language: None,
            branch: None,
            organization: false,
            skip_untranslated_strings: false,
            skip_untranslated_files: false,
            export_approved_only: false,
            ignore_match: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
        }
    }
}

impl DownloadOptions {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.skip_untranslated_strings && self.skip_untranslated_files {
            return Err(SyncError::InvalidOptions(
                "skipping untranslated strings and untranslated files cannot be combined".into(),
            ));
        }
        Ok(())
    }

    fn build_request(&self, language: Option<&Language>, branch: Option<&RemoteBranch>) -> BuildRequest {
        BuildRequest {
            target_language_ids: language.map(|l| vec![l.id.clone()]),
            branch_id: branch.map(|b| b.id),
            skip_untranslated_strings: self.skip_untranslated_strings.then_some(true),
            skip_untranslated_files: self.skip_untranslated_files.then_some(true),
            export_filter: ExportFilter::for_scope(self.organization, self.export_approved_only),
        }
    }
}

/// Outcome of a completed download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Written translation paths relative to the base path, in write order.
    pub written: Vec<String>,
    pub omitted: OmittedSummary,
}

/// Project, language and branch resolved before any remote mutation.
pub(crate) struct Selection {
    pub project: ProjectSnapshot,
    pub language: Option<Language>,
    pub branch: Option<RemoteBranch>,
}

/// Fetch the project and resolve the requested language and branch.
pub(crate) async fn select<C: ProjectClient + ?Sized>(
    client: &C,
    language: Option<&str>,
    branch: Option<&str>,
    events: &Events,
) -> Result<Selection, SyncError> {
    events.emit(SyncEvent::FetchingProject);
    let project = client.fetch_project().await?;

    let language = language
        .map(|id| {
            project
                .find_language(id)
                .ok_or_else(|| SyncError::LanguageNotFound(id.to_owned()))
        })
        .transpose()?;
    let branch = branch
        .map(|name| {
            project
                .find_branch(name)
                .cloned()
                .ok_or_else(|| SyncError::BranchNotFound(name.to_owned()))
        })
        .transpose()?;

    Ok(Selection {
        project,
        language,
        branch,
    })
}

/// Fetch, build, poll, download and reconcile translations onto disk.
pub async fn synchronize_download<C: ProjectClient + ?Sized>(
    client: &C,
    config: &SyncConfig,
    options: &DownloadOptions,
    events: &Events,
) -> Result<DownloadReport, SyncError> {
    options.validate()?;

    let Selection {
        project,
        language,
        branch,
    } = select(client, options.language.as_deref(), options.branch.as_deref(), events).await?;
    if !project.is_manager() {
        return Err(SyncError::AccessDenied);
    }

    let resolver = PlaceholderResolver::new(project.project_languages(), &config.base_path);
    let languages = selected_languages(&resolver, language.as_ref());
    let mapping = build_translation_mapping(
        config,
        &resolver,
        project.language_mapping.as_ref(),
        &languages,
    )?;

    // Within a branch, archive paths are relative to the branch root.
    let index = match &branch {
        Some(_) => DirectoryPathIndex::build(&project.directories)?,
        None => DirectoryPathIndex::build_with_branches(&project.directories, &project.branches)?,
    };
    let known = project_translations(&project, &index, branch.as_ref().map(|b| b.id), &resolver)?;

    events.emit(SyncEvent::BuildStarted {
        language: language.as_ref().map(|l| l.id.clone()),
    });
    let request = options.build_request(language.as_ref(), branch.as_ref());
    let build = run_build(client, &request, options, events).await?;

    let artifacts = TempArtifacts::create(&config.base_path)?;
    let outcome = place_translations(client, &build, &artifacts, config, &mapping, events).await;

    let report = match (outcome, artifacts.cleanup()) {
        (Ok(placed), Ok(())) => placed,
        (Ok(placed), Err(e)) => {
            tracing::warn!("failed to clean up download artifacts: {e}");
            events.emit(SyncEvent::warning(format!("failed to clean up temporary files: {e}")));
            placed
        }
        (Err(primary), cleanup) => {
            if let Err(e) = cleanup {
                tracing::warn!("failed to clean up download artifacts: {e}");
            }
            return Err(primary);
        }
    };

    let omitted = classify_omitted(&report.omitted, &known);
    if !options.ignore_match {
        for (source, files) in &omitted.by_source {
            events.emit(SyncEvent::OmittedWithSource {
                source: source.clone(),
                files: files.clone(),
            });
        }
        if !omitted.without_source.is_empty() {
            events.emit(SyncEvent::OmittedWithoutSource(omitted.without_source.clone()));
        }
    }

    Ok(DownloadReport {
        written: report.written,
        omitted,
    })
}

/// Start a build and poll it until it finishes, fails or times out.
///
/// Progress events are emitted when the observed percentage changes, then
/// once at 100 when the build finishes.
pub async fn run_build<C: ProjectClient + ?Sized>(
    client: &C,
    request: &BuildRequest,
    options: &DownloadOptions,
    events: &Events,
) -> Result<Build, SyncError> {
    let started = client.start_build(request).await?;
    let build_id = started.id;

    let poll = async {
        let mut build = started;
        let mut progress = 0u8;
        while !build.is_finished() {
            if build.is_failed() {
                return Err(SyncError::BuildFailed {
                    build_id,
                    status: build.status,
                });
            }
            if build.progress != progress {
                progress = build.progress;
                events.emit(SyncEvent::BuildProgress(progress));
            }
            tokio::time::sleep(options.poll_interval).await;
            build = client.check_build(build_id).await?;
            tracing::debug!(build_id, status = %build.status, progress = build.progress, "polled build");
        }
        events.emit(SyncEvent::BuildProgress(100));
        Ok::<_, SyncError>(build)
    };

    tokio::time::timeout(options.build_timeout, poll)
        .await
        .map_err(|_| SyncError::BuildTimedOut {
            build_id,
            seconds: options.build_timeout.as_secs(),
        })?
}

struct Placed {
    written: Vec<String>,
    omitted: Vec<String>,
}

async fn place_translations<C: ProjectClient + ?Sized>(
    client: &C,
    build: &Build,
    artifacts: &TempArtifacts,
    config: &SyncConfig,
    mapping: &TranslationMapping,
    events: &Events,
) -> Result<Placed, SyncError> {
    events.emit(SyncEvent::Downloading);
    let url = client.download_url(build.id).await?;
    client.download_to(&url, artifacts.archive()).await?;

    let entries = extract_zip(artifacts.archive(), artifacts.directory())?;
    let reconciliation = reconcile(&entries, mapping, &config.base_path);

    let mut written = Vec::with_capacity(reconciliation.to_write.len());
    for placement in &reconciliation.to_write {
        copy_file(&artifacts.directory().join(&placement.entry), &placement.destination)?;
        let path = placement.local_path.trim_start_matches('/').to_owned();
        events.emit(SyncEvent::FileWritten(path.clone()));
        written.push(path);
    }

    Ok(Placed {
        written,
        omitted: reconciliation.omitted,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::client::ClientError;
    use crate::config::FileEntry;
    use crate::project::Access;
    use crate::test_support::{Call, FakeClient, Operation, ProjectBuilder, build, language, zip_archive};

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "msgid \"\"").unwrap();
    }

    fn drain(rx: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn fast() -> DownloadOptions {
        DownloadOptions {
            poll_interval: Duration::from_millis(1),
            ..DownloadOptions::default()
        }
    }

    fn uk_project() -> ProjectBuilder {
        ProjectBuilder::new().languages(vec![language("uk", "uk-UA")])
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".locsync-") || name.starts_with("translations-"))
            .collect()
    }

    // -- scenarios --

    #[tokio::test]
    async fn single_file_is_written_to_its_destination() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "first.po");
        let config = SyncConfig::new(
            dir.path(),
            vec![FileEntry::new("*", "/%file_name%-CR-%two_letters_code%.%file_extension%")],
        );
        let client = FakeClient::new(uk_project().build())
            .with_archive(zip_archive(&[("first-CR-uk.po", "translated")]));

        let report = synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap();

        assert_eq!(report.written, vec!["first-CR-uk.po"]);
        assert!(report.omitted.is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("first-CR-uk.po")).unwrap(),
            "translated"
        );
    }

    #[tokio::test]
    async fn nested_source_keeps_directory_without_remote_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "first.po");
        touch(dir.path(), "folder/second.po");
        let config = SyncConfig::new(
            dir.path(),
            vec![FileEntry::new(
                "**/*",
                "/**/%file_name%-CR-%two_letters_code%.%file_extension%",
            )],
        );
        let client = FakeClient::new(uk_project().build()).with_archive(zip_archive(&[
            ("first-CR-uk.po", "a"),
            ("folder/second-CR-uk.po", "b"),
        ]));

        let report = synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap();

        assert_eq!(report.written, vec!["first-CR-uk.po", "folder/second-CR-uk.po"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("folder/second-CR-uk.po")).unwrap(),
            "b"
        );
        assert!(!client
            .calls()
            .iter()
            .any(|c| matches!(c, Call::AddDirectory(_))));
    }

    #[tokio::test]
    async fn progress_is_reported_in_order_then_downloads_once() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "first.po");
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*", "/%locale%/%original_file_name%")]);
        let client = FakeClient::new(uk_project().build())
            .with_builds(vec![
                build(9, "created", 0),
                build(9, "inProgress", 40),
                build(9, "inProgress", 90),
                build(9, "finished", 100),
            ])
            .with_archive(zip_archive(&[("uk-UA/first.po", "x")]));
        let (events, mut rx) = Events::channel();

        synchronize_download(&client, &config, &fast(), &events).await.unwrap();

        let progress: Vec<u8> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SyncEvent::BuildProgress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![40, 90, 100]);

        let calls = client.calls();
        let downloads = calls.iter().filter(|c| matches!(c, Call::DownloadTo(_))).count();
        assert_eq!(downloads, 1);
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::CheckBuild(9))).count(),
            3
        );
    }

    #[tokio::test]
    async fn omitted_entry_is_grouped_under_known_source() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "first.po");
        let config = SyncConfig::new(
            dir.path(),
            vec![FileEntry::new("*", "/%two_letters_code%/%original_file_name%")],
        );
        let project = ProjectBuilder::new()
            .languages(vec![language("uk", "uk-UA"), language("fr", "fr-FR")])
            .file_with_pattern(10, "first.po", None, None, "/%two_letters_code%/%original_file_name%")
            .file_with_pattern(11, "ignored.po", None, None, "/%two_letters_code%/%original_file_name%")
            .build();
        let client = FakeClient::new(project).with_archive(zip_archive(&[
            ("uk/first.po", "uk"),
            ("fr/first.po", "fr"),
            ("fr/ignored.po", "skip"),
            ("fr/stray.po", "skip"),
        ]));
        let (events, mut rx) = Events::channel();

        let report = synchronize_download(&client, &config, &fast(), &events).await.unwrap();

        assert_eq!(report.written, vec!["fr/first.po", "uk/first.po"]);
        assert_eq!(report.omitted.by_source["/ignored.po"], vec!["fr/ignored.po"]);
        assert_eq!(report.omitted.without_source, vec!["fr/stray.po"]);
        assert!(!dir.path().join("fr/ignored.po").exists());

        let events = drain(&mut rx);
        assert!(events.contains(&SyncEvent::OmittedWithSource {
            source: "/ignored.po".into(),
            files: vec!["fr/ignored.po".into()],
        }));
        assert!(events.contains(&SyncEvent::OmittedWithoutSource(vec!["fr/stray.po".into()])));
    }

    #[tokio::test]
    async fn ignore_match_suppresses_omission_events() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "first.po");
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*", "/%locale%/%original_file_name%")]);
        let client = FakeClient::new(uk_project().build())
            .with_archive(zip_archive(&[("uk-UA/first.po", "x"), ("extra.po", "y")]));
        let (events, mut rx) = Events::channel();
        let options = DownloadOptions {
            ignore_match: true,
            ..fast()
        };

        let report = synchronize_download(&client, &config, &options, &events).await.unwrap();

        assert_eq!(report.omitted.without_source, vec!["extra.po"]);
        assert!(!drain(&mut rx).iter().any(SyncEvent::is_warning));
    }

    // -- build request --

    #[tokio::test]
    async fn build_request_carries_filters() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*", "/%locale%/%original_file_name%")]);
        let client = FakeClient::new(uk_project().branch(5, "main").build())
            .with_archive(zip_archive(&[]));
        let options = DownloadOptions {
            language: Some("uk".into()),
            branch: Some("main".into()),
            organization: true,
            export_approved_only: true,
            skip_untranslated_files: true,
            ..fast()
        };

        synchronize_download(&client, &config, &options, &Events::silent())
            .await
            .unwrap();

        let request = client
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::StartBuild(request) => Some(request),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            request,
            BuildRequest {
                target_language_ids: Some(vec!["uk".into()]),
                branch_id: Some(5),
                skip_untranslated_strings: None,
                skip_untranslated_files: Some(true),
                export_filter: Some(ExportFilter::MinApprovals(1)),
            }
        );
    }

    #[tokio::test]
    async fn conflicting_skip_flags_are_rejected_before_fetch() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build());
        let options = DownloadOptions {
            skip_untranslated_strings: true,
            skip_untranslated_files: true,
            ..fast()
        };

        let err = synchronize_download(&client, &config, &options, &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidOptions(_)));
        assert!(client.calls().is_empty());
    }

    // -- configuration and access errors --

    #[tokio::test]
    async fn unknown_language_fails_before_build() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build());
        let options = DownloadOptions {
            language: Some("xx".into()),
            ..fast()
        };

        let err = synchronize_download(&client, &config, &options, &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::LanguageNotFound(id) if id == "xx"));
        assert_eq!(client.calls(), vec![Call::FetchProject]);
    }

    #[tokio::test]
    async fn unknown_branch_fails_before_build() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build());
        let options = DownloadOptions {
            branch: Some("missing".into()),
            ..fast()
        };

        let err = synchronize_download(&client, &config, &options, &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BranchNotFound(_)));
        assert_eq!(client.calls(), vec![Call::FetchProject]);
    }

    #[tokio::test]
    async fn translator_access_is_denied() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().access(Access::Translator).build());

        let err = synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AccessDenied));
        assert_eq!(client.calls(), vec![Call::FetchProject]);
    }

    // -- build failures --

    #[tokio::test]
    async fn failed_build_is_terminal() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build())
            .with_builds(vec![build(3, "inProgress", 10), build(3, "failed", 10)]);

        let err = synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BuildFailed { build_id: 3, .. }));
        assert!(!client.calls().iter().any(|c| matches!(c, Call::DownloadUrl(_))));
    }

    #[tokio::test]
    async fn stalled_build_times_out() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build())
            .with_builds(vec![build(4, "inProgress", 10)]);
        let options = DownloadOptions {
            build_timeout: Duration::from_millis(30),
            ..fast()
        };

        let err = synchronize_download(&client, &config, &options, &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BuildTimedOut { build_id: 4, .. }));
    }

    // -- cleanup --

    #[tokio::test]
    async fn artifacts_are_removed_after_success() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "first.po");
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*", "/%locale%/%original_file_name%")]);
        let client = FakeClient::new(uk_project().build())
            .with_archive(zip_archive(&[("uk-UA/first.po", "x")]));

        synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap();
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn artifacts_are_removed_after_download_failure() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build()).fail_next(
            Operation::DownloadTo,
            ClientError::Network("connection reset".into()),
        );

        let err = synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(ClientError::Network(_))));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn artifacts_are_removed_after_invalid_archive() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![]);
        let client = FakeClient::new(uk_project().build()).with_archive(b"garbage".to_vec());

        let err = synchronize_download(&client, &config, &fast(), &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Archive(_)));
        assert!(leftovers(dir.path()).is_empty());
    }
}
