use std::path::Path;

use crate::client::{ProjectClient, UploadTranslation};
use crate::config::SyncConfig;
use crate::download::{Selection, select};
use crate::error::SyncError;
use crate::events::{Events, SyncEvent};
use crate::mapping::local_translation_path;
use crate::placeholder::PlaceholderResolver;
use crate::sources::{common_directory, find_sources, remote_source_path, selected_languages};
use crate::upload::RemoteTree;

#[derive(Debug, Clone, Default)]
pub struct UploadTranslationsOptions {
    pub language: Option<String>,
    pub branch: Option<String>,
    pub import_eq_suggestions: bool,
    pub auto_approve_imported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationsReport {
    /// Uploaded local paths relative to the base path.
    pub uploaded: Vec<String>,
    /// Expected local translations that do not exist.
    pub missing: Vec<String>,
}

/// Upload local translations for every source that already exists remotely.
pub async fn upload_translations<C: ProjectClient + ?Sized>(
    client: &C,
    config: &SyncConfig,
    options: &UploadTranslationsOptions,
    events: &Events,
) -> Result<TranslationsReport, SyncError> {
    let Selection {
        project,
        language,
        branch,
    } = select(client, options.language.as_deref(), options.branch.as_deref(), events).await?;

    let resolver = PlaceholderResolver::new(project.project_languages(), &config.base_path);
    let languages = selected_languages(&resolver, language.as_ref());
    let tree = RemoteTree::load(&project, branch.as_ref().map(|b| b.id))?;
    let mut report = TranslationsReport::default();

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
            let Some(file_id) = tree.file(&remote_path) else {
                events.emit(SyncEvent::warning(format!(
                    "source '{remote_path}' does not exist in the project"
                )));
                continue;
            };

            for language in &languages {
                let local = local_translation_path(&resolver, entry, relative, language, &mapping);
                let local = local.trim_start_matches('/').to_owned();
                let path = config.base_path.join(&local);
                if !path.is_file() {
                    events.emit(SyncEvent::TranslationMissing(local.clone()));
                    report.missing.push(local);
                    continue;
                }

                let content = std::fs::read(&path).map_err(|e| SyncError::io(path.display(), e))?;
                let storage_id = client.upload_storage(file_name(&path), content).await?;
                client
                    .upload_translation(
                        &language.id,
                        &UploadTranslation {
                            storage_id,
                            file_id,
                            import_eq_suggestions: options.import_eq_suggestions,
                            auto_approve_imported: options.auto_approve_imported,
                        },
                    )
                    .await?;

                events.emit(SyncEvent::TranslationUploaded {
                    path: local.clone(),
                    language: language.id.clone(),
                });
                report.uploaded.push(local);
            }
        }
    }

    Ok(report)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::FileEntry;
    use crate::test_support::{Call, FakeClient, ProjectBuilder, language};

    const TRANSLATION: &str = "/%two_letters_code%/%original_file_name%";

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> ProjectBuilder {
        ProjectBuilder::new().languages(vec![language("uk", "uk-UA"), language("fr", "fr-FR")])
    }

    #[tokio::test]
    async fn uploads_existing_translations_and_reports_missing() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "messages.po", "source");
        touch(dir.path(), "uk/messages.po", "uk");
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*.po", TRANSLATION)]);
        let client = FakeClient::new(project().file(10, "messages.po", None, None).build());
        let options = UploadTranslationsOptions {
            auto_approve_imported: true,
            ..UploadTranslationsOptions::default()
        };

        let report = upload_translations(&client, &config, &options, &Events::silent())
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["uk/messages.po"]);
        assert_eq!(report.missing, vec!["fr/messages.po"]);
        assert_eq!(
            client.calls(),
            vec![
                Call::FetchProject,
                Call::UploadStorage {
                    file_name: "messages.po".into(),
                    content: b"uk".to_vec(),
                },
                Call::UploadTranslation {
                    language_id: "uk".into(),
                    request: UploadTranslation {
                        storage_id: 1,
                        file_id: 10,
                        import_eq_suggestions: false,
                        auto_approve_imported: true,
                    },
                },
            ]
        );
    }

    #[tokio::test]
    async fn unknown_remote_source_is_skipped_with_warning() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "messages.po", "source");
        touch(dir.path(), "uk/messages.po", "uk");
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*.po", TRANSLATION)]);
        let client = FakeClient::new(project().build());
        let (events, mut rx) = Events::channel();

        let report = upload_translations(&client, &config, &UploadTranslationsOptions::default(), &events)
            .await
            .unwrap();

        assert!(report.uploaded.is_empty());
        assert_eq!(client.calls(), vec![Call::FetchProject]);

        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            warned |= matches!(event, SyncEvent::Warning(ref msg) if msg.contains("messages.po"));
        }
        assert!(warned);
    }

    #[tokio::test]
    async fn language_filter_limits_uploads() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "messages.po", "source");
        touch(dir.path(), "uk/messages.po", "uk");
        touch(dir.path(), "fr/messages.po", "fr");
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*.po", TRANSLATION)]);
        let client = FakeClient::new(project().file(10, "messages.po", None, None).build());
        let options = UploadTranslationsOptions {
            language: Some("fr".into()),
            ..UploadTranslationsOptions::default()
        };

        let report = upload_translations(&client, &config, &options, &Events::silent())
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["fr/messages.po"]);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn missing_branch_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path(), vec![FileEntry::new("*.po", TRANSLATION)]);
        let client = FakeClient::new(project().build());
        let options = UploadTranslationsOptions {
            branch: Some("feature".into()),
            ..UploadTranslationsOptions::default()
        };

        let err = upload_translations(&client, &config, &options, &Events::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BranchNotFound(name) if name == "feature"));
    }

    #[tokio::test]
    async fn sources_in_branch_directories_are_matched() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/messages.po", "source");
        touch(dir.path(), "uk/messages.po", "uk");
        let mut config = SyncConfig::new(dir.path(), vec![FileEntry::new("app/*.po", TRANSLATION)]);
        config.preserve_hierarchy = true;
        let client = FakeClient::new(
            project()
                .branch(5, "main")
                .directory(20, "app", None, Some(5))
                .file(30, "messages.po", Some(20), None)
                .build(),
        );
        let options = UploadTranslationsOptions {
            branch: Some("main".into()),
            language: Some("uk".into()),
            ..UploadTranslationsOptions::default()
        };

        let report = upload_translations(&client, &config, &options, &Events::silent())
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["uk/messages.po"]);
        assert!(client.calls().iter().any(|c| matches!(
            c,
            Call::UploadTranslation { request, .. } if request.file_id == 30
        )));
    }
}
