use std::collections::BTreeSet;

use crate::client::ProjectClient;
use crate::config::SyncConfig;
use crate::download::{Selection, select};
use crate::error::SyncError;
use crate::events::{Events, SyncEvent};
use crate::mapping::local_translation_path;
use crate::placeholder::PlaceholderResolver;
use crate::sources::{find_sources, selected_languages};

/// List the local translation paths a download would write, without
/// building anything remotely.
///
/// Paths are relative to the base path, distinct and sorted. With
/// `files_must_exist`, only paths that already exist on disk are listed.
pub async fn dry_run_translations<C: ProjectClient + ?Sized>(
    client: &C,
    config: &SyncConfig,
    language: Option<&str>,
    files_must_exist: bool,
    events: &Events,
) -> Result<Vec<String>, SyncError> {
    let Selection { project, language, .. } = select(client, language, None, events).await?;

    let resolver = PlaceholderResolver::new(project.project_languages(), &config.base_path);
    let languages = selected_languages(&resolver, language.as_ref());
    let mut paths = BTreeSet::new();

    for entry in &config.files {
        let mapping = entry.merged_mapping(project.language_mapping.as_ref());
        for relative in find_sources(&config.base_path, entry, &resolver, &mapping)? {
            for language in &languages {
                let local = local_translation_path(&resolver, entry, &relative, language, &mapping);
                let local = local.trim_start_matches('/');
                if files_must_exist && !config.base_path.join(local).is_file() {
                    continue;
                }
                paths.insert(local.to_owned());
            }
        }
    }

    let paths: Vec<String> = paths.into_iter().collect();
    for path in &paths {
        events.emit(SyncEvent::DryRunPath(path.clone()));
    }
    Ok(paths)
}
