use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use crate::config::{FileEntry, SyncConfig};
use crate::language::{Language, LanguageMapping};
use crate::paths::{DirectoryPathIndex, PathIndexError};
use crate::placeholder::{PlaceholderResolver, apply_translation_replace};
use crate::project::ProjectSnapshot;
use crate::sources::{SourceMatchError, find_sources};

/// Where one (source file, language) translation is expected to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTranslation {
    /// Source path relative to the base path.
    pub source: String,
    pub language_id: String,
    /// Path inside the build archive, without a leading separator.
    pub export_path: String,
    /// Local path, anchored with `/`, relative to the base path.
    pub local_path: String,
}

impl ExpectedTranslation {
    pub fn destination(&self, base_path: &Path) -> PathBuf {
        base_path.join(self.local_path.trim_start_matches('/'))
    }
}

/// Expected export path -> local translation, first insertion wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationMapping {
    by_export: BTreeMap<String, ExpectedTranslation>,
}

impl TranslationMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the export path is already claimed. Returns whether the
    /// entry was kept.
    pub fn insert_first(&mut self, expected: ExpectedTranslation) -> bool {
        match self.by_export.entry(expected.export_path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(expected);
                true
            }
            Entry::Occupied(existing) => {
                tracing::debug!(
                    export_path = %expected.export_path,
                    kept = %existing.get().source,
                    dropped = %expected.source,
                    "export path collision"
                );
                false
            }
        }
    }

    pub fn get(&self, export_path: &str) -> Option<&ExpectedTranslation> {
        self.by_export.get(export_path.trim_start_matches('/'))
    }

    pub fn contains(&self, export_path: &str) -> bool {
        self.get(export_path).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpectedTranslation> {
        self.by_export.values()
    }

    pub fn len(&self) -> usize {
        self.by_export.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_export.is_empty()
    }
}

/// Export path the server will use for `relative` in `language`.
pub fn export_path(
    resolver: &PlaceholderResolver,
    entry: &FileEntry,
    relative: &str,
    language: &Language,
    project_mapping: &LanguageMapping,
) -> String {
    resolver
        .expand_for(&entry.translation, &entry.source, relative, language, project_mapping)
        .trim_start_matches('/')
        .to_owned()
}

/// Local translation path for `relative` in `language`, anchored with `/`.
pub fn local_translation_path(
    resolver: &PlaceholderResolver,
    entry: &FileEntry,
    relative: &str,
    language: &Language,
    merged_mapping: &LanguageMapping,
) -> String {
    let resolved =
        resolver.expand_for(&entry.translation, &entry.source, relative, language, merged_mapping);
    apply_translation_replace(&resolved, &entry.translation_replace)
}

/// Expected translations for every matched source in every given language.
///
/// Entries are visited in configuration order, then language order, then
/// source order; the first claim on an export path wins.
pub fn build_translation_mapping(
    config: &SyncConfig,
    resolver: &PlaceholderResolver,
    project_mapping: Option<&LanguageMapping>,
    languages: &[Language],
) -> Result<TranslationMapping, SourceMatchError> {
    let project = project_mapping.cloned().unwrap_or_default();
    let mut mapping = TranslationMapping::new();

    for entry in &config.files {
        let merged = entry.merged_mapping(project_mapping);
        let sources = find_sources(&config.base_path, entry, resolver, &merged)?;

        for language in languages {
            for relative in &sources {
                mapping.insert_first(ExpectedTranslation {
                    source: relative.clone(),
                    language_id: language.id.clone(),
                    export_path: export_path(resolver, entry, relative, language, &project),
                    local_path: local_translation_path(resolver, entry, relative, language, &merged),
                });
            }
        }
    }

    Ok(mapping)
}

/// Every translation path the server knows for each remote source, keyed by
/// the source's `/`-anchored remote path. Files without an export pattern
/// contribute nothing.
pub fn project_translations(
    project: &ProjectSnapshot,
    index: &DirectoryPathIndex,
    branch_id: Option<u64>,
    resolver: &PlaceholderResolver,
) -> Result<BTreeMap<String, Vec<String>>, PathIndexError> {
    let project_mapping = project.language_mapping.clone().unwrap_or_default();
    let mut translations = BTreeMap::new();

    let files = match branch_id {
        Some(_) => project.files_in_branch(branch_id),
        None => project.files.iter().collect(),
    };
    for file in files {
        let Some(pattern) = &file.export_pattern else {
            continue;
        };
        let remote_path = index.file_path(file)?;
        let paths: Vec<String> = resolver
            .expand_languages(pattern, &project_mapping)
            .map(|resolved| {
                resolver
                    .replace_file_dependent(&resolved, &remote_path)
                    .trim_start_matches('/')
                    .to_owned()
            })
            .collect();
        translations.insert(format!("/{remote_path}"), paths);
    }

    Ok(translations)
}
