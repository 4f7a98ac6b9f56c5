use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::language::LanguageMapping;

/// One `files` entry: which local sources to sync and where translations go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileEntry {
    pub source: String,
    pub ignore: Vec<String>,
    pub translation: String,
    /// Remote path override for the uploaded source.
    pub dest: Option<String>,
    /// Literal substitutions applied to resolved local translation paths.
    pub translation_replace: BTreeMap<String, String>,
    pub languages_mapping: Option<LanguageMapping>,
}

impl FileEntry {
    pub fn new(source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            translation: translation.into(),
            ..Self::default()
        }
    }

    pub fn with_ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.translation_replace.insert(from.into(), to.into());
        self
    }

    pub fn with_languages_mapping(mut self, mapping: LanguageMapping) -> Self {
        self.languages_mapping = Some(mapping);
        self
    }

    /// Effective mapping for this entry's local paths.
    pub fn merged_mapping(&self, project_level: Option<&LanguageMapping>) -> LanguageMapping {
        match &self.languages_mapping {
            Some(file_level) => LanguageMapping::merge(file_level, project_level),
            None => project_level.cloned().unwrap_or_default(),
        }
    }
}

/// The parts of a project configuration the sync engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub base_path: PathBuf,
    pub preserve_hierarchy: bool,
    pub files: Vec<FileEntry>,
}

impl SyncConfig {
    pub fn new(base_path: impl Into<PathBuf>, files: Vec<FileEntry>) -> Self {
        Self {
            base_path: base_path.into(),
            preserve_hierarchy: false,
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_mapping_without_file_level_uses_project() {
        let mut project = LanguageMapping::new();
        project.insert("locale", "uk", "ua");
        let entry = FileEntry::new("*", "/%locale%/%original_file_name%");

        assert_eq!(entry.merged_mapping(Some(&project)), project);
        assert!(entry.merged_mapping(None).is_empty());
    }

    #[test]
    fn merged_mapping_prefers_file_level() {
        let mut project = LanguageMapping::new();
        project.insert("locale", "uk", "project");
        let mut file = LanguageMapping::new();
        file.insert("locale", "uk", "file");
        let entry = FileEntry::new("*", "/%locale%").with_languages_mapping(file);

        assert_eq!(entry.merged_mapping(Some(&project)).get("locale", "uk"), Some("file"));
    }
}
