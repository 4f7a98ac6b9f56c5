use std::collections::HashSet;

use crate::language::{Language, LanguageMapping};

/// What the authenticated user may do in the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Administrative access: may create branches, directories and builds.
    Manager,
    /// Translator-only access.
    Translator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDirectory {
    pub id: u64,
    pub name: String,
    pub directory_id: Option<u64>,
    pub branch_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: u64,
    pub name: String,
    pub directory_id: Option<u64>,
    pub branch_id: Option<u64>,
    /// Export pattern configured for the file, if the server reports one.
    pub export_pattern: Option<String>,
}

/// Read model of a remote project, fetched once per command and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub id: u64,
    pub access: Access,
    pub source_language_id: String,
    pub target_language_ids: Vec<String>,
    pub supported_languages: Vec<Language>,
    pub language_mapping: Option<LanguageMapping>,
    pub branches: Vec<RemoteBranch>,
    pub directories: Vec<RemoteDirectory>,
    pub files: Vec<RemoteFile>,
}

impl ProjectSnapshot {
    pub fn is_manager(&self) -> bool {
        self.access == Access::Manager
    }

    /// Supported languages that are also project targets, in target order.
    pub fn project_languages(&self) -> Vec<Language> {
        self.target_language_ids
            .iter()
            .filter_map(|id| self.supported_languages.iter().find(|l| &l.id == id))
            .cloned()
            .collect()
    }

    /// Look up a project language by id.
    pub fn find_language(&self, id: &str) -> Option<Language> {
        self.project_languages().into_iter().find(|l| l.id == id)
    }

    pub fn find_branch(&self, name: &str) -> Option<&RemoteBranch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn find_directory(&self, id: u64) -> Option<&RemoteDirectory> {
        self.directories.iter().find(|d| d.id == id)
    }

    /// Directories under the given branch (`None` = outside branches),
    /// including nested ones that only reference their parent.
    pub fn directories_in_branch(&self, branch_id: Option<u64>) -> Vec<RemoteDirectory> {
        let mut included: HashSet<u64> = HashSet::new();
        let mut changed = true;
        while changed {
            changed = false;
            for directory in &self.directories {
                if included.contains(&directory.id) {
                    continue;
                }
                let in_scope = match directory.directory_id {
                    Some(parent) => included.contains(&parent),
                    None => directory.branch_id == branch_id,
                };
                if in_scope {
                    included.insert(directory.id);
                    changed = true;
                }
            }
        }

        self.directories
            .iter()
            .filter(|d| included.contains(&d.id))
            .cloned()
            .collect()
    }

    /// Files under the given branch, at its root or in one of its directories.
    pub fn files_in_branch(&self, branch_id: Option<u64>) -> Vec<&RemoteFile> {
        let directories: HashSet<u64> = self
            .directories_in_branch(branch_id)
            .iter()
            .map(|d| d.id)
            .collect();
        self.files
            .iter()
            .filter(|f| match f.directory_id {
                Some(directory) => directories.contains(&directory),
                None => f.branch_id == branch_id,
            })
            .collect()
    }
}
