use std::collections::{BTreeMap, HashMap};

use crate::project::{RemoteBranch, RemoteDirectory, RemoteFile};

/// Errors raised while resolving remote parent chains.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathIndexError {
    #[error("directory {child} references missing parent directory {parent}")]
    DanglingParent { child: u64, parent: u64 },

    #[error("directory or file {child} references missing branch {branch}")]
    DanglingBranch { child: u64, branch: u64 },

    #[error("file {file} references missing directory {directory}")]
    DanglingFile { file: u64, directory: u64 },

    #[error("directory {0} is part of a parent cycle")]
    Cycle(u64),
}

/// A node that can own a path: a directory or the root of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathNode {
    Directory(u64),
    Branch(u64),
}

/// Absolute remote paths for every directory (and optionally branch root).
///
/// Paths are `/`-joined segment names without leading or trailing separators.
/// Directories inside a branch are prefixed by the branch name only when the
/// index was built with branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryPathIndex {
    paths: BTreeMap<PathNode, String>,
    with_branches: bool,
}

impl DirectoryPathIndex {
    /// Index directories only; branch membership does not prefix paths.
    pub fn build(directories: &[RemoteDirectory]) -> Result<Self, PathIndexError> {
        Self::resolve(directories, None)
    }

    /// Index directories and branch roots; branch names prefix their contents.
    pub fn build_with_branches(
        directories: &[RemoteDirectory],
        branches: &[RemoteBranch],
    ) -> Result<Self, PathIndexError> {
        Self::resolve(directories, Some(branches))
    }

    fn resolve(
        directories: &[RemoteDirectory],
        branches: Option<&[RemoteBranch]>,
    ) -> Result<Self, PathIndexError> {
        let by_id: HashMap<u64, &RemoteDirectory> =
            directories.iter().map(|d| (d.id, d)).collect();
        let branch_names: HashMap<u64, &str> = branches
            .unwrap_or_default()
            .iter()
            .map(|b| (b.id, b.name.as_str()))
            .collect();

        let mut resolved: HashMap<u64, String> = HashMap::with_capacity(directories.len());

        for directory in directories {
            if resolved.contains_key(&directory.id) {
                continue;
            }

            // Walk up until a resolved ancestor or a root, then unwind.
            let mut chain: Vec<&RemoteDirectory> = vec![directory];
            let mut prefix = String::new();
            loop {
                let current = chain[chain.len() - 1];
                match current.directory_id {
                    Some(parent_id) => {
                        if let Some(path) = resolved.get(&parent_id) {
                            prefix = path.clone();
                            break;
                        }
                        let parent = by_id.get(&parent_id).ok_or(PathIndexError::DanglingParent {
                            child: current.id,
                            parent: parent_id,
                        })?;
                        if chain.len() > directories.len() {
                            return Err(PathIndexError::Cycle(directory.id));
                        }
                        chain.push(*parent);
                    }
                    None => {
                        if branches.is_some()
                            && let Some(branch_id) = current.branch_id
                        {
                            let name = branch_names.get(&branch_id).ok_or(
                                PathIndexError::DanglingBranch {
                                    child: current.id,
                                    branch: branch_id,
                                },
                            )?;
                            prefix = (*name).to_owned();
                        }
                        break;
                    }
                }
            }

            for node in chain.into_iter().rev() {
                let path = if prefix.is_empty() {
                    node.name.clone()
                } else {
                    format!("{prefix}/{}", node.name)
                };
                resolved.insert(node.id, path.clone());
                prefix = path;
            }
        }

        let mut paths: BTreeMap<PathNode, String> = resolved
            .into_iter()
            .map(|(id, path)| (PathNode::Directory(id), path))
            .collect();
        for (id, name) in branch_names {
            paths.insert(PathNode::Branch(id), name.to_owned());
        }

        Ok(Self {
            paths,
            with_branches: branches.is_some(),
        })
    }

    pub fn get(&self, node: PathNode) -> Option<&str> {
        self.paths.get(&node).map(String::as_str)
    }

    pub fn directory_path(&self, id: u64) -> Option<&str> {
        self.get(PathNode::Directory(id))
    }

    /// Path of a file, including its directory chain. Branch prefixes appear
    /// only for files at a branch root when branches were indexed.
    pub fn file_path(&self, file: &RemoteFile) -> Result<String, PathIndexError> {
        let parent = match (file.directory_id, file.branch_id) {
            (Some(directory), _) => Some(self.directory_path(directory).ok_or(
                PathIndexError::DanglingFile {
                    file: file.id,
                    directory,
                },
            )?),
            (None, Some(branch)) if self.with_branches => Some(
                self.get(PathNode::Branch(branch))
                    .ok_or(PathIndexError::DanglingBranch {
                        child: file.id,
                        branch,
                    })?,
            ),
            (None, Some(_)) => None,
            (None, None) => None,
        };

        Ok(match parent {
            Some(parent) => format!("{parent}/{}", file.name),
            None => file.name.clone(),
        })
    }

    /// Directory id for every indexed directory path.
    pub fn directories(&self) -> impl Iterator<Item = (&str, u64)> {
        self.paths.iter().filter_map(|(node, path)| match node {
            PathNode::Directory(id) => Some((path.as_str(), *id)),
            PathNode::Branch(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
