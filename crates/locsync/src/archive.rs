use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors that can occur while handling downloaded archives and their files.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid archive {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

impl ArchiveError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extract every regular file of a ZIP archive under `target`.
///
/// Returns the extracted paths relative to `target`, `/`-separated and
/// sorted. Entries whose names would escape `target` are skipped.
pub fn extract_zip(archive: &Path, target: &Path) -> Result<Vec<String>, ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Invalid {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut extracted = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| ArchiveError::Invalid {
            path: archive.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "skipping archive entry outside extraction root");
            continue;
        };

        let destination = target.join(&relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut out = File::create(&destination).map_err(|e| ArchiveError::io(&destination, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::io(&destination, e))?;

        extracted.push(archive_entry_path(&relative));
    }

    extracted.sort();
    tracing::debug!(archive = %archive.display(), files = extracted.len(), "extracted archive");
    Ok(extracted)
}

/// `/`-joined form of a path relative to an extraction root.
pub fn archive_entry_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Copy `from` to `to`, creating parent directories and overwriting `to`.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| ArchiveError::io(from, e))?;
    Ok(())
}

/// Scoped ownership of one invocation's archive file and extraction directory.
///
/// Both are removed by [`cleanup`](Self::cleanup), or on drop when a command
/// exits early (error or cancellation).
#[derive(Debug)]
pub struct TempArtifacts {
    directory: PathBuf,
    archive: PathBuf,
    armed: bool,
}

impl TempArtifacts {
    /// Reserve names under `root` and create the extraction directory.
    pub fn create(root: &Path) -> Result<Self, ArchiveError> {
        let suffix = unique_suffix();
        let directory = root.join(format!(".locsync-{suffix}"));
        let archive = root.join(format!("translations-{suffix}.zip"));

        fs::create_dir_all(&directory).map_err(|e| ArchiveError::io(&directory, e))?;
        Ok(Self {
            directory,
            archive,
            armed: true,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Remove both artifacts, reporting the first failure.
    pub fn cleanup(mut self) -> Result<(), ArchiveError> {
        self.armed = false;
        let directory = remove_dir(&self.directory);
        let archive = remove_file(&self.archive);
        directory.and(archive)
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = remove_dir(&self.directory).and(remove_file(&self.archive)) {
            tracing::warn!("failed to remove temporary download files: {e}");
        }
    }
}

fn remove_dir(path: &Path) -> Result<(), ArchiveError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ArchiveError::io(path, e)),
        _ => Ok(()),
    }
}

fn remove_file(path: &Path) -> Result<(), ArchiveError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(ArchiveError::io(path, e)),
        _ => Ok(()),
    }
}

/// Wall-clock millis plus process id, unique across concurrent invocations.
fn unique_suffix() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis}-{}", std::process::id())
}
