pub mod archive;
pub mod client;
pub mod config;
pub mod download;
pub mod dryrun;
pub mod error;
pub mod events;
pub mod language;
pub mod mapping;
pub mod paths;
pub mod placeholder;
pub mod project;
pub mod reconcile;
pub mod sources;
pub mod upload;
pub mod upload_translations;

pub use client::{
    AddDirectory, AddSource, Build, BuildRequest, ClientError, ExportFilter, ProjectClient,
    UpdateSource, UploadTranslation,
};
pub use config::{FileEntry, SyncConfig};
pub use download::{DownloadOptions, DownloadReport, run_build, synchronize_download};
pub use dryrun::dry_run_translations;
pub use error::SyncError;
pub use events::{Events, SyncEvent};
pub use language::{Language, LanguageMapping, PlaceholderKind};
pub use placeholder::PlaceholderResolver;
pub use project::{Access, ProjectSnapshot, RemoteBranch, RemoteDirectory, RemoteFile};
pub use reconcile::OmittedSummary;
pub use upload::{UploadReport, UploadSourcesOptions, upload_sources};
pub use upload_translations::{TranslationsReport, UploadTranslationsOptions, upload_translations};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
