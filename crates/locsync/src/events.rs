use std::fmt;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Status reported by sync operations at defined checkpoints.
///
/// Operations never print; callers decide how to present events (the CLI
/// prints them, tests collect them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    FetchingProject,
    /// A build was requested, for one language or all of them.
    BuildStarted { language: Option<String> },
    BuildProgress(u8),
    Downloading,
    /// A translation was written to this path, relative to the base path.
    FileWritten(String),
    /// Archive entries skipped although a remote source owns them.
    OmittedWithSource { source: String, files: Vec<String> },
    /// Archive entries skipped that no known source accounts for.
    OmittedWithoutSource(Vec<String>),
    BranchCreated(String),
    DirectoryCreated(String),
    SourceUploaded(String),
    SourceUpdated(String),
    /// An existing source was left alone because auto-update is off.
    SourceSkipped(String),
    TranslationUploaded { path: String, language: String },
    /// A translation path that was expected locally but does not exist.
    TranslationMissing(String),
    DryRunPath(String),
    Warning(String),
}

impl SyncEvent {
    pub fn warning(msg: impl Into<String>) -> Self {
        Self::Warning(msg.into())
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::Warning(_)
                | Self::OmittedWithSource { .. }
                | Self::OmittedWithoutSource(_)
                | Self::TranslationMissing(_)
        )
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchingProject => write!(f, "fetching project info"),
            Self::BuildStarted { language: Some(id) } => {
                write!(f, "building archive for language '{id}'")
            }
            Self::BuildStarted { language: None } => write!(f, "building archive"),
            Self::BuildProgress(percent) => write!(f, "building translations ({percent}%)"),
            Self::Downloading => write!(f, "downloading translations"),
            Self::FileWritten(path) => write!(f, "extracted: {path}"),
            Self::OmittedWithSource { source, files } => {
                write!(f, "warning: {source} ({}) omitted by local configuration", files.len())
            }
            Self::OmittedWithoutSource(files) => {
                write!(f, "warning: {} downloaded file(s) match no source", files.len())
            }
            Self::BranchCreated(name) => write!(f, "branch '{name}' created"),
            Self::DirectoryCreated(path) => write!(f, "directory '{path}' created"),
            Self::SourceUploaded(path) => write!(f, "file '{path}' uploaded"),
            Self::SourceUpdated(path) => write!(f, "file '{path}' updated"),
            Self::SourceSkipped(path) => write!(f, "file '{path}' skipped, already exists"),
            Self::TranslationUploaded { path, language } => {
                write!(f, "translation '{path}' uploaded for '{language}'")
            }
            Self::TranslationMissing(path) => write!(f, "warning: translation '{path}' not found"),
            Self::DryRunPath(path) => write!(f, "{path}"),
            Self::Warning(msg) => write!(f, "warning: {msg}"),
        }
    }
}

/// Sending half of an event stream. A silent sink drops everything.
#[derive(Debug, Clone, Default)]
pub struct Events {
    tx: Option<UnboundedSender<SyncEvent>>,
}

impl Events {
    pub fn new(tx: UnboundedSender<SyncEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn channel() -> (Self, UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(SyncEvent::BuildProgress(40).to_string(), "building translations (40%)");
        assert_eq!(SyncEvent::FileWritten("uk/a.po".into()).to_string(), "extracted: uk/a.po");
        assert_eq!(SyncEvent::warning("msg").to_string(), "warning: msg");
        assert_eq!(
            SyncEvent::OmittedWithSource {
                source: "/a.po".into(),
                files: vec!["fr/a.po".into()],
            }
            .to_string(),
            "warning: /a.po (1) omitted by local configuration"
        );
    }

    #[test]
    fn warnings_are_flagged() {
        assert!(SyncEvent::warning("x").is_warning());
        assert!(SyncEvent::OmittedWithoutSource(vec![]).is_warning());
        assert!(!SyncEvent::Downloading.is_warning());
    }

    #[test]
    fn channel_delivers_in_order() {
        let (events, mut rx) = Events::channel();
        events.emit(SyncEvent::FetchingProject);
        events.emit(SyncEvent::Downloading);

        assert_eq!(rx.try_recv().unwrap(), SyncEvent::FetchingProject);
        assert_eq!(rx.try_recv().unwrap(), SyncEvent::Downloading);
    }

    #[test]
    fn silent_and_closed_sinks_drop_events() {
        Events::silent().emit(SyncEvent::Downloading);

        let (events, rx) = Events::channel();
        drop(rx);
        events.emit(SyncEvent::Downloading);
    }
}
