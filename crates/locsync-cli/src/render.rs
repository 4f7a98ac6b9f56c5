use locsync::SyncEvent;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Print bare paths only, one per line.
    pub plain: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Text for one event, or `None` when the event is not shown in this mode.
pub fn render(event: &SyncEvent, opts: &RenderOptions) -> Option<(Stream, String)> {
    if opts.plain {
        return match event {
            SyncEvent::FileWritten(path) | SyncEvent::DryRunPath(path) => {
                Some((Stream::Stdout, path.clone()))
            }
            SyncEvent::Warning(_) => Some((Stream::Stderr, event.to_string())),
            _ => None,
        };
    }

    match event {
        SyncEvent::BuildProgress(_) if !opts.verbose => None,
        SyncEvent::OmittedWithSource { files, .. } if opts.verbose => {
            Some((Stream::Stderr, with_items(event, files)))
        }
        SyncEvent::OmittedWithoutSource(files) => Some((Stream::Stderr, with_items(event, files))),
        e if e.is_warning() => Some((Stream::Stderr, e.to_string())),
        SyncEvent::DryRunPath(path) => Some((Stream::Stdout, path.clone())),
        e => Some((Stream::Stdout, e.to_string())),
    }
}

fn with_items(event: &SyncEvent, files: &[String]) -> String {
    let mut text = event.to_string();
    for file in files {
        text.push_str("\n\t- ");
        text.push_str(file);
    }
    text
}

/// Print events until every sender is dropped.
pub async fn run(mut rx: UnboundedReceiver<SyncEvent>, opts: RenderOptions) {
    while let Some(event) = rx.recv().await {
        match render(&event, &opts) {
            Some((Stream::Stdout, text)) => println!("{text}"),
            Some((Stream::Stderr, text)) => eprintln!("{text}"),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: RenderOptions = RenderOptions {
        plain: false,
        verbose: false,
    };
    const VERBOSE: RenderOptions = RenderOptions {
        plain: false,
        verbose: true,
    };
    const PLAIN: RenderOptions = RenderOptions {
        plain: true,
        verbose: false,
    };

    fn omitted() -> SyncEvent {
        SyncEvent::OmittedWithoutSource(vec!["a/x.txt".into(), "b/y.txt".into()])
    }

    #[test]
    fn default_mode_shows_status_and_warnings() {
        assert_eq!(
            render(&SyncEvent::FileWritten("uk/a.po".into()), &DEFAULT),
            Some((Stream::Stdout, "extracted: uk/a.po".into()))
        );
        assert_eq!(render(&SyncEvent::BuildProgress(40), &DEFAULT), None);
    }

    #[test]
    fn files_without_source_are_always_listed() {
        assert_eq!(
            render(&omitted(), &DEFAULT),
            Some((
                Stream::Stderr,
                "warning: 2 downloaded file(s) match no source\n\t- a/x.txt\n\t- b/y.txt".into()
            ))
        );
    }

    #[test]
    fn files_with_source_are_listed_only_when_verbose() {
        let event = SyncEvent::OmittedWithSource {
            source: "/a.po".into(),
            files: vec!["fr/a.po".into()],
        };

        assert_eq!(
            render(&event, &DEFAULT),
            Some((Stream::Stderr, "warning: /a.po (1) omitted by local configuration".into()))
        );
        assert_eq!(
            render(&event, &VERBOSE),
            Some((
                Stream::Stderr,
                "warning: /a.po (1) omitted by local configuration\n\t- fr/a.po".into()
            ))
        );
    }

    #[test]
    fn verbose_mode_lists_omitted_files() {
        let (stream, text) = render(&omitted(), &VERBOSE).unwrap();

        assert_eq!(stream, Stream::Stderr);
        assert_eq!(
            text,
            "warning: 2 downloaded file(s) match no source\n\t- a/x.txt\n\t- b/y.txt"
        );
        assert!(render(&SyncEvent::BuildProgress(40), &VERBOSE).is_some());
    }

    #[test]
    fn plain_mode_prints_paths_only() {
        assert_eq!(
            render(&SyncEvent::FileWritten("uk/a.po".into()), &PLAIN),
            Some((Stream::Stdout, "uk/a.po".into()))
        );
        assert_eq!(
            render(&SyncEvent::DryRunPath("fr/a.po".into()), &PLAIN),
            Some((Stream::Stdout, "fr/a.po".into()))
        );
        assert_eq!(render(&SyncEvent::FetchingProject, &PLAIN), None);
        assert_eq!(render(&omitted(), &PLAIN), None);
    }

    #[test]
    fn plain_mode_still_reports_warnings() {
        assert_eq!(
            render(&SyncEvent::warning("careful"), &PLAIN),
            Some((Stream::Stderr, "warning: careful".into()))
        );
    }

    #[tokio::test]
    async fn run_drains_until_senders_drop() {
        let (events, rx) = locsync::Events::channel();
        events.emit(SyncEvent::DryRunPath("a".into()));
        drop(events);

        run(rx, PLAIN).await;
    }
}
