use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use locsync::{DownloadOptions, Events, ProjectClient, dry_run_translations, synchronize_download};

use crate::config::Settings;

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Download translations for this language id only
    #[arg(short, long)]
    pub language: Option<String>,
    /// Branch to download from
    #[arg(short, long)]
    pub branch: Option<String>,
    /// Skip archive entries that match no configured source
    #[arg(long)]
    pub ignore_match: bool,
    /// Leave out strings that have no translation
    #[arg(long, conflicts_with = "skip_untranslated_files")]
    pub skip_untranslated_strings: bool,
    /// Leave out files that are not fully translated
    #[arg(long)]
    pub skip_untranslated_files: bool,
    /// Include approved translations only
    #[arg(long)]
    pub export_only_approved: bool,
    /// List the translation paths instead of downloading
    #[arg(long)]
    pub dryrun: bool,
    /// With --dryrun, list only paths that exist locally
    #[arg(long, requires = "dryrun")]
    pub files_must_exist: bool,
    /// Give up on the build after this many seconds
    #[arg(long, default_value_t = 600)]
    pub build_timeout: u64,
}

impl DownloadArgs {
    pub fn options(&self, settings: &Settings, plain: bool) -> DownloadOptions {
        DownloadOptions {
            language: self.language.clone(),
            branch: self.branch.clone(),
            organization: settings.api.organization,
            skip_untranslated_strings: self.skip_untranslated_strings,
            skip_untranslated_files: self.skip_untranslated_files,
            export_approved_only: self.export_only_approved,
            ignore_match: self.ignore_match || plain,
            build_timeout: Duration::from_secs(self.build_timeout),
            ..DownloadOptions::default()
        }
    }
}

pub async fn run(
    client: &dyn ProjectClient,
    settings: &Settings,
    args: &DownloadArgs,
    plain: bool,
    events: &Events,
) -> Result<()> {
    if args.dryrun {
        let paths = dry_run_translations(
            client,
            &settings.sync,
            args.language.as_deref(),
            args.files_must_exist,
            events,
        )
        .await
        .context("failed to list translation paths")?;
        tracing::info!(count = paths.len(), "dry run finished");
        return Ok(());
    }

    let report = synchronize_download(client, &settings.sync, &args.options(settings, plain), events)
        .await
        .context("failed to download translations")?;
    tracing::info!(
        written = report.written.len(),
        omitted = report.omitted.len(),
        without_source = report.omitted.without_source.len(),
        "download finished"
    );
    Ok(())
}
