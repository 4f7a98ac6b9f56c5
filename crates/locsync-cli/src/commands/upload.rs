use anyhow::{Context, Result};
use clap::Args;
use locsync::{
    Events, ProjectClient, UploadSourcesOptions, UploadTranslationsOptions, upload_sources,
    upload_translations,
};

use crate::config::Settings;

#[derive(Debug, Clone, Args)]
pub struct UploadSourcesArgs {
    /// Branch to upload into; created when missing
    #[arg(short, long)]
    pub branch: Option<String>,
    /// Skip sources that already exist instead of updating them
    #[arg(long)]
    pub no_auto_update: bool,
}

#[derive(Debug, Clone, Args)]
pub struct UploadTranslationsArgs {
    /// Upload translations for this language id only
    #[arg(short, long)]
    pub language: Option<String>,
    #[arg(short, long)]
    pub branch: Option<String>,
    /// Add translations even when they equal the source string
    #[arg(long)]
    pub import_eq_suggestions: bool,
    /// Approve uploaded translations
    #[arg(long)]
    pub auto_approve_imported: bool,
}

pub async fn sources(
    client: &dyn ProjectClient,
    settings: &Settings,
    args: &UploadSourcesArgs,
    events: &Events,
) -> Result<()> {
    let options = UploadSourcesOptions {
        branch: args.branch.clone(),
        auto_update: !args.no_auto_update,
        ..UploadSourcesOptions::default()
    };
    let report = upload_sources(client, &settings.sync, &options, events)
        .await
        .context("failed to upload sources")?;
    tracing::info!(
        uploaded = report.uploaded.len(),
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        "upload finished"
    );
    Ok(())
}

pub async fn translations(
    client: &dyn ProjectClient,
    settings: &Settings,
    args: &UploadTranslationsArgs,
    events: &Events,
) -> Result<()> {
    let options = UploadTranslationsOptions {
        language: args.language.clone(),
        branch: args.branch.clone(),
        import_eq_suggestions: args.import_eq_suggestions,
        auto_approve_imported: args.auto_approve_imported,
    };
    let report = upload_translations(client, &settings.sync, &options, events)
        .await
        .context("failed to upload translations")?;
    tracing::info!(
        uploaded = report.uploaded.len(),
        missing = report.missing.len(),
        "translation upload finished"
    );
    Ok(())
}
