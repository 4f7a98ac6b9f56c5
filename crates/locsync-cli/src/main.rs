mod commands;
mod config;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use locsync::Events;
use locsync_crowdin::{CrowdinClient, CrowdinClientConfig};

use crate::commands::download::DownloadArgs;
use crate::commands::upload::{UploadSourcesArgs, UploadTranslationsArgs};
use crate::config::{Overrides, Settings};
use crate::render::RenderOptions;

#[derive(Parser)]
#[command(name = "locsync")]
#[command(about = "Synchronize localization files with a Crowdin project")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Project configuration file
    #[arg(short, long, global = true, default_value = "crowdin.yml")]
    config: PathBuf,
    /// Identity file with personal credentials (default: ~/.crowdin.yml)
    #[arg(long, global = true)]
    identity: Option<PathBuf>,
    /// API token, overriding the configuration
    #[arg(short = 'T', long, global = true)]
    token: Option<String>,
    /// Project id, overriding the configuration
    #[arg(short = 'i', long, global = true)]
    project_id: Option<String>,
    /// Base URL, e.g. https://acme.crowdin.com
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Base path for sources and translations
    #[arg(long, global = true)]
    base_path: Option<PathBuf>,
    /// Show progress and list omitted files
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print paths only, one per line
    #[arg(long, global = true)]
    plain: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build and download translations
    Download(DownloadArgs),
    /// Upload sources or translations
    #[command(subcommand)]
    Upload(UploadCommand),
}

#[derive(Subcommand)]
enum UploadCommand {
    /// Upload source files
    Sources(UploadSourcesArgs),
    /// Upload existing translations
    Translations(UploadTranslationsArgs),
}

fn load_settings(global: &GlobalArgs) -> Result<Settings> {
    let identity_path = global.identity.clone().or_else(config::default_identity_path);
    let identity = config::read_identity(identity_path.as_deref())?;
    let overrides = Overrides {
        token: global.token.clone(),
        project_id: global.project_id.clone(),
        base_url: global.base_url.clone(),
        base_path: global.base_path.clone(),
    };
    config::load(&global.config, identity.as_ref(), &overrides, &|key: &str| {
        std::env::var(key).ok()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.global.verbose);

    let settings = load_settings(&cli.global)?;
    tracing::info!(
        project_id = settings.project_id,
        api = %settings.api.url,
        base_path = %settings.sync.base_path.display(),
        "configuration loaded"
    );
    let client = CrowdinClient::new(
        CrowdinClientConfig::new(settings.project_id, settings.token.clone())
            .with_api_base(settings.api.url.clone()),
    );

    let (events, rx) = Events::channel();
    let renderer = tokio::spawn(render::run(
        rx,
        RenderOptions {
            plain: cli.global.plain,
            verbose: cli.global.verbose,
        },
    ));

    let plain = cli.global.plain;
    let work = async move {
        match &cli.command {
            Command::Download(args) => {
                commands::download::run(&client, &settings, args, plain, &events).await
            }
            Command::Upload(UploadCommand::Sources(args)) => {
                commands::upload::sources(&client, &settings, args, &events).await
            }
            Command::Upload(UploadCommand::Translations(args)) => {
                commands::upload::translations(&client, &settings, args, &events).await
            }
        }
    };

    let outcome = tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };

    // Every sender is gone once `work` completes or is dropped.
    if let Err(e) = renderer.await {
        tracing::warn!("event renderer stopped: {e}");
    }
    outcome
}
