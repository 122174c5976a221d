use std::{
    fs,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    EventPresenter, HttpJobApi, ImageBlob, JobApi, SessionConfig, SessionEvent, Severity,
    UploadSession,
};
use shared::domain::{guided_slots, CharacterSet, SessionMode};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "handfont", about = "Turn handwritten character images into a font")]
struct Cli {
    /// Overrides the backend URL from settings.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload every image in DIR, generate the font and download it.
    Make {
        dir: PathBuf,
        #[arg(long, default_value = "")]
        font_name: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Guided)]
        mode: ModeArg,
        /// basic, extended or custom; defaults to the mode's own character list.
        #[arg(long)]
        charset: Option<String>,
        /// Character list for the custom charset.
        #[arg(long)]
        characters: Option<String>,
        /// Output file, or a directory to save the font into.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List the guided slots and the file name each one expects.
    Slots,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Guided,
    Freeform,
}

impl From<ModeArg> for SessionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Guided => SessionMode::Guided,
            ModeArg::Freeform => SessionMode::Freeform,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }

    match cli.command {
        Command::Slots => {
            for slot in guided_slots() {
                println!("{slot}\t{slot}.png");
            }
        }
        Command::Make {
            dir,
            font_name,
            mode,
            charset,
            characters,
            out,
        } => {
            let character_list = character_list(charset.as_deref(), characters)?;
            make_font(&settings, &dir, mode.into(), &font_name, &character_list, &out).await?;
        }
    }

    Ok(())
}

fn character_list(charset: Option<&str>, characters: Option<String>) -> Result<String> {
    let Some(charset) = charset else {
        return Ok(characters.unwrap_or_default());
    };
    match CharacterSet::parse(charset) {
        Some(CharacterSet::Custom) => match characters.filter(|c| !c.trim().is_empty()) {
            Some(characters) => Ok(characters),
            None => bail!("the custom charset needs --characters"),
        },
        Some(preset) => Ok(preset.characters().to_string()),
        None => bail!("unknown charset '{charset}' (expected basic, extended or custom)"),
    }
}

async fn make_font(
    settings: &Settings,
    dir: &Path,
    mode: SessionMode,
    font_name: &str,
    character_list: &str,
    out: &Path,
) -> Result<()> {
    let files = read_images(dir)?;
    let api = Arc::new(
        HttpJobApi::with_timeout(&settings.server_url, settings.request_timeout())
            .with_context(|| format!("invalid server url '{}'", settings.server_url))?,
    );

    info!(server_url = %settings.server_url, files = files.len(), "make: uploading");
    let (outcome, logged) = with_event_log(settings.session_config(mode), api, |session| async move {
        run_session(&session, files, font_name, character_list, out).await
    })
    .await;
    debug!(logged, "make: event log drained");
    outcome
}

/// Runs `work` on a fresh session and returns once every notification it raised is logged.
async fn with_event_log<F, Fut>(
    config: SessionConfig,
    api: Arc<dyn JobApi>,
    work: F,
) -> (Result<()>, usize)
where
    F: FnOnce(Arc<UploadSession>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let presenter = Arc::new(EventPresenter::new(256));
    let log_task = tokio::spawn(log_events(presenter.subscribe()));
    let session = UploadSession::new_with_presenter(config, api, presenter);

    let outcome = work(session).await;

    // The log task ends once the last presenter handle is gone.
    let logged = log_task.await.unwrap_or_default();
    (outcome, logged)
}

async fn run_session(
    session: &UploadSession,
    files: Vec<ImageBlob>,
    font_name: &str,
    character_list: &str,
    out: &Path,
) -> Result<()> {
    let report = session.submit_batch(files).await?;
    if report.committed == 0 {
        bail!(
            "the backend accepted none of the {} matched images",
            report.matched
        );
    }

    let result = session
        .request_font_generation(font_name, character_list)
        .await?;
    println!("{}", result.message);

    let font = session.download_font().await?;
    let target = if out.is_dir() {
        out.join(&font.file_name)
    } else {
        out.to_path_buf()
    };
    tokio::fs::write(&target, &font.bytes)
        .await
        .with_context(|| format!("failed to write font to '{}'", target.display()))?;
    println!("saved {}", target.display());
    Ok(())
}

fn read_images(dir: &Path) -> Result<Vec<ImageBlob>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
            Ok(ImageBlob::new(file_name, bytes))
        })
        .collect()
}

async fn log_events(mut events: Receiver<SessionEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(SessionEvent::Notified(notification)) => {
                logged += 1;
                match notification.severity {
                    Severity::Info | Severity::Success => info!("{}", notification.message),
                    Severity::Warning => warn!("{}", notification.message),
                    Severity::Error => error!("{}", notification.message),
                }
            }
            Ok(SessionEvent::ProgressUpdated(progress)) => debug!(
                committed = progress.committed,
                pending = progress.pending,
                percent = ?progress.percent(),
                "progress"
            ),
            Ok(SessionEvent::SlotRendered { character, visual }) => {
                debug!(%character, ?visual, "slot")
            }
            Ok(SessionEvent::PreviewReady {
                character,
                file_name,
            }) => debug!(%character, %file_name, "preview"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "ui event stream lagged"),
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
