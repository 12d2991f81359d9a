//! Command-line host for the LibreTube data-management core.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use libretube_core::autobackup::{AutoBackupScheduler, AutoBackupSettings, list_auto_backups};
use libretube_core::backup::{BackupManager, BackupOption, RestoreHook, RestoreOutcome};
use libretube_core::download::{
    DownloadQueue, EnqueueProgress, EnqueueRequest, PipedClient, PlaylistDownloadEnqueuer, PlaylistType,
    quality_value,
};
use libretube_core::logging::LogFile;
use libretube_core::update::{GithubReleases, UpdateChecker, UpdateManager, UpdateStatus};
use libretube_core::{
    AppConfig, AutoBackupWorker, Database, JobOutcome, JobScheduler, PreferenceDataStore,
    RestorePolicy, SqliteSettingsStore, keys, logging,
};

#[derive(Parser)]
#[command(name = "libretube")]
#[command(about = "Backups, auto backups, playlist downloads and updates for LibreTube", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory holding the database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Structured JSON backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Raw database copies
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Scheduled backups
    AutoBackup {
        #[command(subcommand)]
        command: AutoBackupCommands,
    },
    /// Read and write preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Enqueue every video of a playlist for download
    Enqueue {
        /// Playlist ID (numeric for local playlists)
        playlist_id: String,

        /// Treat the ID as a local playlist
        #[arg(long)]
        private: bool,

        /// Video quality ceiling, e.g. 720 (defaults to the stored preference)
        #[arg(long)]
        video_quality: Option<u32>,

        /// Audio quality ceiling in kbps (defaults to the stored preference)
        #[arg(long)]
        audio_quality: Option<u32>,

        /// Preferred audio language
        #[arg(long)]
        audio_language: Option<String>,

        /// Preferred subtitle language
        #[arg(long)]
        caption_language: Option<String>,
    },
    /// Check for a newer build
    Update {
        #[command(subcommand)]
        command: UpdateCommands,
    },
    /// Inspect the log file
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
}

#[derive(clap::Subcommand)]
enum BackupCommands {
    /// Write a backup
    Export {
        /// Directory to write a timestamped backup into
        #[arg(long, conflicts_with = "file")]
        dir: Option<PathBuf>,

        /// Exact file to write
        #[arg(long)]
        file: Option<PathBuf>,

        /// Comma-separated categories (defaults to all)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
    /// Restore a JSON backup or a database file
    Restore {
        /// Backup file
        path: PathBuf,

        /// Also restore the auto backup destination
        #[arg(long)]
        overwrite_all: bool,
    },
}

#[derive(clap::Subcommand)]
enum DbCommands {
    /// Copy the database file
    Export {
        /// Destination file
        dest: PathBuf,
    },
    /// Replace the database file
    Import {
        /// Source file
        src: PathBuf,
    },
}

#[derive(clap::Subcommand)]
enum AutoBackupCommands {
    /// Run one auto backup now
    Run,
    /// Show the auto backup settings and existing backups
    Status,
    /// Keep running and back up on schedule until interrupted
    Daemon,
}

#[derive(clap::Subcommand)]
enum PrefsCommands {
    /// Print a preference
    Get { key: String },
    /// Set a preference
    Set { key: String, value: String },
    /// Remove a preference
    Remove { key: String },
    /// Print every preference
    List,
}

#[derive(clap::Subcommand)]
enum UpdateCommands {
    /// Check the release feed
    Check,
    /// Download the newer build if there is one
    Download {
        /// Destination file (defaults to the download directory)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand)]
enum LogCommands {
    /// Print the log
    Show,
    /// Truncate the log
    Clear,
}

/// Opened database, preferences and backup manager.
struct App {
    config: AppConfig,
    prefs: Arc<PreferenceDataStore>,
    backups: Arc<BackupManager>,
}

impl App {
    async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let db = Arc::new(
            Database::open_in(&config.data_directory)
                .with_context(|| format!("opening database in {}", config.data_directory.display()))?,
        );
        let store = Arc::new(SqliteSettingsStore::new(Arc::clone(&db)));
        let prefs = Arc::new(PreferenceDataStore::new(store));
        prefs.initialize().await?;
        let backups = Arc::new(BackupManager::new(db, Arc::clone(&prefs)));
        Ok(Self {
            config,
            prefs,
            backups,
        })
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.prefs.flush().await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_directory = data_dir;
    }

    let _logging = logging::init(&config.logging_config())?;

    if let Commands::Log { command } = &cli.command {
        return run_log(command, &LogFile::new(&config.log_directory));
    }

    let app = App::open(config).await?;
    let result = match cli.command {
        Commands::Backup { command } => run_backup(&app, command).await,
        Commands::Db { command } => run_db(&app, command).await,
        Commands::AutoBackup { command } => run_auto_backup(&app, command).await,
        Commands::Prefs { command } => run_prefs(&app, command),
        Commands::Enqueue {
            playlist_id,
            private,
            video_quality,
            audio_quality,
            audio_language,
            caption_language,
        } => {
            let playlist_type = if private {
                PlaylistType::Private
            } else {
                PlaylistType::Public
            };
            let mut request = EnqueueRequest::new(playlist_id, playlist_type);
            request.max_video_quality = video_quality
                .or_else(|| stored_quality(&app.prefs, keys::DEFAULT_DOWNLOAD_VIDEO_QUALITY));
            request.max_audio_quality = audio_quality
                .or_else(|| stored_quality(&app.prefs, keys::DEFAULT_DOWNLOAD_AUDIO_QUALITY));
            request.audio_language = audio_language;
            request.caption_language = caption_language;
            run_enqueue(&app, &request).await
        }
        Commands::Update { command } => run_update(&app.config, command).await,
        Commands::Log { .. } => Ok(()),
    };

    app.close().await?;
    result
}

async fn run_backup(app: &App, command: BackupCommands) -> anyhow::Result<()> {
    match command {
        BackupCommands::Export { dir, file, only } => {
            let options = parse_options(&only)?;
            let path = match (file, dir) {
                (Some(file), _) => {
                    app.backups.export_to_file(&options, &file).await?;
                    file
                }
                (None, Some(dir)) => app.backups.export_to_dir(&options, &dir).await?,
                (None, None) => {
                    let dir = std::env::current_dir()?;
                    app.backups.export_to_dir(&options, &dir).await?
                }
            };
            println!("{}", path.display());
        }
        BackupCommands::Restore {
            path,
            overwrite_all,
        } => {
            let policy = if overwrite_all {
                RestorePolicy::overwrite_all()
            } else {
                RestorePolicy::default()
            };
            match app.backups.restore_any(&path, &policy).await? {
                RestoreOutcome::Database => println!("Database imported"),
                RestoreOutcome::Structured(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
    }
    Ok(())
}

async fn run_db(app: &App, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Export { dest } => {
            if !app.backups.export_database(&dest).await {
                bail!("failed to export database to {}", dest.display());
            }
            println!("{}", dest.display());
        }
        DbCommands::Import { src } => {
            if !app.backups.import_database(&src).await {
                bail!("failed to import database from {}", src.display());
            }
            println!("Database imported");
        }
    }
    Ok(())
}

async fn run_auto_backup(app: &App, command: AutoBackupCommands) -> anyhow::Result<()> {
    let worker = Arc::new(AutoBackupWorker::new(Arc::clone(&app.backups)));
    let scheduler = Arc::new(AutoBackupScheduler::new(
        JobScheduler::default(),
        Arc::clone(&app.prefs),
        worker,
    ));

    match command {
        AutoBackupCommands::Run => match scheduler.backup_now().await {
            JobOutcome::Success => println!("Auto backup finished"),
            outcome => bail!("auto backup ended with {outcome}"),
        },
        AutoBackupCommands::Status => {
            let settings = AutoBackupSettings::load(&app.prefs, chrono::Local::now().time());
            println!("enabled:  {}", settings.enabled);
            println!(
                "path:     {}",
                settings
                    .path
                    .as_deref()
                    .map_or_else(|| "<not set>".to_string(), |p| p.display().to_string())
            );
            println!("time:     {}", settings.time.format("%H:%M"));
            println!("interval: {}h", settings.interval.as_secs() / 3600);
            println!("keep:     {}", settings.max_keep);
            if let Some(dir) = &settings.path {
                print_auto_backups(dir)?;
            }
        }
        AutoBackupCommands::Daemon => {
            let hook: Arc<dyn RestoreHook> = scheduler.clone();
            app.backups.register_restore_hook(&hook);
            if !scheduler.reschedule() {
                warn!("Auto backup is disabled or has no destination; waiting anyway");
            }
            info!("Auto backup daemon running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            scheduler.cancel();
            info!("Auto backup daemon stopped");
        }
    }
    Ok(())
}

fn print_auto_backups(dir: &Path) -> anyhow::Result<()> {
    let backups = list_auto_backups(dir)?;
    println!("backups:  {}", backups.len());
    for path in backups {
        println!("  {}", path.display());
    }
    Ok(())
}

fn run_prefs(app: &App, command: PrefsCommands) -> anyhow::Result<()> {
    match command {
        PrefsCommands::Get { key } => match app.prefs.get_optional_string(&key) {
            Some(value) => println!("{value}"),
            None => bail!("{key} is not set"),
        },
        PrefsCommands::Set { key, value } => {
            if keys::is_string_set_key(&key) {
                let values: BTreeSet<&str> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .collect();
                app.prefs.put_string_set(&key, Some(values));
            } else if keys::is_int_key(&key) {
                let value: i32 = value
                    .parse()
                    .with_context(|| format!("{key} takes an integer"))?;
                app.prefs.put_int(&key, value);
            } else {
                app.prefs.put_string(&key, Some(&value));
            }
        }
        PrefsCommands::Remove { key } => app.prefs.remove(&key),
        PrefsCommands::List => {
            for (key, value) in app.prefs.get_all() {
                println!("{key}={value}");
            }
        }
    }
    Ok(())
}

async fn run_enqueue(app: &App, request: &EnqueueRequest) -> anyhow::Result<()> {
    let media = Arc::new(PipedClient::new(app.config.piped_api_url.clone())?);
    let queue = Arc::new(DownloadQueue::new());
    let enqueuer = PlaylistDownloadEnqueuer::new(
        media,
        queue.clone(),
        Arc::clone(app.backups.database()),
        app.config.download_directory.clone(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<EnqueueProgress>();
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            eprintln!("{}/{}", progress.done, progress.total);
        }
    });

    let summary = enqueuer.enqueue(request, Some(tx)).await;
    printer.await.ok();
    let summary = summary?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    for item in queue.get_all_items().await {
        println!("{}", serde_json::to_string(&item.request)?);
    }
    Ok(())
}

async fn run_update(config: &AppConfig, command: UpdateCommands) -> anyhow::Result<()> {
    let source = Arc::new(GithubReleases::new(config.update_feed_url.clone())?);
    let checker = UpdateChecker::new(source, config.update_channel, config.version_name.clone());
    let status = checker.check(true).await?;

    match (status, command) {
        (UpdateStatus::UpToDate, _) => println!("{} is up to date", config.version_name),
        (UpdateStatus::NoInstallableAsset { info }, _) => {
            println!("{} is available but has no installable asset", info.name);
        }
        (UpdateStatus::Available { info, .. }, UpdateCommands::Check) => {
            println!("{} is available: {}", info.name, info.html_url);
            println!();
            println!("{}", libretube_core::update::sanitize_changelog(&info.body));
        }
        (UpdateStatus::Available { asset, .. }, UpdateCommands::Download { dest }) => {
            let dest = dest.unwrap_or_else(|| config.download_directory.join(&asset.name));
            if !UpdateManager::new()
                .download_asset(&asset.browser_download_url, &dest)
                .await?
            {
                bail!("download of {} failed", asset.browser_download_url);
            }
            println!("{}", dest.display());
        }
    }
    Ok(())
}

fn run_log(command: &LogCommands, log: &LogFile) -> anyhow::Result<()> {
    match command {
        LogCommands::Show => print!("{}", log.read()?),
        LogCommands::Clear => log.clear()?,
    }
    Ok(())
}

fn parse_options(names: &[String]) -> anyhow::Result<Vec<BackupOption>> {
    if names.is_empty() {
        return Ok(BackupOption::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            BackupOption::from_name(name).with_context(|| {
                let known: Vec<_> = BackupOption::ALL.iter().map(|o| o.name()).collect();
                format!("unknown backup category {name:?} (known: {})", known.join(", "))
            })
        })
        .collect()
}

fn stored_quality(prefs: &PreferenceDataStore, key: &str) -> Option<u32> {
    prefs
        .get_optional_string(key)
        .as_deref()
        .and_then(quality_value)
}
