//! facetag - incremental face tagging for a remote photo store
//!
//! Walks the photo folder page by page, recognizes enrolled people through
//! the face API and writes their names back as file properties. Progress is
//! checkpointed after every page so an interrupted run resumes where it
//! stopped.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facetag::config::{ServiceSettings, DROPBOX_TOKEN_ENV, FACE_API_KEY_ENV};
use facetag::db::CheckpointStore;
use facetag::models::{RunOptions, RunState};
use facetag::recognition::AzureFaceClient;
use facetag::services::{
    Browser, EnrichmentOrchestrator, IdentityRegistry, ListingWalker, PersonSource,
    RecognitionClient, TagWriter, Throttle,
};
use facetag::store::DropboxClient;
use facetag::types::Cursor;
use facetag_common::config::{
    database_path, default_config_path, load_toml_config, resolve_root_folder, ROOT_FOLDER_ENV,
};
use facetag_common::events::{EventBus, TagEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for facetag
#[derive(Parser, Debug)]
#[command(name = "facetag")]
#[command(about = "Tag photos in a remote store with the people recognized in them")]
#[command(version)]
struct Args {
    /// Folder holding the local database
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Remote store access token
    #[arg(long, env = DROPBOX_TOKEN_ENV, hide_env_values = true, global = true)]
    dropbox_token: Option<String>,

    /// Face API subscription key
    #[arg(long, env = FACE_API_KEY_ENV, hide_env_values = true, global = true)]
    face_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tag new photos (or every photo with --all)
    Tag {
        /// Ignore the watermark and re-walk the whole folder
        #[arg(long)]
        all: bool,
    },

    /// Enroll people from folders of sample photos
    Enroll {
        /// "Display Name=/training/folder", repeatable
        #[arg(long = "person", required = true, value_parser = parse_person)]
        people: Vec<PersonSource>,
    },

    /// List photos with temporary links
    Gallery {
        /// Folder to list (defaults to the configured photos folder)
        #[arg(long)]
        folder: Option<String>,

        /// Continue from a cursor printed by a previous call
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Find photos tagged with a name
    Search {
        name: String,

        /// Continue from a cursor printed by a previous call
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Create (once) and print the tags template id
    Template,
}

fn parse_person(raw: &str) -> std::result::Result<PersonSource, String> {
    PersonSource::parse(raw).ok_or_else(|| format!("expected \"Name=/folder\", got {:?}", raw))
}

/// Clients and stores shared by the commands
struct Services {
    store: Arc<DropboxClient>,
    face: Arc<AzureFaceClient>,
    throttle: Arc<Throttle>,
    checkpoints: CheckpointStore,
    settings: ServiceSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => Default::default(),
    };

    // Initialize tracing
    let default_filter = format!("facetag={}", toml_config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting facetag {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
        }
    }

    let root_folder =
        resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let settings = ServiceSettings::resolve(
        args.dropbox_token.as_deref(),
        args.face_api_key.as_deref(),
        &toml_config,
    )?;

    let db_pool = facetag::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let services = Services {
        store: Arc::new(
            DropboxClient::new(settings.dropbox_access_token.clone())
                .context("Failed to create Dropbox client")?,
        ),
        face: Arc::new(
            AzureFaceClient::new(settings.face_api_endpoint.clone(), settings.face_api_key.clone())
                .context("Failed to create Face API client")?,
        ),
        throttle: Arc::new(Throttle::new(settings.throttle_interval)),
        checkpoints: CheckpointStore::new(db_pool, settings.tag_space.clone()),
        settings,
    };

    match args.command {
        Command::Tag { all } => run_tag(&services, all).await,
        Command::Enroll { people } => run_enroll(&services, &people).await,
        Command::Gallery { folder, cursor } => run_gallery(&services, folder, cursor).await,
        Command::Search { name, cursor } => run_search(&services, &name, cursor).await,
        Command::Template => {
            let writer = TagWriter::new(services.store.clone(), services.checkpoints.clone());
            let template_id = writer.template_id().await?;
            println!("{}", template_id);
            Ok(())
        }
    }
}

async fn run_tag(services: &Services, all: bool) -> Result<()> {
    let walker = ListingWalker::new(services.store.clone());
    let recognizer = RecognitionClient::new(
        services.face.clone(),
        services.throttle.clone(),
        services.settings.person_group_id.clone(),
    );
    let writer = TagWriter::new(services.store.clone(), services.checkpoints.clone());
    let event_bus = EventBus::new(100);

    let orchestrator = EnrichmentOrchestrator::new(
        walker,
        recognizer,
        writer,
        services.checkpoints.clone(),
        event_bus.clone(),
    );

    let progress = tokio::spawn(print_progress(event_bus.subscribe()));

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let options = RunOptions {
        root_folder: services.settings.photos_folder.clone(),
        page_size: services.settings.list_limit,
        reprocess_all: all,
    };
    let run = orchestrator.run(options, cancel).await;
    progress.abort();

    println!("{}", run.stats.summary());
    match run.state {
        RunState::Done => Ok(()),
        RunState::Interrupted => {
            println!("Interrupted; the next run resumes from the last completed page");
            Ok(())
        }
        _ => bail!(
            "Tagging run aborted: {}",
            run.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

async fn run_enroll(services: &Services, people: &[PersonSource]) -> Result<()> {
    let registry = IdentityRegistry::new(
        services.face.clone(),
        services.throttle.clone(),
        services.checkpoints.clone(),
        services.settings.person_group_id.clone(),
        services.settings.person_group_name.clone(),
    );
    let walker = ListingWalker::new(services.store.clone());

    let results = registry
        .bootstrap(&walker, people)
        .await
        .context("Failed to prepare person group")?;

    for (person, outcome) in results {
        match outcome {
            Ok(enrollment) => println!(
                "enrolled {} as {} ({} faces)",
                enrollment.display_name, enrollment.identity_id, enrollment.faces_attached
            ),
            Err(e) => println!("couldn't enroll {}: {}", person.display_name, e),
        }
    }
    Ok(())
}

async fn run_gallery(services: &Services, folder: Option<String>, cursor: Option<String>) -> Result<()> {
    let browser = Browser::new(services.store.clone());

    let page = match cursor {
        Some(cursor) => browser.next_page(&Cursor::new(cursor)).await?,
        None => {
            let folder = folder.unwrap_or_else(|| services.settings.photos_folder.clone());
            let page = browser.first_page(&folder, services.settings.list_limit).await?;
            if page.images.is_empty() && !page.has_more {
                println!("No images found in {}", folder);
                return Ok(());
            }
            page
        }
    };

    for image in &page.images {
        println!("{}\t{}", image.path, image.link);
    }
    if page.has_more {
        println!("more: --cursor {}", page.cursor);
    }
    Ok(())
}

async fn run_search(services: &Services, name: &str, cursor: Option<String>) -> Result<()> {
    let browser = Browser::new(services.store.clone());

    let results = match cursor {
        Some(cursor) => browser.search_continue(&Cursor::new(cursor)).await?,
        None => browser.search(name).await?,
    };

    if results.images.is_empty() {
        println!("No images tagged with {}", name.to_lowercase());
    }
    for image in &results.images {
        println!("{}\t{}", image.path, image.link);
    }
    if let Some(cursor) = results.cursor {
        println!("more: --cursor {}", cursor);
    }
    Ok(())
}

/// Print per-item progress from the run's event stream
async fn print_progress(mut rx: broadcast::Receiver<TagEvent>) {
    loop {
        match rx.recv().await {
            Ok(TagEvent::ItemTagged { path, names, .. }) => {
                println!("tagged {} with {}", path, names.join(", "));
            }
            Ok(TagEvent::ItemFailed { path, error, .. }) => {
                println!("couldn't tag {}: {}", path, error);
            }
            Ok(TagEvent::PageFetched {
                page_number,
                eligible,
                ..
            }) => {
                println!("page {}: tagging a set of {} images", page_number, eligible);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress printer lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown requested, finishing the current image");
    token.cancel();
}
