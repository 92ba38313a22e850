use clap::{Parser, Subcommand};
use linkbucket::db::{HttpKvStore, KvStore};
use linkbucket::server::config::{ConfigOverrides, ServerConfig};
use linkbucket::server::setup;
use linkbucket::services::{BookmarkService, HttpTitleResolver, TitleResolver};
use linkbucket::version::VERSION;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bookmark manager backed by a remote key-value store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API
    Serve(ServeArgs),
    /// Create the working directory and a default config file
    Setup {
        /// Working directory, `$HOME/.config/linkbucket` by default
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. "localhost:9090"
    #[arg(long)]
    bind: Option<String>,

    /// Address of the key-value store
    #[arg(long = "db-bind")]
    db_bind: Option<String>,

    /// Database name on the key-value store
    #[arg(long = "db-name")]
    db_name: Option<String>,

    /// Namespace prefixed to every stored key
    #[arg(long = "db-key-namespace")]
    db_key_namespace: Option<String>,
}

fn init_logging(log_dir: Option<&str>) {
    // Default to `info` for everything else if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,linkbucket=debug,reqwest=warn,hyper_util=warn"));

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Log to a file: JSON format, daily rotation
    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(rolling::daily(dir, "linkbucket.log"))
            .with_ansi(false)
            .json()
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let overrides = ConfigOverrides {
        bind_address: args.bind,
        store_address: args.db_bind,
        store_name: args.db_name,
        key_namespace: args.db_key_namespace,
    };

    // --- Server Config Setup ---
    let server_config = match ServerConfig::load(args.config.as_deref(), overrides) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(Some(&server_config.log_dir));
    info!("Starting linkbucket, version: {}", VERSION);

    // --- Store & Collaborators ---
    let store: Arc<dyn KvStore> = Arc::new(HttpKvStore::new(
        &server_config.store_address,
        &server_config.store_name,
        server_config.store_timeout(),
    )?);
    let titles: Arc<dyn TitleResolver> =
        Arc::new(HttpTitleResolver::new(server_config.title_timeout())?);
    let bookmarks = Arc::new(BookmarkService::new(
        store,
        server_config.key_space(),
        titles,
        server_config.tag_syntax(),
    ));

    // --- Axum HTTP Server Setup ---
    let http_router = linkbucket::web::create_axum_router(bookmarks, server_config.clone());
    let listener = tokio::net::TcpListener::bind(&server_config.bind_address).await?;
    info!(address = %server_config.bind_address, "Listening on http://{}", server_config.bind_address);
    info!(
        store = %server_config.store_address,
        db = %server_config.store_name,
        namespace = %server_config.key_namespace,
        "Using key-value store."
    );

    axum::serve(listener, http_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Plain `--version` output, checked before clap parses subcommands.
    if std::env::args().any(|arg| arg == "--version") {
        println!("linkbucket version: {VERSION}");
        return Ok(());
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Setup { dir } => {
            init_logging(None);
            let dir = match dir {
                Some(dir) => dir,
                None => setup::default_working_dir()?,
            };
            let config_path = setup::run_setup(&dir)?;
            println!("Config written to {}", config_path.display());
            Ok(())
        }
    }
}
