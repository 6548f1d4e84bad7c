use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mantra::config::Config;
use mantra::routes::create_router;
use mantra::AppState;

#[derive(Parser, Debug)]
#[command(name = "mantra")]
#[command(about = "Local task and reflection tracker with a streaming LLM proxy")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "MANTRA_PORT", default_value = "5000")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "MANTRA_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Config file path
    #[arg(short, long, env = "MANTRA_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Directory holding tasks.json and reflection_data.json
    #[arg(short, long, env = "MANTRA_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Directory holding audio files served under /audio
    #[arg(short, long, env = "MANTRA_MEDIA_DIR", default_value = "static/media/audio")]
    media_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "MANTRA_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "mantra=debug,tower_http=debug"
    } else {
        "mantra=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&cli.config)?;
    if config.llm_api.url.is_empty() {
        info!("No LLM upstream configured; /submit_llm will fail until one is set");
    }

    std::fs::create_dir_all(&cli.data_dir)?;

    let state = AppState::new(config, cli.data_dir, cli.media_dir);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!("Starting mantra on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
