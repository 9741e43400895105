mod journey;
mod server;

use clap::{Parser, Subcommand};
use giro_agents::{openai::ChatClient, HttpRetriever, RecommendAgent, RegisterAgent};
use giro_channels::WhatsAppTransport;
use giro_core::{
    config::{self, Config},
    message::ChatKind,
    templates::Templates,
};
use giro_memory::Store;
use journey::Journey;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "giro",
    version,
    about = "Giro — WhatsApp assistant for events and venues in Turin"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Start,
    /// Check configuration and storage health.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(cfg.giro.log_level.clone())
            }),
        )
        .init();

    match cli.command {
        Commands::Start => start(cfg).await,
        Commands::Status => status(cfg).await,
    }
}

async fn start(cfg: Config) -> anyhow::Result<()> {
    if cfg.whatsapp.api_token.is_empty() {
        anyhow::bail!("whatsapp.api_token is empty. Set it in config.toml.");
    }
    if cfg.whatsapp.user_number_id.is_empty() || cfg.whatsapp.business_number_id.is_empty() {
        anyhow::bail!(
            "Both whatsapp.user_number_id and whatsapp.business_number_id must be set."
        );
    }
    if cfg.whatsapp.verify_token.is_empty() {
        anyhow::bail!("whatsapp.verify_token is empty. Set it in config.toml.");
    }
    if cfg.agent.api_key.is_empty() {
        anyhow::bail!("agent.api_key is empty. Set it in config.toml.");
    }

    let store = Store::new(&cfg.memory, &cfg.conversation).await?;
    let templates = Templates::load(&cfg.giro.data_dir);

    let transport = Arc::new(WhatsAppTransport::new(cfg.whatsapp.clone()));
    let retriever = Arc::new(HttpRetriever::from_config(&cfg.retrieval));
    let recommend = Arc::new(RecommendAgent::new(
        ChatClient::from_config(&cfg.agent),
        retriever,
        store.clone(),
        cfg.retrieval.top_k,
        cfg.conversation.default_lookahead_days,
    ));
    let register = Arc::new(RegisterAgent::new(ChatClient::from_config(&cfg.agent)));

    let journey = Arc::new(Journey::new(
        store,
        transport,
        recommend,
        register,
        templates,
        cfg.limits.clone(),
        cfg.conversation.clone(),
    ));

    let state = server::AppState {
        journey,
        whatsapp: cfg.whatsapp.clone(),
        started: std::time::Instant::now(),
    };
    let app = server::build_router(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("{} listening on {addr}", cfg.giro.name);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn status(cfg: Config) -> anyhow::Result<()> {
    let store = Store::new(&cfg.memory, &cfg.conversation).await?;
    let users = store.identity_count(ChatKind::User).await?;
    let businesses = store.identity_count(ChatKind::Business).await?;

    println!("storage:      ok ({})", cfg.memory.db_path);
    println!("users:        {users}");
    println!("businesses:   {businesses}");
    println!(
        "whatsapp:     {}",
        if cfg.whatsapp.api_token.is_empty() {
            "not configured"
        } else {
            "configured"
        }
    );
    println!(
        "agent:        {} ({})",
        if cfg.agent.api_key.is_empty() {
            "not configured"
        } else {
            "configured"
        },
        cfg.agent.model
    );
    println!("retrieval:    {}", cfg.retrieval.base_url);
    Ok(())
}
