//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run
//! the selected subcommand. No business logic here.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tg_digest::adapters::bot::{self, BotDeps};
use tg_digest::adapters::llm::{GigaChatClient, GigaChatSettings, MockLlm};
use tg_digest::adapters::persistence::SqliteStore;
use tg_digest::adapters::telegram::{GrammersAuthAdapter, GrammersGateway};
use tg_digest::adapters::web;
use tg_digest::ports::{AuthPort, LlmPort, MessageStore, TgGateway};
use tg_digest::shared::config::AppConfig;
use tg_digest::usecases::{AuthService, CollectorService, DigestService, resolve_input};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "tg-digest",
    version,
    about = "Telegram message collector and GigaChat summarizer"
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Collect messages over MTProto into the shared database.
    Collect {
        /// Backfill this chat instead of listening for live updates.
        #[arg(long)]
        chat: Option<i64>,
        /// History batch size for backfill.
        #[arg(long, default_value_t = 100)]
        limit: i32,
    },
    /// Run the summarizer bot.
    Bot {
        /// Use the built-in mock instead of GigaChat.
        #[arg(long)]
        mock: bool,
    },
    /// Run the echo bot (token connectivity check).
    Echo,
    /// Summarize a text or file and print the digest to stdout.
    #[command(group(clap::ArgGroup::new("input").required(true)))]
    Summary {
        /// Inline text to summarize.
        #[arg(long, group = "input")]
        text: Option<String>,
        /// Path of a UTF-8 text file to summarize.
        #[arg(long, group = "input")]
        file: Option<PathBuf>,
    },
    /// Serve the read-only JSON dashboard.
    Web {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load().unwrap_or_default();

    match cli.command {
        Cmd::Collect { chat, limit } => run_collect(&cfg, chat, limit).await,
        Cmd::Bot { mock } => run_bot(&cfg, mock).await,
        Cmd::Echo => run_echo(&cfg).await,
        Cmd::Summary { text, file } => run_summary(&cfg, text, file).await,
        Cmd::Web { port } => run_web(&cfg, port).await,
    }
}

async fn run_collect(cfg: &AppConfig, chat: Option<i64>, limit: i32) -> anyhow::Result<()> {
    let (api_id, api_hash) = cfg.require_mtproto_credentials()?;
    let client = create_telegram_client(api_id, &cfg.session_path()).await?;

    let auth: Arc<dyn AuthPort> = Arc::new(GrammersAuthAdapter::new(client.clone()));
    AuthService::new(auth, api_hash).run_auth_flow().await?;

    let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::connect(cfg.data_dir()).await?);
    let gateway: Arc<dyn TgGateway> = Arc::new(GrammersGateway::new(client));
    let collector = CollectorService::new(gateway, store);

    let dialogs = collector.refresh_dialogs().await?;
    for dialog in &dialogs {
        info!(
            chat_id = dialog.chat_id,
            kind = dialog.kind.as_str(),
            title = %dialog.title,
            "dialog"
        );
    }

    match chat {
        Some(chat_id) => {
            let stats = collector.collect_recent(chat_id, limit).await?;
            info!(
                chat_id,
                fetched = stats.fetched,
                stored = stats.stored,
                "backfill finished"
            );
        }
        None => {
            tokio::select! {
                res = collector.listen() => res?,
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
    }
    Ok(())
}

async fn run_bot(cfg: &AppConfig, mock: bool) -> anyhow::Result<()> {
    let token = cfg.require_bot_token()?;
    let llm = build_llm(cfg, mock)?;
    let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::connect(cfg.data_dir()).await?);
    let deps = Arc::new(BotDeps {
        llm: llm.clone(),
        store: store.clone(),
        digest: Arc::new(DigestService::new(llm, store)),
    });
    bot::handlers::run(Bot::new(token), deps).await?;
    Ok(())
}

async fn run_echo(cfg: &AppConfig) -> anyhow::Result<()> {
    let token = cfg.require_bot_token()?;
    bot::echo::run(Bot::new(token)).await;
    Ok(())
}

async fn run_summary(
    cfg: &AppConfig,
    text: Option<String>,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let input = resolve_input(text, file).await?;
    let llm = build_llm(cfg, false)?;
    // One-shot input, nothing to persist.
    let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::connect_in_memory().await?);
    let digest = DigestService::new(llm, store);
    let summary = digest.summarize_text(&input).await?;
    println!("{summary}");
    Ok(())
}

async fn run_web(cfg: &AppConfig, port: u16) -> anyhow::Result<()> {
    let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::connect(cfg.data_dir()).await?);
    web::serve(port, store).await?;
    Ok(())
}

fn build_llm(cfg: &AppConfig, mock: bool) -> anyhow::Result<Arc<dyn LlmPort>> {
    if mock {
        warn!("using the mock LLM, replies will be placeholders");
        return Ok(Arc::new(MockLlm::new()));
    }
    let (client_id, client_secret) = cfg.require_gigachat_credentials()?;
    let settings = GigaChatSettings {
        oauth_url: cfg.oauth_url_or_default(),
        chat_url: cfg.chat_url_or_default(),
        client_id,
        client_secret,
        model: cfg.model_or_default(),
        request_timeout: Duration::from_secs(cfg.request_timeout_secs_or_default()),
        insecure_tls: cfg.insecure_tls(),
    };
    if settings.insecure_tls {
        warn!("TLS certificate verification disabled for GigaChat endpoints");
    }
    Ok(Arc::new(GigaChatClient::new(settings)?))
}

/// Create grammers Client with persistent session storage. The session file
/// is created on first login and reused afterwards.
async fn create_telegram_client(
    api_id: i32,
    session_path: &Path,
) -> anyhow::Result<grammers_client::Client> {
    if let Some(parent) = session_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow::anyhow!("create session directory: {}", e))?;
    }
    let session = grammers_session::storages::SqliteSession::open(session_path)
        .await
        .map_err(|e| anyhow::anyhow!("open session file {}: {}", session_path.display(), e))?;
    let pool = grammers_client::SenderPool::new(Arc::new(session), api_id);
    let handle = pool.handle.clone();
    tokio::spawn(async move {
        pool.runner.run().await;
    });
    Ok(grammers_client::Client::new(handle))
}
